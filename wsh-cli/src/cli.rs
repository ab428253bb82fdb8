//! Command-line flags.

use std::path::PathBuf;

use clap::{Args, Parser};
use wsh::{GardenService, Transport};

/// Open an interactive shell in a garden container.
///
/// With no HANDLE and no --create, attaches to the most recently created
/// container.
#[derive(Parser, Debug)]
#[command(name = "wsh", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(flatten)]
    pub shell: crate::commands::shell::ShellArgs,
}

/// Flags that select and configure the orchestration service connection.
#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Garden server network (e.g. unix, tcp)
    #[arg(long, env = "WSH_NETWORK", default_value = "tcp")]
    pub network: String,

    /// Garden server address (host:port for tcp, socket path for unix)
    #[arg(long, env = "WSH_ADDR", default_value = "127.0.0.1:7777")]
    pub addr: String,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "WSH_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn transport(&self) -> anyhow::Result<Transport> {
        Ok(Transport::from_network(&self.network, &self.addr)?)
    }

    pub fn create_service(&self) -> anyhow::Result<GardenService> {
        Ok(GardenService::new(self.transport()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_local_garden() {
        let cli = Cli::try_parse_from(["wsh"]).unwrap();
        assert_eq!(cli.global.network, "tcp");
        assert_eq!(cli.global.addr, "127.0.0.1:7777");
        assert_eq!(cli.global.log_file, None);
        assert_eq!(
            cli.global.transport().unwrap(),
            Transport::tcp("127.0.0.1:7777")
        );
    }

    #[test]
    fn unix_transport_from_flags() {
        let cli =
            Cli::try_parse_from(["wsh", "--network", "unix", "--addr", "/tmp/garden.sock"])
                .unwrap();
        assert_eq!(
            cli.global.transport().unwrap(),
            Transport::unix("/tmp/garden.sock")
        );
    }

    #[test]
    fn unknown_network_is_rejected_when_connecting() {
        let cli = Cli::try_parse_from(["wsh", "--network", "udp"]).unwrap();
        assert!(cli.global.create_service().is_err());
    }
}
