use std::sync::Arc;

use clap::Args;
use wsh::{DEFAULT_ROOTFS, Properties, Session, SessionConfig, SessionError, TtyTerminal};

#[derive(Args, Debug, Clone)]
pub struct ShellArgs {
    /// Create a new container
    #[arg(long)]
    pub create: bool,

    /// Rootfs for the container to create
    #[arg(long, env = "WSH_ROOTFS", default_value = DEFAULT_ROOTFS)]
    pub rootfs: String,

    /// Container property (repeatable); filters the most recent lookup, set on create
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Container to attach to
    pub handle: Option<String>,
}

impl ShellArgs {
    /// Session configuration for these flags. `term` is the local `TERM`.
    pub fn session_config(&self, term: Option<String>) -> SessionConfig {
        SessionConfig {
            create: self.create,
            handle: self.handle.clone(),
            rootfs: self.rootfs.clone(),
            properties: self.properties.iter().cloned().collect::<Properties>(),
            term,
        }
    }
}

pub async fn execute(args: ShellArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let service = Arc::new(global.create_service()?);
    let config = args.session_config(std::env::var("TERM").ok());

    let terminal = TtyTerminal::open().map_err(SessionError::TerminalUnavailable)?;
    let exit = Session::new(config, service)
        .run(Arc::new(terminal))
        .await?;

    tracing::debug!(exit_status = exit.exit_status, "Shell exited");
    Ok(())
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid property '{}': expected KEY=VALUE", s)),
    }
}
