//! Transport types for reaching the orchestration service.

use std::path::PathBuf;

use crate::errors::{WshError, WshResult};

/// Transport mechanism used to reach the orchestration service.
///
/// Selected by a network name (`tcp` or `unix`) plus an address, the same
/// pair the service itself is configured with.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Transport {
    /// TCP transport (`host:port`)
    Tcp { addr: String },

    /// Unix socket transport
    Unix { socket_path: PathBuf },
}

impl Transport {
    /// Create a TCP transport.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::Tcp { addr: addr.into() }
    }

    /// Create a Unix socket transport.
    pub fn unix(socket_path: impl Into<PathBuf>) -> Self {
        Self::Unix {
            socket_path: socket_path.into(),
        }
    }

    /// Build a transport from a network selector and an address.
    pub fn from_network(network: &str, addr: &str) -> WshResult<Self> {
        if addr.is_empty() {
            return Err(WshError::Config("remote address is empty".to_string()));
        }

        match network {
            "tcp" => {
                let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
                    WshError::Config(format!("invalid TCP address '{}': missing port", addr))
                })?;
                if host.is_empty() {
                    return Err(WshError::Config(format!(
                        "invalid TCP address '{}': missing host",
                        addr
                    )));
                }
                port.parse::<u16>().map_err(|e| {
                    WshError::Config(format!("invalid TCP port in '{}': {}", addr, e))
                })?;
                Ok(Self::tcp(addr))
            }
            "unix" => Ok(Self::unix(addr)),
            other => Err(WshError::Config(format!(
                "unsupported network '{}': expected tcp or unix",
                other
            ))),
        }
    }

    /// Network selector name of this transport.
    pub fn network(&self) -> &'static str {
        match self {
            Transport::Tcp { .. } => "tcp",
            Transport::Unix { .. } => "unix",
        }
    }

    /// Get the URI representation of this transport.
    pub fn to_uri(&self) -> String {
        match self {
            Transport::Tcp { addr } => format!("tcp://{}", addr),
            Transport::Unix { socket_path } => format!("unix://{}", socket_path.display()),
        }
    }

    /// Parse a transport from a URI string.
    pub fn from_uri(uri: &str) -> WshResult<Self> {
        if let Some(addr) = uri.strip_prefix("tcp://") {
            Self::from_network("tcp", addr)
        } else if let Some(path) = uri.strip_prefix("unix://") {
            Self::from_network("unix", path)
        } else {
            Err(WshError::Config(format!(
                "invalid transport URI '{}': expected tcp:// or unix://",
                uri
            )))
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl std::str::FromStr for Transport {
    type Err = WshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}
