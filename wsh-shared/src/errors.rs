//! Error types shared by the client library and the CLI.

use thiserror::Error;

/// Result alias used across wsh crates.
pub type WshResult<T> = Result<T, WshError>;

/// Failures talking to, or configuring access to, the orchestration service.
#[derive(Debug, Error)]
pub enum WshError {
    /// The remote service answered with a gRPC error status.
    #[error("rpc: {}", .0.message())]
    Rpc(#[from] tonic::Status),

    /// The channel to the remote service could not be established.
    #[error("transport: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The requested container or process does not exist on the remote side.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid configuration (address, network selector, properties).
    #[error("config: {0}")]
    Config(String),

    /// Local I/O failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected condition (closed channels, malformed responses).
    #[error("internal: {0}")]
    Internal(String),
}

impl WshError {
    /// Whether the remote side reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            WshError::NotFound(_) => true,
            WshError::Rpc(status) => status.code() == tonic::Code::NotFound,
            _ => false,
        }
    }
}
