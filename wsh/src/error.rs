//! Session error taxonomy.
//!
//! Each variant names the stage that failed. Everything from container
//! resolution onward happens in raw mode, so the session restores the terminal
//! before any of those errors reach the caller.

use std::io;

use thiserror::Error;
use wsh_shared::WshError;

/// Fatal session failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Stdin is not a terminal or the device could not be opened.
    #[error("failed to open terminal: {0}")]
    TerminalUnavailable(#[source] io::Error),

    /// The device rejected the switch to raw mode.
    #[error("failed to set terminal to raw mode: {0}")]
    TerminalMode(#[source] io::Error),

    #[error("failed to create container: {0}")]
    CreateFailed(#[source] WshError),

    #[error("failed to lookup container '{handle}': {source}")]
    LookupFailed {
        handle: String,
        #[source]
        source: WshError,
    },

    #[error("failed to get containers: {0}")]
    EnumerationFailed(#[source] WshError),

    #[error("no containers")]
    NoContainersAvailable,

    #[error("failed to run process in container '{container}': {source}")]
    SpawnFailed {
        container: String,
        #[source]
        source: WshError,
    },

    /// Lost track of the remote process before it reported termination.
    #[error("failed to wait for process: {0}")]
    WaitFailed(#[source] WshError),

    /// A termination signal ended the local session early.
    #[error("interrupted by signal {0}")]
    Interrupted(i32),
}

impl SessionError {
    /// Short name of the failing stage, used as the message prefix.
    pub fn stage(&self) -> &'static str {
        match self {
            SessionError::TerminalUnavailable(_) | SessionError::TerminalMode(_) => "terminal",
            SessionError::CreateFailed(_)
            | SessionError::LookupFailed { .. }
            | SessionError::EnumerationFailed(_)
            | SessionError::NoContainersAvailable => "resolve",
            SessionError::SpawnFailed { .. } => "run",
            SessionError::WaitFailed(_) | SessionError::Interrupted(_) => "wait",
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Interrupted(signal) => 128 + signal,
            _ => 1,
        }
    }
}
