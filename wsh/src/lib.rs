//! wsh - attach the local terminal to a shell inside a remote container.
//!
//! A [`Session`] puts the local terminal into raw mode, resolves the target
//! container (create, explicit handle, or the most recent one), starts a
//! privileged `bash -l` with a TTY in it, and keeps the remote window size in
//! step with the local one until the shell exits.
//!
//! The remote side is reached through the [`ContainerService`] trait;
//! [`GardenService`] implements it over gRPC.

pub mod error;
pub mod portal;
pub mod resize;
pub mod resolver;
pub mod service;
pub mod session;
pub mod terminal;

pub use error::SessionError;
pub use portal::GardenService;
pub use resolver::{ContainerSelection, resolve};
pub use service::{
    ContainerRef, ContainerService, ContainerSpec, ProcessExit, ProcessHandle, ProcessIo,
    ProcessSpec, Properties,
};
pub use session::{DEFAULT_ROOTFS, Session, SessionConfig, SessionState};
pub use terminal::{RawModeGuard, Terminal, TtyTerminal, WindowSize};
pub use wsh_shared::{Transport, WshError, WshResult};
