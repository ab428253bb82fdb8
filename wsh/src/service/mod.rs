//! Remote orchestration service seam.
//!
//! [`ContainerService`] and [`ProcessHandle`] describe what the session needs
//! from the service. [`crate::portal::GardenService`] implements them over gRPC.

mod process;

pub use process::{ProcessExit, ProcessIo, ProcessSpec};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use wsh_shared::WshResult;

use crate::terminal::WindowSize;

/// Key/value properties attached to containers and used as list filters.
pub type Properties = BTreeMap<String, String>;

/// Opaque reference to a remote container.
///
/// The container's lifetime belongs to the remote service; this is only a name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    handle: String,
}

impl ContainerRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.handle)
    }
}

/// Parameters for creating a container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Root filesystem reference, e.g. `docker:///ubuntu#14.04`.
    pub rootfs: String,
    pub properties: Properties,
}

impl ContainerSpec {
    pub fn new(rootfs: impl Into<String>) -> Self {
        Self {
            rootfs: rootfs.into(),
            properties: Properties::new(),
        }
    }
}

/// Container operations offered by the remote service.
#[async_trait]
pub trait ContainerService: Send + Sync {
    /// Create a new container.
    async fn create(&self, spec: ContainerSpec) -> WshResult<ContainerRef>;

    /// Look up an existing container by handle.
    async fn lookup(&self, handle: &str) -> WshResult<ContainerRef>;

    /// List active containers matching all `properties`, in the order the
    /// service returns them.
    async fn list(&self, properties: &Properties) -> WshResult<Vec<ContainerRef>>;

    /// Start a process in `container` with its stdio bound to `io`.
    ///
    /// Returns once the process is started; it does not wait for exit.
    async fn run(
        &self,
        container: &ContainerRef,
        spec: ProcessSpec,
        io: ProcessIo,
    ) -> WshResult<Arc<dyn ProcessHandle>>;
}

/// A running remote process.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Service-assigned process id.
    fn id(&self) -> u32;

    /// Update the window size of the process's TTY.
    async fn set_window_size(&self, size: WindowSize) -> WshResult<()>;

    /// Block until the process terminates.
    async fn wait(&self) -> WshResult<ProcessExit>;
}
