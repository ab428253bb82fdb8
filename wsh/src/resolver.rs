//! Container resolution.
//!
//! Picks the container a session attaches to. Exactly one strategy applies,
//! in priority order: create a new container, look up an explicit handle, or
//! take the most recently created active container.

use tracing::{debug, instrument};

use crate::error::SessionError;
use crate::service::{ContainerRef, ContainerService, ContainerSpec, Properties};

/// How the target container is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerSelection {
    /// Create a fresh container from this spec.
    Create(ContainerSpec),
    /// Attach to the named container.
    Handle(String),
    /// Attach to the newest container matching these properties.
    MostRecent(Properties),
}

impl ContainerSelection {
    /// Apply the priority order: `create` beats `handle`, which beats
    /// most-recent selection. An empty handle counts as no handle.
    pub fn new(create: bool, handle: Option<&str>, spec: ContainerSpec) -> Self {
        if create {
            return ContainerSelection::Create(spec);
        }

        match handle {
            Some(handle) if !handle.is_empty() => ContainerSelection::Handle(handle.to_string()),
            _ => ContainerSelection::MostRecent(spec.properties),
        }
    }
}

/// Resolve `selection` against the service. No retries.
#[instrument(skip(service), level = "debug")]
pub async fn resolve(
    service: &dyn ContainerService,
    selection: &ContainerSelection,
) -> Result<ContainerRef, SessionError> {
    match selection {
        ContainerSelection::Create(spec) => {
            debug!(rootfs = %spec.rootfs, "Creating container");
            let container = service
                .create(spec.clone())
                .await
                .map_err(SessionError::CreateFailed)?;
            debug!(handle = %container, "Container created");
            Ok(container)
        }
        ContainerSelection::Handle(handle) => {
            debug!(handle = %handle, "Looking up container");
            service
                .lookup(handle)
                .await
                .map_err(|source| SessionError::LookupFailed {
                    handle: handle.clone(),
                    source,
                })
        }
        ContainerSelection::MostRecent(properties) => {
            let containers = service
                .list(properties)
                .await
                .map_err(SessionError::EnumerationFailed)?;
            debug!(count = containers.len(), "Listed containers");

            let container = newest(containers).ok_or(SessionError::NoContainersAvailable)?;
            debug!(handle = %container, "Selected most recent container");
            Ok(container)
        }
    }
}

/// The newest container of a listing.
///
/// The service does not promise an order; its listings are taken to be in
/// creation order, so the last entry is the newest.
pub fn newest(containers: Vec<ContainerRef>) -> Option<ContainerRef> {
    containers.into_iter().last()
}
