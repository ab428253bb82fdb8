//! wsh shared - types used on both sides of the orchestration client.
//!
//! Holds the transport addressing, the common error type and the wire
//! definitions for the garden orchestration service.

pub mod errors;
pub mod transport;

// Generated protobuf types
pub mod generated {
    #![allow(clippy::all, unused_qualifications)]
    tonic::include_proto!("garden.v1");
}

pub use errors::{WshError, WshResult};
pub use transport::Transport;

// Garden service
pub use generated::garden_client::GardenClient;
pub use generated::garden_server::{Garden, GardenServer};

// All generated types
pub use generated::*;
