//! gRPC backend for the garden orchestration service.

pub mod connection;
pub mod garden;

pub use connection::Connection;
pub use garden::{GardenProcess, GardenService};
