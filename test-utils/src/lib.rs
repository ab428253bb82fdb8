//! Test doubles for wsh sessions.
//!
//! [`FakeService`] records every remote call and can be told to fail any of
//! them. [`FakeTerminal`] counts mode changes and replays scripted window
//! sizes.

mod service;
mod terminal;

pub use service::{Call, FakeProcess, FakeService, Op};
pub use terminal::FakeTerminal;
