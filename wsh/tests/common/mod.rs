#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wsh::{Session, SessionConfig};
use wsh_test_utils::FakeService;

/// Session wired to `service` with inert resize and termination sources.
pub fn session(config: SessionConfig, service: &Arc<FakeService>) -> Session {
    Session::new(config, service.clone())
        .with_resize_events(futures::stream::empty())
        .with_termination_signals(futures::stream::pending())
}

/// Poll `condition` until it holds, panicking after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
