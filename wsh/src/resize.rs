//! Window size propagation.
//!
//! Forwards the local terminal geometry to the remote process: once at start,
//! then again after every window-change notification. Geometry is re-queried
//! per notification, so a burst of notifications may collapse into fewer
//! updates, but every value sent is one a query actually returned.

use std::io;
use std::sync::Arc;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::service::ProcessHandle;
use crate::terminal::Terminal;

/// Stream of SIGWINCH notifications for this process.
pub fn window_changes() -> io::Result<BoxStream<'static, ()>> {
    use tokio::signal::unix::{SignalKind, signal};
    use tokio_stream::wrappers::SignalStream;

    let winch = signal(SignalKind::window_change())?;
    Ok(SignalStream::new(winch).boxed())
}

/// Pushes terminal geometry into a running process.
pub struct ResizePropagator<S> {
    terminal: Arc<dyn Terminal>,
    process: Arc<dyn ProcessHandle>,
    notifications: S,
}

impl<S> ResizePropagator<S>
where
    S: Stream<Item = ()> + Send + Unpin + 'static,
{
    pub fn new(
        terminal: Arc<dyn Terminal>,
        process: Arc<dyn ProcessHandle>,
        notifications: S,
    ) -> Self {
        Self {
            terminal,
            process,
            notifications,
        }
    }

    /// Run on a background task. The task is aborted when the returned
    /// [`ResizeTask`] is dropped.
    pub fn spawn(self) -> ResizeTask {
        ResizeTask {
            handle: tokio::spawn(self.run()),
        }
    }

    /// Propagate the current size, then one update per notification until
    /// the notification stream ends.
    pub async fn run(self) {
        let Self {
            terminal,
            process,
            mut notifications,
        } = self;

        propagate(terminal.as_ref(), process.as_ref()).await;
        while notifications.next().await.is_some() {
            propagate(terminal.as_ref(), process.as_ref()).await;
        }

        tracing::debug!(process_id = process.id(), "Window change notifications ended");
    }
}

/// Push the current geometry once. Failures on either side skip this update.
async fn propagate(terminal: &dyn Terminal, process: &dyn ProcessHandle) {
    let size = match terminal.window_size() {
        Ok(size) => size,
        Err(e) => {
            tracing::trace!(error = %e, "Window size query failed, skipping update");
            return;
        }
    };

    match process.set_window_size(size).await {
        Ok(()) => tracing::trace!(process_id = process.id(), %size, "Window size sent"),
        Err(e) => tracing::debug!(
            process_id = process.id(),
            %size,
            error = %e,
            "Failed to send window size"
        ),
    }
}

/// Handle to a spawned [`ResizePropagator`].
pub struct ResizeTask {
    handle: JoinHandle<()>,
}

impl ResizeTask {
    /// Stop propagating. Idempotent.
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ResizeTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
