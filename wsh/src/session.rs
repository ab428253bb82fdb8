//! Interactive session lifecycle.
//!
//! ```text
//! Initial -> TerminalRaw -> ContainerResolved -> ProcessRunning -> Terminated -> TerminalRestored
//! ```
//!
//! Every failure after `TerminalRaw` jumps straight to `TerminalRestored`;
//! the [`RawModeGuard`] makes that unconditional.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::resize::{self, ResizePropagator};
use crate::resolver::{self, ContainerSelection};
use crate::service::{
    ContainerService, ContainerSpec, ProcessExit, ProcessIo, ProcessSpec, Properties,
};
use crate::terminal::{RawModeGuard, Terminal, WindowSize};

/// Root filesystem used when creating a container without an explicit one.
pub const DEFAULT_ROOTFS: &str = "docker:///ubuntu#14.04";

const SHELL: &str = "bash";
const SHELL_ARGS: &[&str] = &["-l"];

const INPUT_BUFFER_SIZE: usize = 4096;
const INPUT_CHANNEL_CAPACITY: usize = 32;
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Everything a session needs to know, passed in by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Create a new container instead of attaching to an existing one.
    pub create: bool,
    /// Container to attach to. Ignored when `create` is set.
    pub handle: Option<String>,
    /// Root filesystem for `create`.
    pub rootfs: String,
    /// Attached on create; used as the list filter for most-recent selection.
    pub properties: Properties,
    /// Local `TERM`, forwarded to the shell when set.
    pub term: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            create: false,
            handle: None,
            rootfs: DEFAULT_ROOTFS.to_string(),
            properties: Properties::new(),
            term: None,
        }
    }
}

impl SessionConfig {
    /// Container selection implied by this configuration.
    pub fn selection(&self) -> ContainerSelection {
        let spec = ContainerSpec {
            rootfs: self.rootfs.clone(),
            properties: self.properties.clone(),
        };
        ContainerSelection::new(self.create, self.handle.as_deref(), spec)
    }

    /// The login shell: privileged, TTY attached, `TERM` forwarded.
    pub fn process_spec(&self, window_size: Option<WindowSize>) -> ProcessSpec {
        let mut spec = ProcessSpec::new(SHELL)
            .args(SHELL_ARGS.iter().copied())
            .privileged(true)
            .tty(true);

        if let Some(term) = &self.term {
            spec = spec.env("TERM", term);
        }
        if let Some(size) = window_size {
            spec = spec.window_size(size);
        }
        spec
    }
}

/// Session lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Initial,
    TerminalRaw,
    ContainerResolved,
    ProcessRunning,
    Terminated,
    TerminalRestored,
}

/// One interactive shell session.
pub struct Session {
    config: SessionConfig,
    service: Arc<dyn ContainerService>,
    resize_events: Option<BoxStream<'static, ()>>,
    termination_signals: Option<BoxStream<'static, i32>>,
    state: SessionState,
}

impl Session {
    pub fn new(config: SessionConfig, service: Arc<dyn ContainerService>) -> Self {
        Self {
            config,
            service,
            resize_events: None,
            termination_signals: None,
            state: SessionState::Initial,
        }
    }

    /// Use `events` as the window-change source instead of SIGWINCH.
    pub fn with_resize_events(mut self, events: impl Stream<Item = ()> + Send + 'static) -> Self {
        self.resize_events = Some(events.boxed());
        self
    }

    /// Use `signals` as the termination source instead of SIGTERM/SIGHUP/SIGINT.
    pub fn with_termination_signals(
        mut self,
        signals: impl Stream<Item = i32> + Send + 'static,
    ) -> Self {
        self.termination_signals = Some(signals.boxed());
        self
    }

    /// Run the session to completion on `terminal`.
    ///
    /// Returns when the remote shell exits, or early when a termination
    /// signal arrives at any stage. Raw mode is always undone before this
    /// returns, whatever the outcome.
    pub async fn run(mut self, terminal: Arc<dyn Terminal>) -> Result<ProcessExit, SessionError> {
        // Registered before raw mode so a signal arriving during setup is
        // handled by the session rather than killing the process in raw mode.
        let mut signals = match self.termination_signals.take() {
            Some(signals) => signals,
            None => termination_signals(),
        };

        let guard = RawModeGuard::enter(terminal.clone()).map_err(SessionError::TerminalMode)?;
        self.transition(SessionState::TerminalRaw);

        let result = tokio::select! {
            result = self.attach(&terminal) => result,
            Some(signal) = signals.next() => Err(SessionError::Interrupted(signal)),
        };
        if let Err(SessionError::Interrupted(signal)) = &result {
            warn!(signal, state = ?self.state, "Session interrupted");
        }

        guard.restore();
        self.transition(SessionState::TerminalRestored);

        if let Ok(exit) = &result {
            info!(exit_status = exit.exit_status, "Remote process exited");
        }
        result
    }

    async fn attach(&mut self, terminal: &Arc<dyn Terminal>) -> Result<ProcessExit, SessionError> {
        let container =
            resolver::resolve(self.service.as_ref(), &self.config.selection()).await?;
        self.transition(SessionState::ContainerResolved);

        let input = terminal.input().map_err(SessionError::TerminalUnavailable)?;
        let output = terminal.output().map_err(SessionError::TerminalUnavailable)?;

        let (stdin_tx, stdin_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let io = ProcessIo {
            stdin: stdin_rx,
            stdout: output_tx.clone(),
            stderr: output_tx,
        };

        let spec = self.config.process_spec(terminal.window_size().ok());
        debug!(container = %container, ?spec, "Starting process");

        let process = self
            .service
            .run(&container, spec, io)
            .await
            .map_err(|source| SessionError::SpawnFailed {
                container: container.to_string(),
                source,
            })?;
        self.transition(SessionState::ProcessRunning);

        let output_pump = spawn_output_pump(output, output_rx);
        let input_pump = match spawn_input_pump(input, stdin_tx) {
            Ok(pump) => Some(pump),
            Err(e) => {
                warn!(error = %e, "Failed to start input pump, terminal input is not forwarded");
                None
            }
        };

        let notifications = match self.resize_events.take() {
            Some(events) => events,
            None => resize::window_changes().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to watch window size changes");
                stream::empty().boxed()
            }),
        };
        let resizer =
            ResizePropagator::new(terminal.clone(), process.clone(), notifications).spawn();

        let result = process.wait().await.map_err(SessionError::WaitFailed);
        resizer.stop();
        if let Some(pump) = &input_pump {
            pump.stop();
        }
        self.transition(SessionState::Terminated);

        if result.is_ok() {
            drain_output(output_pump).await;
        }
        result
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }
}

/// SIGTERM, SIGHUP and SIGINT as signal numbers.
fn termination_signals() -> BoxStream<'static, i32> {
    use tokio::signal::unix::{SignalKind, signal};
    use tokio_stream::wrappers::SignalStream;

    let kinds = [
        (SignalKind::terminate(), libc::SIGTERM),
        (SignalKind::hangup(), libc::SIGHUP),
        (SignalKind::interrupt(), libc::SIGINT),
    ];

    let streams = kinds.into_iter().filter_map(|(kind, signo)| match signal(kind) {
        Ok(sig) => Some(SignalStream::new(sig).map(move |()| signo).boxed()),
        Err(e) => {
            warn!(signal = signo, error = %e, "Failed to register signal handler");
            None
        }
    });

    stream::select_all(streams).boxed()
}

/// Stops the input pump when stopped or dropped.
///
/// The pump notices within one terminal read timeout and leaves anything
/// typed afterwards unread.
struct InputPump {
    stop: Arc<AtomicBool>,
}

impl InputPump {
    fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Copy terminal input into the process's stdin channel.
///
/// Runs on a plain thread because terminal reads block.
fn spawn_input_pump(
    mut input: Box<dyn Read + Send>,
    stdin_tx: mpsc::Sender<Vec<u8>>,
) -> io::Result<InputPump> {
    let stop = Arc::new(AtomicBool::new(false));
    let stopped = stop.clone();

    std::thread::Builder::new()
        .name("wsh-input".to_string())
        .spawn(move || {
            let mut buf = [0u8; INPUT_BUFFER_SIZE];
            while !stopped.load(Ordering::Acquire) {
                match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdin_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        debug!(error = %e, "Terminal input closed");
                        break;
                    }
                }
            }
        })?;

    Ok(InputPump { stop })
}

/// Copy process output onto the terminal until every sender is gone.
fn spawn_output_pump(
    mut output: Box<dyn Write + Send>,
    mut output_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(chunk) = output_rx.blocking_recv() {
            if let Err(e) = output.write_all(&chunk).and_then(|()| output.flush()) {
                debug!(error = %e, "Terminal output closed");
                break;
            }
        }
    })
}

async fn drain_output(output_pump: JoinHandle<()>) {
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, output_pump)
        .await
        .is_err()
    {
        debug!("Output still open after process exit, not waiting further");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_spec_is_privileged_login_shell() {
        let config = SessionConfig {
            term: Some("xterm-256color".into()),
            ..Default::default()
        };
        let spec = config.process_spec(Some(WindowSize::new(24, 80)));

        assert_eq!(spec.path, "bash");
        assert_eq!(spec.args, vec!["-l"]);
        assert!(spec.privileged);
        assert!(spec.tty);
        assert_eq!(spec.env_pairs(), vec!["TERM=xterm-256color"]);
        assert_eq!(spec.window_size, Some(WindowSize::new(24, 80)));
    }

    #[test]
    fn unset_term_is_not_forwarded() {
        let spec = SessionConfig::default().process_spec(None);
        assert!(spec.env.is_empty());
        assert!(spec.tty);
        assert_eq!(spec.window_size, None);
    }

    #[test]
    fn default_config_selects_most_recent() {
        let config = SessionConfig::default();
        assert_eq!(config.rootfs, DEFAULT_ROOTFS);
        assert_eq!(
            config.selection(),
            ContainerSelection::MostRecent(Properties::new())
        );
    }

    #[test]
    fn create_selection_carries_rootfs() {
        let config = SessionConfig {
            create: true,
            handle: Some("ignored".into()),
            rootfs: "docker:///busybox".into(),
            ..Default::default()
        };
        assert_eq!(
            config.selection(),
            ContainerSelection::Create(ContainerSpec::new("docker:///busybox"))
        );
    }
}
