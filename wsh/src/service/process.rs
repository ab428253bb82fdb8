//! Process description and stdio wiring.

use tokio::sync::mpsc;

use crate::terminal::WindowSize;

/// Program to run inside a container.
///
/// Builder API in the spirit of `std::process::Command`.
///
/// ```rust
/// # use wsh::service::ProcessSpec;
/// let spec = ProcessSpec::new("bash")
///     .arg("-l")
///     .env("TERM", "xterm-256color")
///     .privileged(true);
/// assert_eq!(spec.args, vec!["-l"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    pub path: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub privileged: bool,
    /// Allocate a TTY for the process.
    pub tty: bool,
    /// Initial TTY size. The service picks a default when unset.
    pub window_size: Option<WindowSize>,
}

impl ProcessSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: vec![],
            env: vec![],
            privileged: false,
            tty: false,
            window_size: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.env.push((key.into(), val.into()));
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Enable TTY (pseudo-terminal) for interactive sessions.
    pub fn tty(mut self, enable: bool) -> Self {
        self.tty = enable;
        self
    }

    /// Initial TTY size.
    pub fn window_size(mut self, size: WindowSize) -> Self {
        self.window_size = Some(size);
        self
    }

    /// Environment rendered as `KEY=VALUE` strings.
    pub fn env_pairs(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

/// Stdio channels handed to the service when starting a process.
///
/// The service drains `stdin` into the process and pushes output chunks into
/// `stdout`/`stderr`. Dropping every output sender signals end of output.
pub struct ProcessIo {
    pub stdin: mpsc::Receiver<Vec<u8>>,
    pub stdout: mpsc::UnboundedSender<Vec<u8>>,
    pub stderr: mpsc::UnboundedSender<Vec<u8>>,
}

/// Termination status of a remote process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessExit {
    pub exit_status: i32,
}
