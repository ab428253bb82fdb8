//! Local terminal control.
//!
//! [`Terminal`] is the seam between the session and the local TTY. The real
//! implementation is [`TtyTerminal`]; sessions only see the trait so tests can
//! substitute a scripted device.
//!
//! Raw mode is held by a [`RawModeGuard`]: once [`RawModeGuard::enter`]
//! succeeds, the original mode is restored exactly once, either explicitly or
//! when the guard is dropped on an early return.

mod tty;

pub use tty::TtyTerminal;

use std::io::{self, Read, Write};
use std::sync::Arc;

/// Terminal geometry in character cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

impl WindowSize {
    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl std::fmt::Display for WindowSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// A local terminal device.
///
/// Mode changes happen on the session's primary flow only. `window_size` may
/// be called concurrently from the resize task.
pub trait Terminal: Send + Sync + 'static {
    /// Switch to raw mode, remembering the current mode for [`Terminal::restore`].
    fn enter_raw(&self) -> io::Result<()>;

    /// Put back the mode saved by `enter_raw`. Does nothing if no mode is saved.
    fn restore(&self) -> io::Result<()>;

    /// Query the current geometry.
    fn window_size(&self) -> io::Result<WindowSize>;

    /// Reader over terminal input, used by the input pump thread.
    ///
    /// A read may fail with `TimedOut` when nothing was typed for a while;
    /// the pump uses that to notice the session has ended.
    fn input(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Writer onto the terminal, used for process output.
    fn output(&self) -> io::Result<Box<dyn Write + Send>>;
}

/// Scoped raw mode.
///
/// Restores the terminal exactly once: on [`RawModeGuard::restore`] or on drop,
/// whichever comes first. Restore failures are logged and swallowed.
pub struct RawModeGuard {
    terminal: Arc<dyn Terminal>,
    restored: bool,
}

impl RawModeGuard {
    /// Enter raw mode. On error the terminal is left untouched and no guard exists.
    pub fn enter(terminal: Arc<dyn Terminal>) -> io::Result<Self> {
        terminal.enter_raw()?;
        tracing::debug!("Terminal switched to raw mode");
        Ok(Self {
            terminal,
            restored: false,
        })
    }

    /// Restore the original mode now.
    pub fn restore(mut self) {
        self.restore_once();
    }

    fn restore_once(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;

        match self.terminal.restore() {
            Ok(()) => tracing::debug!("Terminal mode restored"),
            Err(e) => tracing::warn!(error = %e, "Failed to restore terminal mode"),
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.restore_once();
    }
}
