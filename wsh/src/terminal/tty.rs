//! Terminal device bound to standard input.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::path::Path;
use std::sync::Mutex;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{SetArg, Termios, cfmakeraw, tcgetattr, tcsetattr};

use super::{Terminal, WindowSize};

const STDIN_DEVICE: &str = "/dev/stdin";

/// How long a read waits for input before reporting `TimedOut`.
const INPUT_POLL_MS: u16 = 100;

nix::ioctl_read_bad!(tiocgwinsz, libc::TIOCGWINSZ, libc::winsize);

/// The terminal device standard input is connected to.
///
/// The device is opened read/write so it can serve as the process's stdin,
/// stdout and stderr at once.
pub struct TtyTerminal {
    device: File,
    saved: Mutex<Option<Termios>>,
}

impl TtyTerminal {
    /// Open the terminal bound to standard input.
    ///
    /// Fails if stdin is not a terminal or the device cannot be opened.
    pub fn open() -> io::Result<Self> {
        Self::open_path(Path::new(STDIN_DEVICE))
    }

    /// Open a specific terminal device.
    pub fn open_path(path: &Path) -> io::Result<Self> {
        let device = OpenOptions::new().read(true).write(true).open(path)?;
        Self::from_device(device)
    }

    /// Wrap an already open device. The file must be a terminal.
    pub fn from_device(device: File) -> io::Result<Self> {
        if !device.is_terminal() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "not a terminal",
            ));
        }

        Ok(Self {
            device,
            saved: Mutex::new(None),
        })
    }

    fn saved(&self) -> std::sync::MutexGuard<'_, Option<Termios>> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Terminal for TtyTerminal {
    fn enter_raw(&self) -> io::Result<()> {
        let original = tcgetattr(&self.device)?;
        let mut raw = original.clone();
        cfmakeraw(&mut raw);
        tcsetattr(&self.device, SetArg::TCSANOW, &raw)?;

        let mut saved = self.saved();
        // Keep the first saved mode if raw mode is entered twice.
        if saved.is_none() {
            *saved = Some(original);
        }
        Ok(())
    }

    fn restore(&self) -> io::Result<()> {
        match self.saved().take() {
            // TCSADRAIN: input typed but not yet read stays queued for
            // whatever reads the terminal next.
            Some(original) => {
                tcsetattr(&self.device, SetArg::TCSADRAIN, &original)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn window_size(&self) -> io::Result<WindowSize> {
        let mut ws = libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: the fd is open for the lifetime of `self.device` and `ws`
        // is a valid, writable winsize.
        unsafe { tiocgwinsz(self.device.as_raw_fd(), &mut ws) }?;
        if ws.ws_row == 0 || ws.ws_col == 0 {
            return Err(io::Error::other("terminal reported an empty window size"));
        }

        Ok(WindowSize::new(ws.ws_row, ws.ws_col))
    }

    fn input(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(TtyReader {
            device: self.device.try_clone()?,
        }))
    }

    fn output(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.device.try_clone()?))
    }
}

/// Reads that give up after [`INPUT_POLL_MS`] with `TimedOut`, so the input
/// pump can stop without consuming keystrokes meant for the local shell.
struct TtyReader {
    device: File,
}

impl Read for TtyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut fds = [PollFd::new(self.device.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(INPUT_POLL_MS)) {
            Ok(0) => Err(io::ErrorKind::TimedOut.into()),
            Ok(_) => self.device.read(buf),
            Err(Errno::EINTR) => Err(io::ErrorKind::Interrupted.into()),
            Err(e) => Err(e.into()),
        }
    }
}
