use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use wsh::terminal::{Terminal, WindowSize};

/// Terminal double.
///
/// Window size queries pop scripted answers (`None` fails the query); once the
/// script is exhausted every query returns the fallback size.
pub struct FakeTerminal {
    fail_raw: AtomicBool,
    raw: AtomicUsize,
    restores: AtomicUsize,
    sizes: Mutex<VecDeque<Option<WindowSize>>>,
    fallback: Option<WindowSize>,
    answered: Mutex<Vec<WindowSize>>,
    input: Mutex<Vec<u8>>,
    idle_input: AtomicBool,
    reads: Arc<AtomicUsize>,
    output: Arc<Mutex<Vec<u8>>>,
}

impl Default for FakeTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTerminal {
    /// A 24x80 terminal.
    pub fn new() -> Self {
        Self {
            fail_raw: AtomicBool::new(false),
            raw: AtomicUsize::new(0),
            restores: AtomicUsize::new(0),
            sizes: Mutex::new(VecDeque::new()),
            fallback: Some(WindowSize::new(24, 80)),
            answered: Mutex::new(Vec::new()),
            input: Mutex::new(Vec::new()),
            idle_input: AtomicBool::new(false),
            reads: Arc::new(AtomicUsize::new(0)),
            output: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A terminal that rejects raw mode.
    pub fn rejecting_raw() -> Self {
        let terminal = Self::new();
        terminal.fail_raw.store(true, Ordering::SeqCst);
        terminal
    }

    /// Answer window size queries from `script`, then with `fallback`.
    pub fn with_sizes<I>(mut self, script: I, fallback: Option<WindowSize>) -> Self
    where
        I: IntoIterator<Item = Option<WindowSize>>,
    {
        *self.sizes.get_mut() = script.into_iter().collect();
        self.fallback = fallback;
        self
    }

    /// Bytes the user "types".
    pub fn with_input(self, input: &[u8]) -> Self {
        *self.input.lock() = input.to_vec();
        self
    }

    /// Keep input open after the scripted bytes: further reads time out the
    /// way an idle tty does, instead of reaching end of file.
    pub fn with_idle_input(self) -> Self {
        self.idle_input.store(true, Ordering::SeqCst);
        self
    }

    /// Reads attempted on the input so far.
    pub fn input_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn raw_count(&self) -> usize {
        self.raw.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }

    /// Sizes returned by successful queries, in order.
    pub fn answered(&self) -> Vec<WindowSize> {
        self.answered.lock().clone()
    }

    /// Everything written to the terminal.
    pub fn written(&self) -> Vec<u8> {
        self.output.lock().clone()
    }
}

impl Terminal for FakeTerminal {
    fn enter_raw(&self) -> io::Result<()> {
        if self.fail_raw.load(Ordering::SeqCst) {
            return Err(io::Error::other("Inappropriate ioctl for device"));
        }
        self.raw.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn restore(&self) -> io::Result<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn window_size(&self) -> io::Result<WindowSize> {
        let answer = self.sizes.lock().pop_front().unwrap_or(self.fallback);
        match answer {
            Some(size) => {
                self.answered.lock().push(size);
                Ok(size)
            }
            None => Err(io::Error::other("window size unavailable")),
        }
    }

    fn input(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(ScriptedInput {
            data: Cursor::new(self.input.lock().clone()),
            idle: self.idle_input.load(Ordering::SeqCst),
            reads: self.reads.clone(),
        }))
    }

    fn output(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(SharedWriter(self.output.clone())))
    }
}

struct ScriptedInput {
    data: Cursor<Vec<u8>>,
    idle: bool,
    reads: Arc<AtomicUsize>,
}

impl Read for ScriptedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.data.read(buf)? {
            0 if self.idle => {
                std::thread::sleep(Duration::from_millis(5));
                Err(io::ErrorKind::TimedOut.into())
            }
            n => Ok(n),
        }
    }
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
