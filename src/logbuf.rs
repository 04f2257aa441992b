//! Log Ring Buffer
//!
//! Bounded capture of diagnostic lines. The dashboard owns the terminal while it runs,
//! so every `tracing` event is written here instead and flushed to stdout on exit.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

/// Default number of lines retained
pub const DEFAULT_LOG_LINES: usize = 1000;

#[derive(Debug)]
struct Inner {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Inner {
    fn push(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }
}

/// Fixed-capacity FIFO store of log lines, cheap to clone and share between tasks
#[derive(Debug, Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<Inner>>,
    flushed: Arc<AtomicBool>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_LINES)
    }
}

impl LogBuffer {
    /// Create a buffer holding at most `capacity` lines (a capacity of 0 is treated as 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                lines: VecDeque::with_capacity(capacity.min(4096)),
                capacity,
            })),
            flushed: Arc::new(AtomicBool::new(false)),
        }
    }

    // A panic while holding the lock cannot leave the deque half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a single line, evicting the oldest line once capacity is exceeded
    pub fn push(&self, line: impl Into<String>) {
        self.lock().push(line.into());
    }

    /// Append a raw chunk of log output, one entry per non-empty line
    pub fn push_chunk(&self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        let mut inner = self.lock();
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                inner.push(line.to_string());
            }
        }
    }

    /// Change the capacity, dropping the oldest lines if the buffer shrinks
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.lock();
        inner.capacity = capacity.max(1);
        while inner.lines.len() > inner.capacity {
            inner.lines.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    /// Copy of the retained lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.iter().cloned().collect()
    }

    /// Write every retained line to `out`
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let inner = self.lock();
        for line in &inner.lines {
            writeln!(out, "{}", line)?;
        }
        out.flush()
    }

    /// Write the buffer to `out` the first time this is called on any clone.
    ///
    /// Returns `true` if this call performed the flush.
    pub fn flush_once<W: Write>(&self, out: &mut W) -> io::Result<bool> {
        if self.flushed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        self.write_to(out)?;
        Ok(true)
    }

    /// Flush to stdout once; errors are ignored since this runs on the way out
    pub fn flush_to_stdout(&self) {
        let stdout = io::stdout();
        let _ = self.flush_once(&mut stdout.lock());
    }
}

/// Per-event writer handed out to the `tracing` formatter
pub struct LogWriter {
    buffer: LogBuffer,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_chunk(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.clone(),
        }
    }
}

/// Flushes the buffer to stdout when dropped, at most once across all guards
pub struct FlushOnExit {
    buffer: LogBuffer,
}

impl FlushOnExit {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

impl Drop for FlushOnExit {
    fn drop(&mut self) {
        self.buffer.flush_to_stdout();
    }
}
