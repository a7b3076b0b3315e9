//! The application error stream.
//!
//! A write-only fan-out over one or more text sinks, stderr by default.
//! It is deliberately forgiving: applications log into it from arbitrary
//! places, so late writes, flushes on closed targets, and repeated
//! closes must all be harmless.

use std::fmt;
use std::io::{self, Write};

/// A fan-out error sink with idempotent close semantics.
///
/// Writes after [`close`](ErrorSink::close) are silently dropped, and
/// per-target I/O failures are swallowed; an error log must never take
/// the request cycle down with it.
pub struct ErrorSink {
    streams: Vec<Box<dyn Write + Send>>,
    closed: bool,
}

impl ErrorSink {
    /// Fans out over the given targets.
    pub fn new(streams: Vec<Box<dyn Write + Send>>) -> ErrorSink {
        ErrorSink {
            streams,
            closed: false,
        }
    }

    /// The default sink: stderr only.
    pub fn with_stderr() -> ErrorSink {
        ErrorSink::new(vec![Box::new(io::stderr())])
    }

    /// Writes `data` to every target. Dropped once closed.
    pub fn write(&mut self, data: &str) {
        if self.closed {
            return;
        }
        for stream in &mut self.streams {
            let _ = stream.write_all(data.as_bytes());
        }
    }

    /// Writes each line to every target. Dropped once closed.
    pub fn writelines<S: AsRef<str>>(&mut self, lines: &[S]) {
        if self.closed {
            return;
        }
        for stream in &mut self.streams {
            for line in lines {
                let _ = stream.write_all(line.as_ref().as_bytes());
            }
        }
    }

    /// Flushes every target, ignoring failures. A no-op once closed.
    pub fn flush(&mut self) {
        if self.closed {
            return;
        }
        for stream in &mut self.streams {
            let _ = stream.flush();
        }
    }

    /// Closes the sink. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether [`close`](ErrorSink::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink")
            .field("streams", &self.streams.len())
            .field("closed", &self.closed)
            .finish()
    }
}
