//! Output writer and process exit controller

use std::io::{self, Write};
use std::process::ExitCode;

use rayon::ThreadPool;

/// Writes results and diagnostics, flushing after every write
pub struct Output<O: Write, E: Write> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> Output<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Formatted text, written as is
    pub fn text(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    /// One diagnostic line on stderr
    pub fn diagnostic(&mut self, line: &str) -> io::Result<()> {
        write_line(&mut self.err, line)
    }

    /// A pipeline message: stdout for exit code 0, stderr otherwise
    pub fn message(&mut self, exit_code: i32, text: &str) -> io::Result<()> {
        if exit_code == 0 {
            write_line(&mut self.out, text)
        } else {
            write_line(&mut self.err, text)
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }

    /// Recover the underlying writers
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

fn write_line<W: Write>(w: &mut W, text: &str) -> io::Result<()> {
    w.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        w.write_all(b"\n")?;
    }
    w.flush()
}

/// The outcome of one invocation
///
/// Owns the worker pool, if one was started, so that it is shut down before
/// the process exits.
#[derive(Debug, Default)]
pub struct Exit {
    code: u8,
    pool: Option<ThreadPool>,
}

impl Exit {
    #[must_use]
    pub fn new(code: i32) -> Self {
        Self {
            code: u8::from(code != 0),
            pool: None,
        }
    }

    #[must_use]
    pub fn with_pool(mut self, pool: Option<ThreadPool>) -> Self {
        self.pool = pool;
        self
    }

    /// 0 on success, 1 on any failure
    #[must_use]
    pub fn code(&self) -> i32 {
        i32::from(self.code)
    }

    /// Shut down the worker pool and produce the process exit code
    #[must_use]
    pub fn finish(self) -> ExitCode {
        let Exit { code, pool } = self;
        drop(pool);
        ExitCode::from(code)
    }
}
