//! Console I/O used by the print and read instructions.
//!
//! The processor never touches the standard streams directly; it goes
//! through a [`Console`], so tests and embedders can supply input and
//! capture output in memory.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// Byte-oriented character device.
pub trait Console {
    /// Writes all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Reads one byte, blocking if necessary. `None` at end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// True if a read would return without blocking, including at end of
    /// input.
    fn has_input(&mut self) -> io::Result<bool>;
}

/// In-memory console.
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferConsole {
    /// A console whose input is `input`.
    pub fn new(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Appends more input.
    pub fn feed(&mut self, input: impl AsRef<[u8]>) {
        self.input.extend(input.as_ref());
    }
}

impl Console for BufferConsole {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.input.pop_front())
    }

    // An exhausted buffer reports no input, so non-blocking reads at the
    // end of a buffer yield zero rather than end of input.
    fn has_input(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }
}

/// The process's standard input and output.
///
/// Input is read in chunks into a private queue so that availability can
/// be probed on the file descriptor without the standard library's own
/// buffer hiding pending bytes.
#[derive(Debug, Default)]
pub struct StdConsole {
    pending: VecDeque<u8>,
    eof: bool,
}

const READ_CHUNK: usize = 8192;

impl StdConsole {
    pub fn new() -> Self {
        Self::default()
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        let n = io::stdin().lock().read(&mut buf)?;
        if n == 0 {
            self.eof = true;
        }
        self.pending.extend(&buf[..n]);
        Ok(())
    }
}

impl Console for StdConsole {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.pending.is_empty() && !self.eof {
            self.fill()?;
        }
        Ok(self.pending.pop_front())
    }

    fn has_input(&mut self) -> io::Result<bool> {
        if !self.pending.is_empty() || self.eof {
            return Ok(true);
        }
        stdin_ready()
    }
}

#[cfg(unix)]
fn stdin_ready() -> io::Result<bool> {
    let mut fd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `fd` is a valid pollfd for the duration of the call and the
    // count passed is 1.
    let ready = unsafe { libc::poll(&mut fd, 1, 0) };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ready > 0 && fd.revents & (libc::POLLIN | libc::POLLHUP) != 0)
}

#[cfg(not(unix))]
fn stdin_ready() -> io::Result<bool> {
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_console_reads_in_order() {
        let mut console = BufferConsole::new("ab");
        assert!(console.has_input().unwrap());
        assert_eq!(console.read_byte().unwrap(), Some(b'a'));
        assert_eq!(console.read_byte().unwrap(), Some(b'b'));
        assert_eq!(console.read_byte().unwrap(), None);
        assert!(!console.has_input().unwrap());
    }

    #[test]
    fn buffer_console_collects_output() {
        let mut console = BufferConsole::default();
        console.write(b"4").unwrap();
        console.write(b"2").unwrap();
        assert_eq!(console.output(), b"42");
        assert_eq!(console.output_string(), "42");
    }

    #[test]
    fn feed_appends_input() {
        let mut console = BufferConsole::new("x");
        console.feed("y");
        assert_eq!(console.read_byte().unwrap(), Some(b'x'));
        assert_eq!(console.read_byte().unwrap(), Some(b'y'));
    }
}
