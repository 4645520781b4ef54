//! The link the telemetry arrives on.
//!
//! The dashboard only needs "give me the next complete line, or tell me none
//! arrived within the read timeout". [`LineSource`] is that seam;
//! [`LineReader`] frames lines out of any [`Read`] whose `read` returns `0`
//! (or `WouldBlock`/`TimedOut`) when its timeout expires, such as a serial
//! port opened with `VMIN = 0`.

use std::io::{self, Read};
use std::path::PathBuf;

/// Lines longer than this without a terminator are cut and handed on as-is.
pub const MAX_LINE_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read failed: {0}")]
    Read(#[from] io::Error),
    #[error("link closed")]
    Closed,
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),
}

/// A bounded-wait source of newline-terminated records.
pub trait LineSource {
    /// Wait at most the source's read timeout for one complete line.
    ///
    /// `Ok(None)` means the timeout expired with no complete line; partial
    /// data is kept for the next call. Returned lines include their
    /// terminator when one was received.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Try to re-establish the link after a read error.
    fn reconnect(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }
}

/// Splits a byte stream into lines, carrying partial lines across timeouts.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    max_line: usize,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_line(inner, MAX_LINE_LEN)
    }

    pub fn with_max_line(inner: R, max_line: usize) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            max_line: max_line.max(1),
        }
    }

    /// Bytes received but not yet terminated.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Return the next line, or `None` once a read comes back empty.
    pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            match self.inner.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let cut = match self.pending.iter().position(|&b| b == b'\n') {
            Some(pos) if pos < self.max_line => pos + 1,
            _ if self.pending.len() >= self.max_line => {
                log::warn!("line exceeded {} bytes without a terminator", self.max_line);
                self.max_line
            }
            _ => return None,
        };
        let rest = self.pending.split_off(cut);
        Some(std::mem::replace(&mut self.pending, rest))
    }
}

impl<R: Read> LineSource for LineReader<R> {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.next_line()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out one scripted read result per call; empty script reads 0.
    struct Script(VecDeque<io::Result<Vec<u8>>>);

    impl Script {
        fn new(parts: Vec<io::Result<Vec<u8>>>) -> Self {
            Self(parts.into())
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.0.push_front(Ok(bytes[n..].to_vec()));
                    }
                    Ok(n)
                }
            }
        }
    }

    #[test]
    fn splits_lines_in_one_read() {
        let mut r = LineReader::new(Script::new(vec![Ok(b"{\"a\":1}\n{\"b\":2}\n".to_vec())]));
        assert_eq!(r.next_line().unwrap(), Some(b"{\"a\":1}\n".to_vec()));
        assert_eq!(r.next_line().unwrap(), Some(b"{\"b\":2}\n".to_vec()));
        assert_eq!(r.next_line().unwrap(), None);
    }

    #[test]
    fn partial_line_survives_timeout() {
        let mut r = LineReader::new(Script::new(vec![
            Ok(b"{\"heap\":".to_vec()),
            Ok(Vec::new()),
            Ok(b"5}\n".to_vec()),
        ]));
        assert_eq!(r.next_line().unwrap(), None);
        assert_eq!(r.pending(), 8);
        assert_eq!(r.next_line().unwrap(), Some(b"{\"heap\":5}\n".to_vec()));
    }

    #[test]
    fn would_block_and_interrupted_are_not_errors() {
        let mut r = LineReader::new(Script::new(vec![
            Err(io::ErrorKind::Interrupted.into()),
            Ok(b"x".to_vec()),
            Err(io::ErrorKind::WouldBlock.into()),
        ]));
        assert_eq!(r.next_line().unwrap(), None);
        assert_eq!(r.pending(), 1);
    }

    #[test]
    fn hard_errors_surface() {
        let mut r = LineReader::new(Script::new(vec![Err(io::Error::other("unplugged"))]));
        assert!(matches!(r.read_line(), Err(TransportError::Read(_))));
    }

    #[test]
    fn overlong_line_is_cut() {
        let mut r = LineReader::with_max_line(Script::new(vec![Ok(b"abcdefgh\n".to_vec())]), 4);
        assert_eq!(r.next_line().unwrap(), Some(b"abcd".to_vec()));
        assert_eq!(r.next_line().unwrap(), Some(b"efgh".to_vec()));
        assert_eq!(r.next_line().unwrap(), Some(b"\n".to_vec()));
    }

    #[test]
    fn large_line_spanning_chunks() {
        let mut line = vec![b'x'; 3000];
        line.push(b'\n');
        let mut r = LineReader::new(Script::new(vec![Ok(line.clone())]));
        assert_eq!(r.next_line().unwrap(), Some(line));
    }

    #[test]
    fn default_reconnect_reports_closed() {
        let mut r = LineReader::new(Script::new(vec![]));
        assert!(matches!(r.reconnect(), Err(TransportError::Closed)));
    }
}
