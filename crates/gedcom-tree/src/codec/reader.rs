//! Forward-only byte reader with one byte of lookahead.
//!
//! Wraps any [`BufRead`] and exposes the next byte without consuming it,
//! which is all the line grammar needs.

use std::io::{self, BufRead, ErrorKind, Read};

/// Reader for scanning a byte stream.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    consumed: u64,
}

impl<R: BufRead> ByteReader<R> {
    /// Creates a new reader over a buffered source.
    pub fn new(inner: R) -> Self {
        Self { inner, consumed: 0 }
    }

    /// Returns the number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Returns the next byte without consuming it, `None` at end of stream.
    #[inline]
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Consumes one byte. Does nothing at end of stream.
    #[inline]
    pub fn bump(&mut self) -> io::Result<()> {
        if self.peek()?.is_some() {
            self.inner.consume(1);
            self.consumed += 1;
        }
        Ok(())
    }

    /// Consumes and returns the next byte.
    #[inline]
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let b = self.peek()?;
        if b.is_some() {
            self.inner.consume(1);
            self.consumed += 1;
        }
        Ok(b)
    }

    /// Consumes the next byte if it equals `expected`.
    #[inline]
    pub fn eat(&mut self, expected: u8) -> io::Result<bool> {
        if self.peek()? == Some(expected) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Appends consecutive bytes matching `accept` to `out`.
    pub fn take_while(&mut self, out: &mut Vec<u8>, accept: impl Fn(u8) -> bool) -> io::Result<()> {
        loop {
            let (taken, done) = {
                let buf = match self.inner.fill_buf() {
                    Ok(buf) => buf,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if buf.is_empty() {
                    return Ok(());
                }
                let taken = buf.iter().take_while(|&&b| accept(b)).count();
                out.extend_from_slice(&buf[..taken]);
                (taken, taken < buf.len())
            };
            self.inner.consume(taken);
            self.consumed += taken as u64;
            if done {
                return Ok(());
            }
        }
    }

    /// Drains everything that is left into `out`.
    pub fn read_rest(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        let n = self.inner.read_to_end(out)?;
        self.consumed += n as u64;
        Ok(n)
    }
}
