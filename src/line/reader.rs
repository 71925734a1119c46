//! Line reader with switchable zlib inflation.

use std::io::{self, Read};

use flate2::{Decompress, FlushDecompress, Status};

use super::LineHook;
use crate::error::{DcError, Result};

/// Read buffer size. TCP MTU is ~1500.
const READ_BUF: usize = 2048;

/// Default maximum line length (32 KiB).
pub const DEFAULT_MAX_LINE: usize = READ_BUF * 16;

/// A line reader over a byte stream that supports the zlib on/off
/// switching procedure required by hub and client connections.
///
/// The reader is single-owner; a returned line slice is only valid until
/// the next call to [`Reader::read_line`] or any read method.
pub struct Reader<R> {
    src: R,
    delim: u8,

    // plaintext buffer over `src`
    buf: Box<[u8]>,
    pos: usize,
    len: usize,

    // inflate window; pending decompressed bytes live in zbuf[zpos..zlen]
    inflate: Option<Box<Decompress>>,
    zlib_on: bool,
    zbuf: Box<[u8]>,
    zpos: usize,
    zlen: usize,

    line: Vec<u8>,
    max_line: usize,
    on_line: Option<LineHook>,
}

impl<R: Read> Reader<R> {
    /// Creates a line reader framing on the given delimiter byte.
    pub fn new(src: R, delim: u8) -> Reader<R> {
        Reader {
            src,
            delim,
            buf: vec![0; READ_BUF].into_boxed_slice(),
            pos: 0,
            len: 0,
            inflate: None,
            zlib_on: false,
            zbuf: vec![0; READ_BUF].into_boxed_slice(),
            zpos: 0,
            zlen: 0,
            line: Vec::with_capacity(READ_BUF),
            max_line: DEFAULT_MAX_LINE,
            on_line: None,
        }
    }

    /// Sets the maximum accepted line length in bytes, including the
    /// delimiter.
    pub fn set_max_line(&mut self, n: usize) {
        self.max_line = n;
    }

    /// Registers a hook called with each raw line (delimiter included)
    /// before it is returned. The hook may return `Ok(false)` to silently
    /// consume the line and continue reading.
    pub fn on_line(&mut self, hook: LineHook) {
        self.on_line = Some(hook);
    }

    /// Switches the read source into zlib-inflate mode starting at the
    /// current byte. Fails if inflation is already active.
    ///
    /// The decoder state is reset and reused across repeated toggles.
    pub fn enable_inflate(&mut self) -> Result<()> {
        if self.zlib_on {
            return Err(DcError::compression("zlib already active"));
        }
        match self.inflate {
            Some(ref mut d) => d.reset(true),
            None => self.inflate = Some(Box::new(Decompress::new(true))),
        }
        self.zlib_on = true;
        self.zpos = 0;
        self.zlen = 0;
        tracing::debug!("reader: inflate enabled");
        Ok(())
    }

    /// Whether the reader is currently inflating.
    #[inline]
    pub fn is_inflating(&self) -> bool {
        self.zlib_on
    }

    fn fill_src(&mut self) -> io::Result<usize> {
        debug_assert_eq!(self.pos, self.len);
        self.pos = 0;
        self.len = 0;
        let n = loop {
            match self.src.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.len = n;
        Ok(n)
    }

    /// Pulls the next decompressed window out of the inflater, consuming
    /// exactly the input bytes the stream used. On end-of-stream the
    /// reader flips back to the plaintext source; bytes decompressed
    /// before the end marker stay pending and are delivered first.
    fn refill_inflated(&mut self) -> io::Result<()> {
        debug_assert!(self.zlib_on && self.zpos == self.zlen);
        if self.pos == self.len {
            self.fill_src()?;
        }
        let input_empty = self.pos == self.len;
        let (consumed, produced, status) = {
            let inflate = self
                .inflate
                .as_mut()
                .expect("inflate state exists while active");
            let in_before = inflate.total_in();
            let out_before = inflate.total_out();
            let status = inflate
                .decompress(
                    &self.buf[self.pos..self.len],
                    &mut self.zbuf,
                    FlushDecompress::None,
                )
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            (
                (inflate.total_in() - in_before) as usize,
                (inflate.total_out() - out_before) as usize,
                status,
            )
        };
        self.pos += consumed;
        self.zpos = 0;
        self.zlen = produced;
        match status {
            Status::StreamEnd => {
                // plaintext framing resumes after the zlib trailer
                self.zlib_on = false;
                tracing::debug!("reader: zlib stream ended, back to plaintext");
            }
            Status::Ok | Status::BufError => {
                if produced == 0 && consumed == 0 {
                    if input_empty {
                        return Err(io::ErrorKind::UnexpectedEof.into());
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "zlib stream made no progress",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Returns the next byte of the logical stream, `None` at a clean EOF.
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            if self.zpos < self.zlen {
                let b = self.zbuf[self.zpos];
                self.zpos += 1;
                return Ok(Some(b));
            }
            if self.zlib_on {
                self.refill_inflated()?;
                continue;
            }
            if self.pos < self.len {
                let b = self.buf[self.pos];
                self.pos += 1;
                return Ok(Some(b));
            }
            if self.fill_src()? == 0 {
                return Ok(None);
            }
        }
    }

    /// Reads a single raw line up to and including the delimiter.
    ///
    /// Returns `Ok(None)` at a clean end of stream. A line exceeding the
    /// maximum length fails with [`DcError::Limit`] without skipping
    /// ahead, so subsequent reads keep failing until the caller re-aligns
    /// the stream.
    pub fn read_line(&mut self) -> Result<Option<&[u8]>> {
        'next_line: loop {
            self.line.clear();
            loop {
                if self.line.len() >= self.max_line {
                    return Err(DcError::Limit("line"));
                }
                let b = match self.next_byte()? {
                    Some(b) => b,
                    None if self.line.is_empty() => return Ok(None),
                    None => return Err(DcError::Io(io::ErrorKind::UnexpectedEof.into())),
                };
                self.line.push(b);
                if b == self.delim {
                    break;
                }
            }
            if let Some(hook) = self.on_line.as_mut() {
                if !hook(&self.line)? {
                    tracing::debug!(len = self.line.len(), "reader: line dropped by hook");
                    continue 'next_line;
                }
            }
            return Ok(Some(&self.line));
        }
    }

    /// Bypass-framing read into a caller buffer, honoring the current
    /// compression state. Used by binary file-transfer sub-streams.
    pub fn read_some(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.zpos < self.zlen {
                let n = out.len().min(self.zlen - self.zpos);
                out[..n].copy_from_slice(&self.zbuf[self.zpos..self.zpos + n]);
                self.zpos += n;
                return Ok(n);
            }
            if self.zlib_on {
                self.refill_inflated()?;
                continue;
            }
            if self.pos < self.len {
                let n = out.len().min(self.len - self.pos);
                out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            return self.src.read(out);
        }
    }

    /// Returns a sub-reader limited to `n` bytes of the stream.
    ///
    /// The sub-reader must be closed with [`BinaryReader::close`], which
    /// drains any unread remainder so the outer stream stays aligned on
    /// the next framed line.
    pub fn binary(&mut self, n: u64) -> BinaryReader<'_, R> {
        BinaryReader {
            r: self,
            remaining: n,
        }
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_some(buf)
    }
}

/// A limited sub-reader over a [`Reader`] window, used for binary file
/// payloads embedded in the line stream.
pub struct BinaryReader<'a, R> {
    r: &'a mut Reader<R>,
    remaining: u64,
}

impl<R: Read> BinaryReader<'_, R> {
    /// Bytes left in the window.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Drains the unread remainder of the window and releases the outer
    /// reader.
    pub fn close(mut self) -> Result<()> {
        let mut sink = [0u8; READ_BUF];
        while self.remaining > 0 {
            let want = sink.len().min(self.remaining as usize);
            let n = self.r.read_some(&mut sink[..want])?;
            if n == 0 {
                return Err(DcError::Io(io::ErrorKind::UnexpectedEof.into()));
            }
            self.remaining -= n as u64;
        }
        Ok(())
    }
}

impl<R: Read> Read for BinaryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let want = buf.len().min(self.remaining as usize);
        let n = self.r.read_some(&mut buf[..want])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
