//! Buffered line writer with switchable zlib deflation and batching.

use std::io::{self, Write};

use flate2::{Compress, Compression, FlushCompress, Status};

use super::{LineHook, TimeoutHook};
use crate::error::{DcError, Result};

/// Default internal buffer size before an automatic flush.
const WRITE_BUF: usize = 4096;

/// Compression output scratch size.
const DEFLATE_BUF: usize = 4096;

/// A line writer over a byte stream.
///
/// The writer buffers lines until [`Writer::flush`], an automatic flush on
/// a full buffer, or the end of the outermost batch. It is single-owner
/// and not safe for concurrent use; see
/// [`spawn_async_writer`](super::spawn_async_writer) for the coalescing
/// async front-end.
///
/// The first I/O error is sticky: every subsequent call fails with it
/// until the writer is discarded.
pub struct Writer<W> {
    w: W,
    buf: Vec<u8>,
    buf_size: usize,

    deflate: Option<Box<Compress>>,
    deflate_level: Compression,
    zlib_on: bool,
    zbuf: Box<[u8]>,

    batch: usize,
    closed: bool,
    err: Option<(io::ErrorKind, String)>,

    on_line: Vec<LineHook>,
    /// Called with `true` before each flush and `false` after, so the
    /// collaborator can arm transport deadlines.
    timeout: Option<TimeoutHook>,
}

impl<W: Write> Writer<W> {
    /// Creates a line writer with the default buffer size.
    pub fn new(w: W) -> Writer<W> {
        Writer::with_buffer(w, 0)
    }

    /// Creates a line writer with the given buffer size (0 for default).
    pub fn with_buffer(w: W, buf_size: usize) -> Writer<W> {
        let buf_size = if buf_size == 0 { WRITE_BUF } else { buf_size };
        Writer {
            w,
            buf: Vec::with_capacity(buf_size),
            buf_size,
            deflate: None,
            deflate_level: Compression::default(),
            zlib_on: false,
            zbuf: vec![0; DEFLATE_BUF].into_boxed_slice(),
            batch: 0,
            closed: false,
            err: None,
            on_line: Vec::new(),
            timeout: None,
        }
    }

    /// Registers a hook called with each line before it is buffered. The
    /// hook may return `Ok(false)` to skip writing the line.
    pub fn on_line(&mut self, hook: LineHook) {
        self.on_line.push(hook);
    }

    /// Installs the flush deadline callback.
    pub fn set_timeout(&mut self, hook: TimeoutHook) {
        self.timeout = Some(hook);
    }

    /// Whether the writer is currently deflating.
    #[inline]
    pub fn is_deflating(&self) -> bool {
        self.zlib_on
    }

    /// Returns the sticky error, if any.
    pub fn err(&self) -> Option<io::Error> {
        self.err
            .as_ref()
            .map(|(kind, msg)| io::Error::new(*kind, msg.clone()))
    }

    fn check_err(&self) -> Result<()> {
        if self.closed {
            return Err(DcError::Io(io::Error::new(
                io::ErrorKind::Other,
                "writer is closed",
            )));
        }
        match self.err() {
            Some(e) => Err(DcError::Io(e)),
            None => Ok(()),
        }
    }

    fn set_err(&mut self, e: &io::Error) {
        if self.err.is_none() {
            self.err = Some((e.kind(), e.to_string()));
        }
    }

    fn track<T>(&mut self, res: io::Result<T>) -> Result<T> {
        match res {
            Ok(v) => Ok(v),
            Err(e) => {
                self.set_err(&e);
                Err(DcError::Io(e))
            }
        }
    }

    /// Runs `f` with the transport deadline armed.
    fn with_timeout<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if let Some(mut hook) = self.timeout.take() {
            if let Err(e) = hook(true) {
                self.timeout = Some(hook);
                self.set_err(&e);
                return Err(DcError::Io(e));
            }
            let res = f(self);
            let _ = hook(false);
            self.timeout = Some(hook);
            res
        } else {
            f(self)
        }
    }

    /// Compresses `data` through the deflater, writing output to the sink.
    fn deflate_write(&mut self, data: &[u8], flush: FlushCompress) -> io::Result<()> {
        let mut pos = 0;
        loop {
            let (consumed, produced, status) = {
                let deflate = self
                    .deflate
                    .as_mut()
                    .expect("deflate state exists while active");
                let in_before = deflate.total_in();
                let out_before = deflate.total_out();
                let status = deflate
                    .compress(&data[pos..], &mut self.zbuf, flush)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                (
                    (deflate.total_in() - in_before) as usize,
                    (deflate.total_out() - out_before) as usize,
                    status,
                )
            };
            pos += consumed;
            if produced > 0 {
                self.w.write_all(&self.zbuf[..produced])?;
            }
            match status {
                Status::StreamEnd => return Ok(()),
                Status::Ok | Status::BufError => {
                    if pos == data.len() && produced == 0 {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn flush_inner(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            if self.zlib_on {
                let pending = std::mem::take(&mut self.buf);
                let res = self.deflate_write(&pending, FlushCompress::None);
                self.buf = pending;
                self.buf.clear();
                res?;
            } else {
                self.w.write_all(&self.buf)?;
                self.buf.clear();
            }
        }
        if self.zlib_on {
            // zlib sync flush, not end-of-stream
            self.deflate_write(&[], FlushCompress::Sync)?;
        }
        self.w.flush()
    }

    /// Flushes all buffered bytes. When deflation is active this also
    /// performs a zlib sync flush so the peer can decode everything
    /// written so far.
    pub fn flush(&mut self) -> Result<()> {
        self.check_err()?;
        self.with_timeout(|w| {
            let res = w.flush_inner();
            w.track(res)
        })
    }

    /// Writes a single framed message; the caller provides the delimiter
    /// as the final byte.
    pub fn write_line(&mut self, data: &[u8]) -> Result<()> {
        self.check_err()?;
        let mut hooks = std::mem::take(&mut self.on_line);
        let mut keep = true;
        let mut res = Ok(());
        for hook in &mut hooks {
            match hook(data) {
                Ok(true) => continue,
                Ok(false) => {
                    keep = false;
                    break;
                }
                Err(e) => {
                    res = Err(e);
                    break;
                }
            }
        }
        self.on_line = hooks;
        res?;
        if !keep {
            tracing::debug!(len = data.len(), "writer: line skipped by hook");
            return Ok(());
        }
        self.with_timeout(|w| {
            w.buf.extend_from_slice(data);
            if w.buf.len() >= w.buf_size {
                let res = w.flush_inner();
                return w.track(res);
            }
            Ok(())
        })
    }

    /// Bypass-framing write: flushes any buffered lines first, then sends
    /// `data` through the current sink.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_err()?;
        self.with_timeout(|w| {
            let res = (|| {
                if !w.buf.is_empty() {
                    w.flush_inner()?;
                }
                if w.zlib_on {
                    w.deflate_write(data, FlushCompress::None)?;
                } else {
                    w.w.write_all(data)?;
                }
                Ok(data.len())
            })();
            w.track(res)
        })
    }

    /// Switches the sink into zlib-deflate mode with the default level.
    pub fn enable_deflate(&mut self) -> Result<()> {
        self.enable_deflate_level(Compression::default())
    }

    /// Switches the sink into zlib-deflate mode.
    ///
    /// Buffered plaintext is flushed first. The deflater is reused across
    /// toggles and only reallocated when the level changes.
    pub fn enable_deflate_level(&mut self, level: Compression) -> Result<()> {
        self.check_err()?;
        if self.zlib_on {
            return Err(DcError::compression("zlib already active"));
        }
        self.flush()?;
        match &mut self.deflate {
            Some(d) if self.deflate_level == level => d.reset(),
            _ => {
                self.deflate = Some(Box::new(Compress::new(level, true)));
                self.deflate_level = level;
            }
        }
        self.zlib_on = true;
        tracing::debug!(level = level.level(), "writer: deflate enabled");
        Ok(())
    }

    /// Finishes the zlib stream (emitting the trailer) and returns to raw
    /// output.
    pub fn disable_deflate(&mut self) -> Result<()> {
        self.check_err()?;
        if !self.zlib_on {
            return Err(DcError::compression("zlib is not active"));
        }
        self.with_timeout(|w| {
            let res = (|| {
                if !w.buf.is_empty() {
                    let pending = std::mem::take(&mut w.buf);
                    let res = w.deflate_write(&pending, FlushCompress::None);
                    w.buf = pending;
                    w.buf.clear();
                    res?;
                }
                w.deflate_write(&[], FlushCompress::Finish)?;
                w.w.flush()
            })();
            w.track(res)
        })?;
        self.zlib_on = false;
        tracing::debug!("writer: deflate disabled");
        Ok(())
    }

    /// Opens a batch. Batches may be nested; only the outermost
    /// [`Writer::end_batch`] flushes.
    pub fn start_batch(&mut self) -> Result<()> {
        self.check_err()?;
        self.batch += 1;
        Ok(())
    }

    /// Closes a batch, flushing when the outermost batch ends. A forced
    /// end collapses the whole nesting and acts as an ordering barrier.
    pub fn end_batch(&mut self, force: bool) -> Result<()> {
        self.check_err()?;
        if force {
            self.batch = 0;
        } else {
            self.batch = self.batch.saturating_sub(1);
        }
        if self.batch == 0 {
            return self.flush();
        }
        Ok(())
    }

    /// Flushes the writer, finishes an open zlib stream and poisons the
    /// writer. The underlying transport is not closed.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let res = (|| {
            if self.zlib_on {
                self.disable_deflate()
            } else {
                self.flush()
            }
        })();
        self.closed = true;
        res
    }

    /// Consumes the writer, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Reader;

    #[test]
    fn test_write_lines_buffered_until_flush() {
        let mut w = Writer::new(Vec::new());
        w.write_line(b"$A|").unwrap();
        w.write_line(b"$B|").unwrap();
        assert!(w.into_inner().is_empty());

        let mut w = Writer::new(Vec::new());
        w.write_line(b"$A|").unwrap();
        w.flush().unwrap();
        assert_eq!(w.into_inner(), b"$A|");
    }

    #[test]
    fn test_deflate_roundtrip() {
        let mut w = Writer::new(Vec::new());
        w.write_line(b"$ZOn|").unwrap();
        w.enable_deflate().unwrap();
        w.write_line(b"$OtherCommand test|").unwrap();
        w.disable_deflate().unwrap();
        w.write_line(b"$Uncompressed|").unwrap();
        w.flush().unwrap();
        let stream = w.into_inner();

        let mut r = Reader::new(&stream[..], b'|');
        assert_eq!(r.read_line().unwrap().unwrap(), b"$ZOn|");
        r.enable_inflate().unwrap();
        assert_eq!(r.read_line().unwrap().unwrap(), b"$OtherCommand test|");
        assert_eq!(r.read_line().unwrap().unwrap(), b"$Uncompressed|");
        assert!(r.read_line().unwrap().is_none());
    }

    #[test]
    fn test_deflate_sync_flush_keeps_stream_open() {
        let mut w = Writer::new(Vec::new());
        w.enable_deflate().unwrap();
        w.write_line(b"$One|").unwrap();
        w.flush().unwrap();
        w.write_line(b"$Two|").unwrap();
        w.flush().unwrap();
        let stream = w.into_inner();

        let mut r = Reader::new(&stream[..], b'|');
        r.enable_inflate().unwrap();
        assert_eq!(r.read_line().unwrap().unwrap(), b"$One|");
        assert_eq!(r.read_line().unwrap().unwrap(), b"$Two|");
        assert!(r.is_inflating());
    }

    #[test]
    fn test_deflate_toggle_twice() {
        let mut w = Writer::new(Vec::new());
        w.enable_deflate().unwrap();
        w.write_line(b"$First|").unwrap();
        w.disable_deflate().unwrap();
        w.write_line(b"$Plain|").unwrap();
        w.enable_deflate().unwrap();
        w.write_line(b"$Second|").unwrap();
        w.disable_deflate().unwrap();
        w.flush().unwrap();
        let stream = w.into_inner();

        let mut r = Reader::new(&stream[..], b'|');
        r.enable_inflate().unwrap();
        assert_eq!(r.read_line().unwrap().unwrap(), b"$First|");
        assert_eq!(r.read_line().unwrap().unwrap(), b"$Plain|");
        r.enable_inflate().unwrap();
        assert_eq!(r.read_line().unwrap().unwrap(), b"$Second|");
        assert!(r.read_line().unwrap().is_none());
    }

    #[test]
    fn test_enable_deflate_twice_fails() {
        let mut w = Writer::new(Vec::new());
        w.enable_deflate().unwrap();
        assert!(matches!(
            w.enable_deflate(),
            Err(DcError::Compression(_))
        ));
    }

    #[test]
    fn test_disable_without_enable_fails() {
        let mut w = Writer::new(Vec::new());
        assert!(matches!(
            w.disable_deflate(),
            Err(DcError::Compression(_))
        ));
    }

    #[test]
    fn test_line_hook_skip() {
        let mut w = Writer::new(Vec::new());
        w.on_line(Box::new(|line| Ok(!line.starts_with(b"$Skip"))));
        w.write_line(b"$Skip me|").unwrap();
        w.write_line(b"$Keep|").unwrap();
        w.flush().unwrap();
        assert_eq!(w.into_inner(), b"$Keep|");
    }

    #[test]
    fn test_batching_only_outermost_flushes() {
        let mut w = Writer::new(Vec::new());
        w.start_batch().unwrap();
        w.write_line(b"$A|").unwrap();
        w.start_batch().unwrap();
        w.write_line(b"$B|").unwrap();
        w.end_batch(false).unwrap();
        assert!(w.w.is_empty());
        w.end_batch(false).unwrap();
        assert_eq!(w.w, b"$A|$B|");
    }

    #[test]
    fn test_batch_force_end() {
        let mut w = Writer::new(Vec::new());
        w.start_batch().unwrap();
        w.start_batch().unwrap();
        w.write_line(b"$A|").unwrap();
        w.end_batch(true).unwrap();
        assert_eq!(w.w, b"$A|");
    }

    #[test]
    fn test_timeout_hook_called_around_flush() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let mut w = Writer::new(Vec::new());
        w.set_timeout(Box::new(move |enable| {
            calls2.fetch_add(if enable { 1 } else { 10 }, Ordering::SeqCst);
            Ok(())
        }));
        w.write_line(b"$A|").unwrap();
        w.flush().unwrap();
        // two enable/disable pairs: one around write_line, one around flush
        assert_eq!(calls.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn test_sticky_error() {
        struct Failing;
        impl std::io::Write for Failing {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut w = Writer::new(Failing);
        w.write_line(b"$A|").unwrap();
        assert!(w.flush().is_err());
        assert!(w.err().is_some());
        assert!(w.write_line(b"$B|").is_err());
    }

    #[test]
    fn test_close_finishes_zlib_stream() {
        let mut w = Writer::new(Vec::new());
        w.enable_deflate().unwrap();
        w.write_line(b"$One test1|").unwrap();
        w.flush().unwrap();
        w.write_line(b"$Two test2|").unwrap();
        w.close().unwrap();
        assert!(w.write_line(b"$Three|").is_err());
        let stream = w.into_inner();

        let mut r = Reader::new(&stream[..], b'|');
        r.enable_inflate().unwrap();
        assert_eq!(r.read_line().unwrap().unwrap(), b"$One test1|");
        assert_eq!(r.read_line().unwrap().unwrap(), b"$Two test2|");
        assert!(r.read_line().unwrap().is_none());
    }
}
