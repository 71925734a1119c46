//! NMDC message writer.

use std::io::Write;
use std::sync::Arc;

use flate2::Compression;

use crate::error::Result;
use crate::line;

use super::{marshal_to, Message, TextEncoder};

/// Encodes and writes NMDC messages.
///
/// Wraps a [`line::Writer`] and reuses a scratch buffer per message, so
/// the hot path does not allocate. Not safe for concurrent use.
pub struct Writer<W: Write> {
    w: line::Writer<W>,
    enc: Option<Arc<dyn TextEncoder>>,
    on_message: Vec<Box<dyn FnMut(&Message) -> Result<bool> + Send>>,
    mbuf: Vec<u8>,
}

impl<W: Write> Writer<W> {
    pub fn new(w: W) -> Writer<W> {
        Writer::with_buffer(w, 0)
    }

    pub fn with_buffer(w: W, buf_size: usize) -> Writer<W> {
        Writer {
            w: line::Writer::with_buffer(w, buf_size),
            enc: None,
            on_message: Vec::new(),
            mbuf: Vec::new(),
        }
    }

    /// Access to the underlying line writer (batching, deflate, hooks,
    /// timeout callback).
    pub fn line_writer(&mut self) -> &mut line::Writer<W> {
        &mut self.w
    }

    /// Returns the current text encoder.
    pub fn encoder(&self) -> Option<&Arc<dyn TextEncoder>> {
        self.enc.as_ref()
    }

    /// Sets the text encoding used to write messages. `None` writes
    /// UTF-8.
    pub fn set_encoder(&mut self, enc: Option<Arc<dyn TextEncoder>>) {
        self.enc = enc;
    }

    /// Registers a hook called for each message before encoding.
    /// Returning `Ok(false)` skips the message.
    pub fn on_message(&mut self, hook: Box<dyn FnMut(&Message) -> Result<bool> + Send>) {
        self.on_message.push(hook);
    }

    /// Encodes and writes a single protocol message.
    pub fn write_msg(&mut self, msg: &Message) -> Result<()> {
        if let Some(e) = self.w.err() {
            return Err(e.into());
        }
        for hook in &mut self.on_message {
            if !hook(msg)? {
                return Ok(());
            }
        }
        self.mbuf.clear();
        marshal_to(self.enc.as_deref(), &mut self.mbuf, msg)?;
        self.w.write_line(&self.mbuf)
    }

    /// Writes a pre-framed raw line.
    pub fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.w.write_line(line)
    }

    /// Flushes all buffered messages.
    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()
    }

    /// Announces `$ZOn|` and enables compression at the default level.
    pub fn zon(&mut self) -> Result<()> {
        self.zon_level(Compression::default())
    }

    /// Announces `$ZOn|` and enables compression at the given level.
    pub fn zon_level(&mut self, level: Compression) -> Result<()> {
        self.w.write_line(b"$ZOn|")?;
        self.w.enable_deflate_level(level)
    }

    /// Consumes the writer, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.w.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmdc::{ChatMessage, GetNickList, Hello, Reader};

    #[test]
    fn test_write_msg() {
        let mut w = Writer::new(Vec::new());
        w.write_msg(&Message::from(Hello {
            name: "john".into(),
        }))
        .unwrap();
        w.write_msg(&Message::from(GetNickList)).unwrap();
        w.flush().unwrap();
        assert_eq!(w.into_inner(), b"$Hello john|$GetNickList|");
    }

    #[test]
    fn test_message_hook_skip() {
        let mut w = Writer::new(Vec::new());
        w.on_message(Box::new(|m| Ok(!matches!(m, Message::GetNickList(_)))));
        w.write_msg(&Message::from(GetNickList)).unwrap();
        w.write_msg(&Message::Chat(ChatMessage {
            name: "bob".into(),
            text: "hi".into(),
        }))
        .unwrap();
        w.flush().unwrap();
        assert_eq!(w.into_inner(), b"<bob> hi|");
    }

    #[test]
    fn test_zon_switches_compression() {
        let mut w = Writer::new(Vec::new());
        w.zon().unwrap();
        w.write_msg(&Message::from(Hello {
            name: "john".into(),
        }))
        .unwrap();
        w.line_writer().disable_deflate().unwrap();
        let stream = w.into_inner();

        let mut r = Reader::new(&stream[..]);
        match r.read_msg().unwrap().unwrap() {
            Message::ZOn(_) => {}
            other => panic!("unexpected: {:?}", other),
        }
        r.enable_inflate().unwrap();
        match r.read_msg().unwrap().unwrap() {
            Message::Hello(h) => assert_eq!(h.name, "john"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
