//! ADC packet writer.

use std::io::Write;

use crate::error::Result;
use crate::line;

use super::packets::{
    marshal_broadcast, marshal_feature, marshal_routed, marshal_udp, marshal_unrouted,
    FeatureSel, Packet, KIND_CLIENT, KIND_DIRECT, KIND_ECHO, KIND_HUB, KIND_INFO,
};
use super::types::{Cid, Sid};
use super::{Message, LINE_DELIM};

/// Encodes and writes ADC packets.
///
/// Per-kind helpers avoid building a [`Packet`] value for the common
/// hub loops, and a scratch buffer is reused so the hot path is
/// allocation-light. Not safe for concurrent use.
pub struct Writer<W: Write> {
    w: line::Writer<W>,
    mbuf: Vec<u8>,
}

impl<W: Write> Writer<W> {
    pub fn new(w: W) -> Writer<W> {
        Writer::with_buffer(w, 0)
    }

    pub fn with_buffer(w: W, buf_size: usize) -> Writer<W> {
        Writer {
            w: line::Writer::with_buffer(w, buf_size),
            mbuf: Vec::new(),
        }
    }

    /// Access to the underlying line writer (batching, deflate, hooks,
    /// timeout callback).
    pub fn line_writer(&mut self) -> &mut line::Writer<W> {
        &mut self.w
    }

    /// Flushes all buffered packets. Should be called after each batch.
    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()
    }

    /// Writes an empty (keep-alive) message. It is the caller's
    /// responsibility to flush the writer.
    pub fn write_keep_alive(&mut self) -> Result<()> {
        self.w.write_line(&[LINE_DELIM])
    }

    fn write_buf(&mut self) -> Result<()> {
        let buf = std::mem::take(&mut self.mbuf);
        let res = self.w.write_line(&buf);
        self.mbuf = buf;
        res
    }

    /// Writes a single packet of any kind.
    pub fn write_packet(&mut self, p: &Packet) -> Result<()> {
        self.mbuf.clear();
        p.marshal_packet(&mut self.mbuf)?;
        self.write_buf()
    }

    /// Writes a hub-originated info message (`I`).
    pub fn write_info(&mut self, msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_unrouted(&mut self.mbuf, KIND_INFO, msg)?;
        self.write_buf()
    }

    /// Writes a client-to-hub message (`H`).
    pub fn write_hub(&mut self, msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_unrouted(&mut self.mbuf, KIND_HUB, msg)?;
        self.write_buf()
    }

    /// Writes a client-to-client message (`C`).
    pub fn write_client(&mut self, msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_unrouted(&mut self.mbuf, KIND_CLIENT, msg)?;
        self.write_buf()
    }

    /// Writes a broadcast (`B`) from the given SID.
    pub fn write_broadcast(&mut self, from: Sid, msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_broadcast(&mut self.mbuf, from, msg)?;
        self.write_buf()
    }

    /// Writes a direct message (`D`).
    pub fn write_direct(&mut self, from: Sid, to: Sid, msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_routed(&mut self.mbuf, KIND_DIRECT, from, to, msg)?;
        self.write_buf()
    }

    /// Writes an echo message (`E`).
    pub fn write_echo(&mut self, from: Sid, to: Sid, msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_routed(&mut self.mbuf, KIND_ECHO, from, to, msg)?;
        self.write_buf()
    }

    /// Writes a feature-filtered broadcast (`F`).
    pub fn write_feature(&mut self, from: Sid, sel: &[FeatureSel], msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_feature(&mut self.mbuf, from, sel, msg)?;
        self.write_buf()
    }

    /// Writes a UDP-addressed message (`U`).
    pub fn write_udp(&mut self, id: Cid, msg: &Message) -> Result<()> {
        self.mbuf.clear();
        marshal_udp(&mut self.mbuf, id, msg)?;
        self.write_buf()
    }

    /// Opens a stream bound to a routing target, so broadcast loops do
    /// not re-specify the routing constants for every message.
    pub fn stream(&mut self, kind: StreamKind) -> WriteStream<'_, W> {
        WriteStream { w: self, kind }
    }

    /// Consumes the writer, returning the underlying sink.
    pub fn into_inner(self) -> W {
        self.w.into_inner()
    }
}

/// The routing target of a [`WriteStream`].
#[derive(Debug, Clone)]
pub enum StreamKind {
    Info,
    Hub,
    Client,
    Broadcast(Sid),
    Direct(Sid, Sid),
    Echo(Sid, Sid),
    Feature(Sid, Vec<FeatureSel>),
}

/// A stream of packets to a fixed destination.
pub struct WriteStream<'a, W: Write> {
    w: &'a mut Writer<W>,
    kind: StreamKind,
}

impl<W: Write> WriteStream<'_, W> {
    /// Writes a single message with the stream's routing.
    pub fn write_message(&mut self, msg: &Message) -> Result<()> {
        match &self.kind {
            StreamKind::Info => self.w.write_info(msg),
            StreamKind::Hub => self.w.write_hub(msg),
            StreamKind::Client => self.w.write_client(msg),
            StreamKind::Broadcast(from) => self.w.write_broadcast(*from, msg),
            StreamKind::Direct(from, to) => self.w.write_direct(*from, *to, msg),
            StreamKind::Echo(from, to) => self.w.write_echo(*from, *to, msg),
            StreamKind::Feature(from, sel) => {
                let (from, sel) = (*from, sel.clone());
                self.w.write_feature(from, &sel, msg)
            }
        }
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::{ChatMessage, Reader, SidAssign};

    #[test]
    fn test_write_kinds() {
        let from: Sid = "AAAB".parse().unwrap();
        let to: Sid = "AAAC".parse().unwrap();
        let msg = Message::from(ChatMessage {
            text: "hi there".into(),
            ..ChatMessage::default()
        });

        let mut w = Writer::new(Vec::new());
        w.write_info(&Message::from(SidAssign { sid: from })).unwrap();
        w.write_broadcast(from, &msg).unwrap();
        w.write_direct(from, to, &msg).unwrap();
        w.flush().unwrap();

        assert_eq!(
            w.into_inner(),
            b"ISID AAAB\nBMSG AAAB hi\\sthere\nDMSG AAAB AAAC hi\\sthere\n"
        );
    }

    #[test]
    fn test_stream_reuses_routing() {
        let from: Sid = "AAAB".parse().unwrap();
        let msg = Message::from(ChatMessage {
            text: "x".into(),
            ..ChatMessage::default()
        });

        let mut w = Writer::new(Vec::new());
        let mut s = w.stream(StreamKind::Broadcast(from));
        s.write_message(&msg).unwrap();
        s.write_message(&msg).unwrap();
        s.flush().unwrap();
        assert_eq!(w.into_inner(), b"BMSG AAAB x\nBMSG AAAB x\n");
    }

    #[test]
    fn test_roundtrip_through_reader() {
        let from: Sid = "AAAB".parse().unwrap();
        let mut w = Writer::new(Vec::new());
        w.write_broadcast(
            from,
            &Message::from(ChatMessage {
                text: "hello world".into(),
                ..ChatMessage::default()
            }),
        )
        .unwrap();
        w.flush().unwrap();
        let stream = w.into_inner();

        let mut r = Reader::new(&stream[..]);
        let p = r.read_packet().unwrap().unwrap();
        assert_eq!(p.source(), Some(from));
        match p.message() {
            Message::ChatMessage(m) => assert_eq!(m.text, "hello world"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
