//! ADC packet reader.

use std::io::Read;

use crate::error::{DcError, Result};
use crate::line;

use super::packets::{decode_packet, decode_packet_raw, Packet};
use super::{Message, LINE_DELIM};

/// Decodes ADC packets from a byte stream.
///
/// The reader is per-connection and single-owner.
pub struct Reader<R> {
    r: line::Reader<R>,
    /// Called when an empty (keep-alive) message is received.
    on_keep_alive: Option<Box<dyn FnMut() -> Result<()> + Send>>,
}

impl<R: Read> Reader<R> {
    pub fn new(src: R) -> Reader<R> {
        Reader {
            r: line::Reader::new(src, LINE_DELIM),
            on_keep_alive: None,
        }
    }

    /// Access to the underlying line reader (compression switching,
    /// binary windows, line hooks).
    pub fn line_reader(&mut self) -> &mut line::Reader<R> {
        &mut self.r
    }

    /// Switches the connection into zlib-inflate mode; used after a
    /// `ZON` announcement.
    pub fn enable_inflate(&mut self) -> Result<()> {
        self.r.enable_inflate()
    }

    pub fn on_keep_alive(&mut self, hook: Box<dyn FnMut() -> Result<()> + Send>) {
        self.on_keep_alive = Some(hook);
    }

    fn read_packet_inner(&mut self, raw: bool) -> Result<Option<Packet>> {
        loop {
            let line = match self.r.read_line()? {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.len() <= 1 {
                // clients may send a bare delimiter to keep the
                // connection alive
                if let Some(hook) = self.on_keep_alive.as_mut() {
                    hook()?;
                }
                continue;
            }
            return if raw {
                decode_packet_raw(line).map(Some)
            } else {
                decode_packet(line).map(Some)
            };
        }
    }

    /// Reads and decodes a single packet, including its message.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        self.read_packet_inner(false)
    }

    /// Reads a single packet, leaving the message payload raw.
    pub fn read_packet_raw(&mut self) -> Result<Option<Packet>> {
        self.read_packet_inner(true)
    }

    /// Reads a hub-originated info message, failing on any other packet
    /// kind.
    pub fn read_info(&mut self) -> Result<Option<Message>> {
        match self.read_packet()? {
            None => Ok(None),
            Some(Packet::Info(p)) => Ok(Some(p.msg)),
            Some(other) => Err(DcError::protocol(format!(
                "expected info command, got kind {:?}",
                other.kind() as char
            ))),
        }
    }

    /// Reads a client-to-client message, failing on any other packet
    /// kind.
    pub fn read_client(&mut self) -> Result<Option<Message>> {
        match self.read_packet()? {
            None => Ok(None),
            Some(Packet::Client(p)) => Ok(Some(p.msg)),
            Some(other) => Err(DcError::protocol(format!(
                "expected client command, got kind {:?}",
                other.kind() as char
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::SidAssign;

    #[test]
    fn test_read_packets_skipping_keepalives() {
        let mut r = Reader::new(&b"\n\nISID AAAB\nBINF AAAB NIuser SS0 SF0 VE SL0 FS0 HN0 HR0 HO0 SU\n"[..]);
        let p = r.read_packet().unwrap().unwrap();
        match p.message() {
            Message::SidAssign(SidAssign { sid }) => assert_eq!(sid.to_string(), "AAAB"),
            other => panic!("unexpected: {:?}", other),
        }
        let p = r.read_packet().unwrap().unwrap();
        assert!(matches!(p.message(), Message::UserInfo(_)));
        assert!(r.read_packet().unwrap().is_none());
    }

    #[test]
    fn test_keep_alive_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut r = Reader::new(&b"\n\n\n"[..]);
        r.on_keep_alive(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        assert!(r.read_packet().unwrap().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_read_info_wrong_kind() {
        let mut r = Reader::new(&b"BINF AAAB\n"[..]);
        assert!(r.read_info().is_err());
    }
}
