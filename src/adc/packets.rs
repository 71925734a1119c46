//! The ADC packet envelope: routing kind, session routing fields and the
//! carried message.

use bytes::Bytes;

use crate::error::{DcError, Result};

use super::messages::{unmarshal_message, Message, RawMessage};
use super::types::{Cid, Feature, MsgType, Sid};
use super::user::HubInfo;
use super::{MessageBody, LINE_DELIM};

pub(crate) const KIND_BROADCAST: u8 = b'B';
pub(crate) const KIND_CLIENT: u8 = b'C';
pub(crate) const KIND_DIRECT: u8 = b'D';
pub(crate) const KIND_ECHO: u8 = b'E';
pub(crate) const KIND_FEATURE: u8 = b'F';
pub(crate) const KIND_HUB: u8 = b'H';
pub(crate) const KIND_INFO: u8 = b'I';
pub(crate) const KIND_UDP: u8 = b'U';

/// A feature selector of an F-packet: deliver only to peers that do
/// (`+`) or do not (`-`) support the feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSel {
    pub fea: Feature,
    pub sel: bool,
}

/// Hub-originated message without routing (`I`).
#[derive(Debug, Clone, PartialEq)]
pub struct InfoPacket {
    pub msg: Message,
}

/// Client-to-hub message without routing (`H`).
#[derive(Debug, Clone, PartialEq)]
pub struct HubPacket {
    pub msg: Message,
}

/// Client-to-client message without routing (`C`).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPacket {
    pub msg: Message,
}

/// A message broadcast to every user (`B`), carrying the source SID.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastPacket {
    pub id: Sid,
    pub msg: Message,
}

/// A message routed to a single user (`D`).
#[derive(Debug, Clone, PartialEq)]
pub struct DirectPacket {
    pub id: Sid,
    pub to: Sid,
    pub msg: Message,
}

/// Like direct, but echoed back to the sender (`E`).
#[derive(Debug, Clone, PartialEq)]
pub struct EchoPacket {
    pub id: Sid,
    pub to: Sid,
    pub msg: Message,
}

/// A broadcast filtered by feature support (`F`).
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePacket {
    pub id: Sid,
    pub sel: Vec<FeatureSel>,
    pub msg: Message,
}

/// A message sent over UDP, addressed by client ID (`U`).
#[derive(Debug, Clone, PartialEq)]
pub struct UdpPacket {
    pub id: Cid,
    pub msg: Message,
}

/// An ADC packet: one of the eight routing kinds and its message.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Info(InfoPacket),
    Hub(HubPacket),
    Client(ClientPacket),
    Broadcast(BroadcastPacket),
    Direct(DirectPacket),
    Echo(EchoPacket),
    Feature(FeaturePacket),
    Udp(UdpPacket),
}

impl Packet {
    /// The routing kind byte.
    pub fn kind(&self) -> u8 {
        match self {
            Packet::Info(_) => KIND_INFO,
            Packet::Hub(_) => KIND_HUB,
            Packet::Client(_) => KIND_CLIENT,
            Packet::Broadcast(_) => KIND_BROADCAST,
            Packet::Direct(_) => KIND_DIRECT,
            Packet::Echo(_) => KIND_ECHO,
            Packet::Feature(_) => KIND_FEATURE,
            Packet::Udp(_) => KIND_UDP,
        }
    }

    /// The carried message.
    pub fn message(&self) -> &Message {
        match self {
            Packet::Info(p) => &p.msg,
            Packet::Hub(p) => &p.msg,
            Packet::Client(p) => &p.msg,
            Packet::Broadcast(p) => &p.msg,
            Packet::Direct(p) => &p.msg,
            Packet::Echo(p) => &p.msg,
            Packet::Feature(p) => &p.msg,
            Packet::Udp(p) => &p.msg,
        }
    }

    pub fn message_mut(&mut self) -> &mut Message {
        match self {
            Packet::Info(p) => &mut p.msg,
            Packet::Hub(p) => &mut p.msg,
            Packet::Client(p) => &mut p.msg,
            Packet::Broadcast(p) => &mut p.msg,
            Packet::Direct(p) => &mut p.msg,
            Packet::Echo(p) => &mut p.msg,
            Packet::Feature(p) => &mut p.msg,
            Packet::Udp(p) => &mut p.msg,
        }
    }

    pub fn set_message(&mut self, msg: Message) {
        *self.message_mut() = msg;
    }

    /// The source SID, for the kinds that carry one.
    pub fn source(&self) -> Option<Sid> {
        match self {
            Packet::Broadcast(p) => Some(p.id),
            Packet::Direct(p) => Some(p.id),
            Packet::Echo(p) => Some(p.id),
            Packet::Feature(p) => Some(p.id),
            _ => None,
        }
    }

    /// The target SID, for the direct kinds.
    pub fn target(&self) -> Option<Sid> {
        match self {
            Packet::Direct(p) => Some(p.to),
            Packet::Echo(p) => Some(p.to),
            _ => None,
        }
    }

    /// Decodes a raw message in place through the registry. An `INF` in
    /// an info packet decodes as [`HubInfo`] rather than user info.
    pub fn decode_message(&mut self) -> Result<()> {
        let is_info = matches!(self, Packet::Info(_));
        let msg = self.message_mut();
        if let Message::Raw(raw) = msg {
            let decoded = if is_info && raw.typ == <HubInfo as MessageBody>::CMD {
                Message::HubInfo(HubInfo::unmarshal_adc(&raw.data)?)
            } else {
                raw.decode()?
            };
            *msg = decoded;
        }
        Ok(())
    }

    /// Encodes the whole packet, delimiter included.
    pub fn marshal_packet(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Packet::Info(p) => marshal_unrouted(buf, KIND_INFO, &p.msg),
            Packet::Hub(p) => marshal_unrouted(buf, KIND_HUB, &p.msg),
            Packet::Client(p) => marshal_unrouted(buf, KIND_CLIENT, &p.msg),
            Packet::Broadcast(p) => marshal_broadcast(buf, p.id, &p.msg),
            Packet::Direct(p) => marshal_routed(buf, KIND_DIRECT, p.id, p.to, &p.msg),
            Packet::Echo(p) => marshal_routed(buf, KIND_ECHO, p.id, p.to, &p.msg),
            Packet::Feature(p) => marshal_feature(buf, p.id, &p.sel, &p.msg),
            Packet::Udp(p) => marshal_udp(buf, p.id, &p.msg),
        }
    }
}

fn write_header(buf: &mut Vec<u8>, kind: u8, cmd: MsgType) {
    buf.push(kind);
    buf.extend_from_slice(&cmd.0);
    buf.push(b' ');
}

/// Finishes a packet: an empty payload collapses the separator space so
/// the wire form is `KCMD <routing>\n`, never `KCMD <routing> \n`.
fn finish(buf: &mut Vec<u8>, payload_start: usize) {
    if buf.len() == payload_start {
        buf[payload_start - 1] = LINE_DELIM;
    } else {
        buf.push(LINE_DELIM);
    }
}

pub(crate) fn marshal_unrouted(buf: &mut Vec<u8>, kind: u8, msg: &Message) -> Result<()> {
    write_header(buf, kind, msg.cmd());
    let n = buf.len();
    msg.marshal_body(buf)?;
    finish(buf, n);
    Ok(())
}

pub(crate) fn marshal_broadcast(buf: &mut Vec<u8>, id: Sid, msg: &Message) -> Result<()> {
    write_header(buf, KIND_BROADCAST, msg.cmd());
    buf.extend_from_slice(&id.0);
    buf.push(b' ');
    let n = buf.len();
    msg.marshal_body(buf)?;
    finish(buf, n);
    Ok(())
}

pub(crate) fn marshal_routed(
    buf: &mut Vec<u8>,
    kind: u8,
    id: Sid,
    to: Sid,
    msg: &Message,
) -> Result<()> {
    write_header(buf, kind, msg.cmd());
    buf.extend_from_slice(&id.0);
    buf.push(b' ');
    buf.extend_from_slice(&to.0);
    buf.push(b' ');
    let n = buf.len();
    msg.marshal_body(buf)?;
    finish(buf, n);
    Ok(())
}

pub(crate) fn marshal_feature(
    buf: &mut Vec<u8>,
    id: Sid,
    sel: &[FeatureSel],
    msg: &Message,
) -> Result<()> {
    write_header(buf, KIND_FEATURE, msg.cmd());
    buf.extend_from_slice(&id.0);
    buf.push(b' ');
    for s in sel {
        buf.push(if s.sel { b'+' } else { b'-' });
        buf.extend_from_slice(&s.fea.0);
        buf.push(b' ');
    }
    let n = buf.len();
    msg.marshal_body(buf)?;
    finish(buf, n);
    Ok(())
}

pub(crate) fn marshal_udp(buf: &mut Vec<u8>, id: Cid, msg: &Message) -> Result<()> {
    write_header(buf, KIND_UDP, msg.cmd());
    let start = buf.len();
    buf.resize(start + Cid::BASE32_LEN, 0);
    data_encoding::BASE32_NOPAD.encode_mut(&id.0, &mut buf[start..]);
    buf.push(b' ');
    let n = buf.len();
    msg.marshal_body(buf)?;
    finish(buf, n);
    Ok(())
}

/// Decodes an ADC line into a packet, also decoding the message through
/// the registry.
pub fn decode_packet(line: &[u8]) -> Result<Packet> {
    let mut p = decode_packet_raw(line)?;
    p.decode_message()?;
    Ok(p)
}

/// Decodes an ADC line into a packet carrying a raw message.
pub fn decode_packet_raw(line: &[u8]) -> Result<Packet> {
    if line.len() < 5 {
        return Err(DcError::protocol(format!(
            "too short for command: {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    if line.contains(&0) {
        return Err(DcError::protocol(
            "messages should not contain null characters",
        ));
    }
    let kind = line[0];
    let cmd = MsgType([line[1], line[2], line[3]]);
    let rest = &line[4..];
    if rest.last() != Some(&LINE_DELIM) {
        return Err(DcError::protocol("expected line delimiter"));
    }
    // the space before the routing fields/payload collapses into the
    // delimiter when there is nothing to carry
    let rest = match rest[0] {
        b' ' => &rest[1..],
        LINE_DELIM => rest,
        _ => return Err(DcError::protocol("expected name delimiter")),
    };
    let body = &rest[..rest.len() - 1];
    match kind {
        KIND_INFO => Ok(Packet::Info(InfoPacket {
            msg: raw_msg(cmd, body),
        })),
        KIND_HUB => Ok(Packet::Hub(HubPacket {
            msg: raw_msg(cmd, body),
        })),
        KIND_CLIENT => Ok(Packet::Client(ClientPacket {
            msg: raw_msg(cmd, body),
        })),
        KIND_BROADCAST => {
            let (id, payload) = split_sid(body, "broadcast")?;
            Ok(Packet::Broadcast(BroadcastPacket {
                id,
                msg: raw_msg(cmd, payload),
            }))
        }
        KIND_DIRECT => {
            let (id, to, payload) = split_sid_pair(body, "direct")?;
            Ok(Packet::Direct(DirectPacket {
                id,
                to,
                msg: raw_msg(cmd, payload),
            }))
        }
        KIND_ECHO => {
            let (id, to, payload) = split_sid_pair(body, "echo")?;
            Ok(Packet::Echo(EchoPacket {
                id,
                to,
                msg: raw_msg(cmd, payload),
            }))
        }
        KIND_FEATURE => {
            let (id, payload) = split_sid(body, "feature")?;
            let (sel, payload) = split_feature_sel(payload)?;
            Ok(Packet::Feature(FeaturePacket {
                id,
                sel,
                msg: raw_msg(cmd, payload),
            }))
        }
        KIND_UDP => {
            let (id, payload) = split_cid(body)?;
            Ok(Packet::Udp(UdpPacket {
                id,
                msg: raw_msg(cmd, payload),
            }))
        }
        _ => Err(DcError::protocol(format!(
            "unknown command kind: {:?}",
            kind as char
        ))),
    }
}

fn raw_msg(cmd: MsgType, data: &[u8]) -> Message {
    Message::Raw(RawMessage::new(cmd, Bytes::copy_from_slice(data)))
}

fn split_sid<'a>(body: &'a [u8], kind: &str) -> Result<(Sid, &'a [u8])> {
    if body.len() < 4 {
        return Err(DcError::protocol(format!("short {} command", kind)));
    }
    if body.len() > 4 && body[4] != b' ' {
        return Err(DcError::protocol(format!(
            "separator expected: {:?}",
            String::from_utf8_lossy(&body[..5])
        )));
    }
    let id = Sid([body[0], body[1], body[2], body[3]]);
    let payload = if body.len() > 5 { &body[5..] } else { &[] };
    Ok((id, payload))
}

fn split_sid_pair<'a>(body: &'a [u8], kind: &str) -> Result<(Sid, Sid, &'a [u8])> {
    if body.len() < 9 {
        return Err(DcError::protocol(format!("short {} command", kind)));
    }
    if body[4] != b' ' {
        return Err(DcError::protocol(format!(
            "separator expected: {:?}",
            String::from_utf8_lossy(&body[..9])
        )));
    }
    if body.len() > 9 && body[9] != b' ' {
        return Err(DcError::protocol(format!(
            "separator expected: {:?}",
            String::from_utf8_lossy(&body[..10])
        )));
    }
    let id = Sid([body[0], body[1], body[2], body[3]]);
    let to = Sid([body[5], body[6], body[7], body[8]]);
    let payload = if body.len() > 10 { &body[10..] } else { &[] };
    Ok((id, to, payload))
}

fn split_cid(body: &[u8]) -> Result<(Cid, &[u8])> {
    const L: usize = Cid::BASE32_LEN;
    if body.len() < L {
        return Err(DcError::protocol("short udp command"));
    }
    if body.len() > L && body[L] != b' ' {
        return Err(DcError::protocol(format!(
            "separator expected: {:?}",
            String::from_utf8_lossy(&body[..L + 1])
        )));
    }
    let id = Cid::from_base32(&body[..L])
        .map_err(|e| DcError::protocol(format!("wrong CID in udp command: {}", e)))?;
    let payload = if body.len() > L + 1 { &body[L + 1..] } else { &[] };
    Ok((id, payload))
}

/// Parses the zero-or-more `+FEAT`/`-FEAT` selectors of an F-packet.
/// The first token not starting with `+`/`-` begins the payload.
fn split_feature_sel(body: &[u8]) -> Result<(Vec<FeatureSel>, &[u8])> {
    let mut sel = Vec::new();
    let mut rest = body;
    loop {
        let on = match rest.first() {
            Some(b'+') => true,
            Some(b'-') => false,
            _ => break,
        };
        if rest.len() < 5 {
            return Err(DcError::protocol(format!(
                "short feature: {:?}",
                String::from_utf8_lossy(rest)
            )));
        }
        let mut fea = Feature::default();
        fea.0.copy_from_slice(&rest[1..5]);
        sel.push(FeatureSel { fea, sel: on });
        rest = match rest.get(5) {
            Some(b' ') => &rest[6..],
            None => &[],
            Some(_) => {
                return Err(DcError::protocol(format!(
                    "separator expected: {:?}",
                    String::from_utf8_lossy(&rest[..6])
                )))
            }
        };
    }
    Ok((sel, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(line: &[u8]) -> Packet {
        let p = decode_packet_raw(line).unwrap();
        let mut buf = Vec::new();
        p.marshal_packet(&mut buf).unwrap();
        assert_eq!(buf, line, "got {:?}", String::from_utf8_lossy(&buf));
        p
    }

    #[test]
    fn test_broadcast_empty_payload() {
        let p = roundtrip(b"BINF AAAB\n");
        match &p {
            Packet::Broadcast(b) => {
                assert_eq!(b.id.to_string(), "AAAB");
                match &b.msg {
                    Message::Raw(raw) => {
                        assert_eq!(raw.typ, MsgType(*b"INF"));
                        assert!(raw.data.is_empty());
                    }
                    other => panic!("unexpected: {:?}", other),
                }
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_with_payload() {
        let p = roundtrip(
            b"BINF AAAB IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser\n",
        );
        assert_eq!(p.source().unwrap().to_string(), "AAAB");
        assert!(p.target().is_none());
    }

    #[test]
    fn test_unrouted_kinds() {
        roundtrip(b"IINF IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser\n");
        roundtrip(b"IINF\n");
        roundtrip(b"HINF IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser\n");
        roundtrip(b"CINF IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser\n");
    }

    #[test]
    fn test_direct_and_echo() {
        let p = roundtrip(b"DCTM AAAA BBBB\n");
        assert_eq!(p.source().unwrap().to_string(), "AAAA");
        assert_eq!(p.target().unwrap().to_string(), "BBBB");
        roundtrip(b"DCTM AAAA BBBB proto port token\n");
        roundtrip(b"EMSG AAAA BBBB some\\stext\n");
    }

    #[test]
    fn test_udp_packet() {
        let p = roundtrip(b"UINF KAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI\n");
        match &p {
            Packet::Udp(u) => {
                assert_eq!(u.id.to_base32(), "KAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI")
            }
            other => panic!("unexpected: {:?}", other),
        }
        roundtrip(b"UINF KAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser\n");
    }

    #[test]
    fn test_feature_selectors() {
        let p = roundtrip(b"FINF AAAB +SEGA -NAT0 IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser\n");
        match &p {
            Packet::Feature(f) => {
                assert_eq!(
                    f.sel,
                    vec![
                        FeatureSel {
                            fea: Feature(*b"SEGA"),
                            sel: true
                        },
                        FeatureSel {
                            fea: Feature(*b"NAT0"),
                            sel: false
                        },
                    ]
                );
                match &f.msg {
                    Message::Raw(raw) => assert!(raw.data.starts_with(b"ID")),
                    other => panic!("unexpected: {:?}", other),
                }
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_feature_selectors_without_payload() {
        let p = roundtrip(b"FINF AAAB +SEGA -NAT0\n");
        match &p {
            Packet::Feature(f) => {
                assert_eq!(f.sel.len(), 2);
                match &f.msg {
                    Message::Raw(raw) => assert!(raw.data.is_empty()),
                    other => panic!("unexpected: {:?}", other),
                }
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_message_info_is_hub_info() {
        let mut p = decode_packet_raw(b"IINF NIhub VEsoft\\s1.0\n").unwrap();
        p.decode_message().unwrap();
        match p.message() {
            Message::HubInfo(h) => assert_eq!(h.name, "hub"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_message_broadcast_is_user_info() {
        let p = decode_packet(
            b"BINF AAAB IDKAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI NIuser\n",
        )
        .unwrap();
        match p.message() {
            Message::UserInfo(u) => {
                assert_eq!(u.name, "user");
                assert_eq!(u.id.to_base32(), "KAY6BI76T6XFIQXZNRYE4WXJ2Y3YGXJG7UM7XLI");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode_packet_raw(b"BINF\n").is_err()); // no SID
        assert!(decode_packet_raw(b"X\n").is_err()); // too short
        assert!(decode_packet_raw(b"QINF AAAB\n").is_err()); // unknown kind
        assert!(decode_packet_raw(b"BINF AAAB").is_err()); // no delimiter
        assert!(decode_packet_raw(b"BINFAAAB\n").is_err()); // no separator
    }
}
