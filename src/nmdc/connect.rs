//! Client-to-client connection setup messages.

use crate::error::{DcError, Result};

use super::types::{marshal_name, unmarshal_name};
use super::{MessageBody, TextDecoder, TextEncoder};

/// Connection kind requested by a `ConnectToMe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CtmKind {
    /// The sender listens and the target connects.
    #[default]
    Active,
    /// A passive peer asks the target to send a `ConnectToMe` back.
    PassiveReq,
    /// The answer to a passive request.
    PassiveResp,
}

/// An invitation to open a client-to-client connection:
/// `$ConnectToMe target addr[N|R][S][ src]|`.
///
/// The suffix selects the kind (`N` passive request, `R` passive
/// response, none active) and `S` marks a TLS connection. Passive
/// requests carry the source name after the address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectToMe {
    pub target: String,
    pub src: String,
    pub address: String,
    pub kind: CtmKind,
    pub secure: bool,
}

impl MessageBody for ConnectToMe {
    const TYPE: &'static str = "ConnectToMe";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        if self.target.is_empty() {
            return Err(DcError::protocol("ConnectToMe target should be set"));
        }
        marshal_name(enc, &self.target, buf)?;
        buf.push(b' ');
        buf.extend_from_slice(self.address.as_bytes());
        match self.kind {
            CtmKind::Active => {}
            CtmKind::PassiveReq => buf.push(b'N'),
            CtmKind::PassiveResp => buf.push(b'R'),
        }
        if self.secure {
            buf.push(b'S');
        }
        if self.kind != CtmKind::PassiveReq {
            if !self.src.is_empty() {
                return Err(DcError::protocol(
                    "only passive ConnectToMe requests should have a source",
                ));
            }
            return Ok(());
        }
        if self.src.is_empty() {
            return Err(DcError::protocol(
                "passive ConnectToMe requests should have a source",
            ));
        }
        buf.push(b' ');
        marshal_name(enc, &self.src, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<ConnectToMe> {
        let mut m = ConnectToMe::default();
        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("invalid ConnectToMe command"))?;
        m.target = unmarshal_name(dec, &data[..i])?;
        let mut data = &data[i + 1..];

        if let Some(i) = data.iter().position(|&b| b == b' ') {
            m.src = unmarshal_name(dec, &data[i + 1..])?;
            data = &data[..i];
        }
        let mut addr = data;
        if addr.last() == Some(&b'S') {
            addr = &addr[..addr.len() - 1];
            m.secure = true;
        }
        m.kind = CtmKind::Active;
        match addr.last() {
            Some(&b'N') => {
                m.kind = CtmKind::PassiveReq;
                addr = &addr[..addr.len() - 1];
            }
            Some(&b'R') => {
                m.kind = CtmKind::PassiveResp;
                addr = &addr[..addr.len() - 1];
            }
            _ => {}
        }
        m.address = String::from_utf8_lossy(addr).into_owned();
        Ok(m)
    }
}

/// A request for the peer to send a `ConnectToMe` back:
/// `$RevConnectToMe from to|`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevConnectToMe {
    pub from: String,
    pub to: String,
}

impl MessageBody for RevConnectToMe {
    const TYPE: &'static str = "RevConnectToMe";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_name(enc, &self.from, buf)?;
        buf.push(b' ');
        marshal_name(enc, &self.to, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<RevConnectToMe> {
        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("invalid RevConnectToMe command"))?;
        Ok(RevConnectToMe {
            from: unmarshal_name(dec, &data[..i])?,
            to: unmarshal_name(dec, &data[i + 1..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) -> ConnectToMe {
        let m = ConnectToMe::unmarshal(None, data).unwrap();
        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(buf, data);
        m
    }

    #[test]
    fn test_active() {
        let m = roundtrip(b"john 192.168.1.2:412");
        assert_eq!(m.kind, CtmKind::Active);
        assert!(!m.secure);
        assert_eq!(m.address, "192.168.1.2:412");
    }

    #[test]
    fn test_active_secure() {
        let m = roundtrip(b"john 192.168.1.2:412S");
        assert_eq!(m.kind, CtmKind::Active);
        assert!(m.secure);
        assert_eq!(m.address, "192.168.1.2:412");
    }

    #[test]
    fn test_passive_request() {
        let m = roundtrip(b"john 192.168.1.2:412N peter");
        assert_eq!(m.kind, CtmKind::PassiveReq);
        assert_eq!(m.src, "peter");
        assert!(!m.secure);
    }

    #[test]
    fn test_passive_request_secure() {
        let m = roundtrip(b"john 192.168.1.2:412NS peter");
        assert_eq!(m.kind, CtmKind::PassiveReq);
        assert!(m.secure);
    }

    #[test]
    fn test_passive_response() {
        let m = roundtrip(b"john 192.168.1.2:412R");
        assert_eq!(m.kind, CtmKind::PassiveResp);
        assert!(m.src.is_empty());
    }

    #[test]
    fn test_passive_response_secure() {
        let m = roundtrip(b"john 192.168.1.2:412RS");
        assert_eq!(m.kind, CtmKind::PassiveResp);
        assert!(m.secure);
    }

    #[test]
    fn test_source_requires_passive_request() {
        let m = ConnectToMe {
            target: "john".into(),
            src: "peter".into(),
            address: "1.2.3.4:412".into(),
            kind: CtmKind::Active,
            secure: false,
        };
        assert!(m.marshal(None, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_rev_connect() {
        let m = RevConnectToMe::unmarshal(None, b"alice bob").unwrap();
        assert_eq!(m.from, "alice");
        assert_eq!(m.to, "bob");
    }
}
