//! Hub-pinger messages (`BotINFO`/`HubINFO` extensions).

use crate::error::{DcError, Result};
use crate::software::Software;

use super::types::{atoi_trim, marshal_string, splitn, unmarshal_string};
use super::{MessageBody, TextDecoder, TextEncoder};

/// Sent by a pinger to request a `$HubINFO`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BotInfo {
    pub text: String,
}

impl MessageBody for BotInfo {
    const TYPE: &'static str = "BotINFO";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_string(enc, &self.text, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<BotInfo> {
        Ok(BotInfo {
            text: unmarshal_string(dec, data)?,
        })
    }
}

/// Detailed hub information, `$`-separated positional fields.
///
/// The decoder accepts and discards the rarely-seen 11th and 12th fields
/// (admin mail and friends); the emitter always writes the canonical
/// 11-field form ending with the encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HubInfo {
    pub name: String,
    pub host: String,
    pub desc: String,
    /// Maximum user count.
    pub i1: i32,
    /// Minimum share.
    pub i2: i64,
    /// Minimum slots.
    pub i3: i32,
    /// Maximum hubs open.
    pub i4: i32,
    pub soft: Software,
    pub owner: String,
    pub state: String,
    pub encoding: String,
}

impl MessageBody for HubInfo {
    const TYPE: &'static str = "HubINFO";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_string(enc, &self.name, buf)?;
        buf.push(b'$');
        buf.extend_from_slice(self.host.as_bytes());
        buf.push(b'$');
        marshal_string(enc, &self.desc, buf)?;
        buf.push(b'$');
        buf.extend_from_slice(self.i1.to_string().as_bytes());
        buf.push(b'$');
        buf.extend_from_slice(self.i2.to_string().as_bytes());
        buf.push(b'$');
        buf.extend_from_slice(self.i3.to_string().as_bytes());
        buf.push(b'$');
        buf.extend_from_slice(self.i4.to_string().as_bytes());
        buf.push(b'$');
        buf.extend_from_slice(self.soft.to_string().as_bytes());
        buf.push(b'$');
        marshal_string(enc, &self.owner, buf)?;
        buf.push(b'$');
        marshal_string(enc, &self.state, buf)?;
        buf.push(b'$');
        buf.extend_from_slice(self.encoding.as_bytes());
        Ok(())
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<HubInfo> {
        let mut m = HubInfo::default();
        let fields = splitn(data, b'$', 13);
        let count = fields.len();
        for (i, field) in fields.into_iter().enumerate() {
            match i {
                0 => m.name = unmarshal_string(dec, field)?,
                1 => m.host = String::from_utf8_lossy(field).into_owned(),
                2 => m.desc = unmarshal_string(dec, field)?,
                3 => {
                    m.i1 = atoi_trim(field).ok_or_else(|| DcError::field("i1", "invalid"))? as i32
                }
                4 => m.i2 = atoi_trim(field).ok_or_else(|| DcError::field("i2", "invalid"))?,
                5 => {
                    m.i3 = atoi_trim(field).ok_or_else(|| DcError::field("i3", "invalid"))? as i32
                }
                6 => {
                    m.i4 = atoi_trim(field).ok_or_else(|| DcError::field("i4", "invalid"))? as i32
                }
                7 => m.soft = Software::parse(&String::from_utf8_lossy(field)),
                8 => m.owner = unmarshal_string(dec, field)?,
                9 => m.state = unmarshal_string(dec, field)?,
                10 => {
                    if count < 12 {
                        m.encoding = String::from_utf8_lossy(field).into_owned();
                    }
                }
                // trailing fields of extended dialects are discarded
                _ => {}
            }
        }
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_info_nine_fields() {
        let m = HubInfo::unmarshal(
            None,
            b"OZERKI$dc.ozerki.pro$Main Hub$5000$0$1$2721$PtokaX$",
        )
        .unwrap();
        assert_eq!(m.name, "OZERKI");
        assert_eq!(m.host, "dc.ozerki.pro");
        assert_eq!((m.i1, m.i2, m.i3, m.i4), (5000, 0, 1, 2721));
        assert_eq!(m.soft.name, "PtokaX");
        assert_eq!(m.soft.version, "");

        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(buf, b"OZERKI$dc.ozerki.pro$Main Hub$5000$0$1$2721$PtokaX$$$");
    }

    #[test]
    fn test_hub_info_all_fields() {
        let data: &[u8] = b"Angels$dc.milenahub.ru$Cogitationis.$20480$0$0$0$Verlihub 1.1.0.12$=FAUST= &amp; KCAHDEP$Public HUB$CP1251";
        let m = HubInfo::unmarshal(None, data).unwrap();
        assert_eq!(m.soft, Software { name: "Verlihub".into(), version: "1.1.0.12".into() });
        assert_eq!(m.owner, "=FAUST= & KCAHDEP");
        assert_eq!(m.state, "Public HUB");
        assert_eq!(m.encoding, "CP1251");

        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_hub_info_extended_fields_discarded() {
        let m = HubInfo::unmarshal(
            None,
            b"hub name$dc.example.com:8000$hub desc$3000$32212254720$3$40$YnHub 1.0364$owner$desc 2$admin@example.com$",
        )
        .unwrap();
        assert_eq!(m.i2, 32212254720);
        assert_eq!(m.soft.version, "1.0364");
        assert_eq!(m.owner, "owner");
        assert_eq!(m.state, "desc 2");
        // the 11th field is an admin mail, not the encoding
        assert_eq!(m.encoding, "");

        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(
            buf,
            b"hub name$dc.example.com:8000$hub desc$3000$32212254720$3$40$YnHub 1.0364$owner$desc 2$"
        );
    }
}
