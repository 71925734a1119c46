//! File-transfer negotiation messages (`ADCGet` extension).

use crate::error::{DcError, Result};

use super::hub::no_args_message;
use super::types::{marshal_string, parse_u64_trim, unmarshal_string};
use super::{MessageBody, TextDecoder, TextEncoder};

/// A download request: `$ADCGET type path start length [ZL1] [DB<n>]|`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdcGet {
    pub content_type: String,
    pub identifier: String,
    pub start: u64,
    /// `-1` requests the whole remainder.
    pub length: i64,
    pub compressed: bool,
    pub downloaded_bytes: Option<u64>,
}

impl MessageBody for AdcGet {
    const TYPE: &'static str = "ADCGET";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_string(enc, &self.content_type, buf)?;
        buf.push(b' ');
        marshal_string(enc, &self.identifier, buf)?;
        buf.push(b' ');
        buf.extend_from_slice(self.start.to_string().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.length.to_string().as_bytes());
        if self.compressed {
            buf.extend_from_slice(b" ZL1");
        }
        if let Some(db) = self.downloaded_bytes {
            buf.extend_from_slice(b" DB");
            buf.extend_from_slice(db.to_string().as_bytes());
        }
        Ok(())
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<AdcGet> {
        let mut m = AdcGet::default();
        let mut fields = data.split(|&b| b == b' ');
        let mut next = |name: &'static str| {
            fields
                .next()
                .ok_or_else(|| DcError::field(name, "missing field"))
        };
        m.content_type = unmarshal_string(dec, next("content type")?)?;
        m.identifier = unmarshal_string(dec, next("identifier")?)?;
        m.start = parse_u64_trim(next("start")?)
            .ok_or_else(|| DcError::field("start", "invalid number"))?;
        let length = next("length")?;
        if length == b"-1" {
            m.length = -1;
        } else {
            m.length = parse_u64_trim(length)
                .ok_or_else(|| DcError::field("length", "invalid number"))?
                as i64;
        }
        for field in fields {
            if field == b"ZL1" {
                m.compressed = true;
            } else if let Some(db) = field.strip_prefix(b"DB") {
                m.downloaded_bytes = Some(
                    parse_u64_trim(db)
                        .ok_or_else(|| DcError::field("downloaded bytes", "invalid number"))?,
                );
            }
        }
        Ok(m)
    }
}

/// The answer to a download request: `$ADCSND type path start length [ZL1]|`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdcSnd {
    pub content_type: String,
    pub identifier: String,
    pub start: u64,
    pub length: u64,
    pub compressed: bool,
}

impl MessageBody for AdcSnd {
    const TYPE: &'static str = "ADCSND";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_string(enc, &self.content_type, buf)?;
        buf.push(b' ');
        marshal_string(enc, &self.identifier, buf)?;
        buf.push(b' ');
        buf.extend_from_slice(self.start.to_string().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.length.to_string().as_bytes());
        if self.compressed {
            buf.extend_from_slice(b" ZL1");
        }
        Ok(())
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<AdcSnd> {
        let mut m = AdcSnd::default();
        let mut fields = data.split(|&b| b == b' ');
        let mut next = |name: &'static str| {
            fields
                .next()
                .ok_or_else(|| DcError::field(name, "missing field"))
        };
        m.content_type = unmarshal_string(dec, next("content type")?)?;
        m.identifier = unmarshal_string(dec, next("identifier")?)?;
        m.start = parse_u64_trim(next("start")?)
            .ok_or_else(|| DcError::field("start", "invalid number"))?;
        m.length = parse_u64_trim(next("length")?)
            .ok_or_else(|| DcError::field("length", "invalid number"))?;
        match fields.next() {
            None => {}
            Some(f) if f == b"ZL1" => m.compressed = true,
            Some(_) => return Err(DcError::protocol("ADCSND: invalid trailing field")),
        }
        Ok(m)
    }
}

/// Declares the transfer direction in the client handshake:
/// `$Direction Upload|Download number|`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Direction {
    pub upload: bool,
    pub number: u32,
}

impl MessageBody for Direction {
    const TYPE: &'static str = "Direction";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(if self.upload {
            b"Upload".as_ref()
        } else {
            b"Download".as_ref()
        });
        buf.push(b' ');
        buf.extend_from_slice(self.number.to_string().as_bytes());
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Direction> {
        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("Direction: missing field"))?;
        let upload = match &data[..i] {
            b"Upload" => true,
            b"Download" => false,
            _ => return Err(DcError::protocol("Direction: invalid direction field")),
        };
        let number = parse_u64_trim(&data[i + 1..])
            .ok_or_else(|| DcError::field("number", "invalid number"))?;
        if !(1..=32767).contains(&number) {
            return Err(DcError::protocol("Direction: number outside range"));
        }
        Ok(Direction {
            upload,
            number: number as u32,
        })
    }
}

no_args_message! {
    /// Signals that all upload slots are taken.
    MaxedOut, "MaxedOut"
}
