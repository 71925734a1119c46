//! ADC value types: session and client identifiers, feature codes,
//! feature sets and wire paths.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DcError, Result};

use super::marshal::{escape_into, unescape, FieldValue};

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// A three-byte ADC command name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MsgType(pub [u8; 3]);

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MsgType({})", self)
    }
}

/// A session identifier: four base32 characters assigned by the hub,
/// transferred verbatim.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Sid(pub [u8; 4]);

impl Sid {
    /// Builds a SID from an integer using the base32 alphabet.
    pub fn from_u32(mut v: u32) -> Sid {
        let mut b = [BASE32_ALPHABET[0]; 4];
        for i in (0..4).rev() {
            b[i] = BASE32_ALPHABET[(v % 32) as usize];
            v /= 32;
        }
        Sid(b)
    }

    /// The integer value of the SID, if it is well-formed base32.
    pub fn to_u32(self) -> Option<u32> {
        let mut v = 0u32;
        for b in self.0 {
            let d = BASE32_ALPHABET.iter().position(|&a| a == b)?;
            v = v * 32 + d as u32;
        }
        Some(v)
    }

    pub fn is_zero(self) -> bool {
        self == Sid::default()
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid({})", self)
    }
}

impl FromStr for Sid {
    type Err = DcError;

    fn from_str(s: &str) -> Result<Sid> {
        Sid::decode_field(s.as_bytes())
    }
}

impl FieldValue for Sid {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.0);
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<Sid> {
        let b: [u8; 4] = data
            .try_into()
            .map_err(|_| DcError::protocol(format!("malformed SID [{}]", data.len())))?;
        Ok(Sid(b))
    }

    fn is_default_field(&self) -> bool {
        self.is_zero()
    }
}

impl Serialize for Sid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Sid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Sid, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A client identifier: 24 bytes, base32 on the wire (39 characters).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cid(pub [u8; Cid::SIZE]);

/// A private identifier; same width as a [`Cid`], sent only to the hub.
pub type Pid = Cid;

impl Cid {
    pub const SIZE: usize = 24;
    pub const BASE32_LEN: usize = 39;

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; Cid::SIZE]
    }

    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.0)
    }

    pub fn from_base32(s: &[u8]) -> Result<Cid> {
        if s.len() != Cid::BASE32_LEN {
            return Err(DcError::protocol(format!(
                "wrong CID length: {} vs {}",
                s.len(),
                Cid::BASE32_LEN
            )));
        }
        let mut c = Cid::default();
        BASE32_NOPAD
            .decode_mut(s, &mut c.0)
            .map_err(|e| DcError::protocol(format!("invalid base32 CID: {:?}", e.error)))?;
        Ok(c)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self)
    }
}

impl FromStr for Cid {
    type Err = DcError;

    fn from_str(s: &str) -> Result<Cid> {
        Cid::from_base32(s.as_bytes())
    }
}

impl FieldValue for Cid {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        let start = buf.len();
        buf.resize(start + Cid::BASE32_LEN, 0);
        BASE32_NOPAD.encode_mut(&self.0, &mut buf[start..]);
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<Cid> {
        Cid::from_base32(data)
    }

    fn is_default_field(&self) -> bool {
        self.is_zero()
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Cid, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A four-byte ASCII feature code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Feature(pub [u8; 4]);

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Feature({})", self)
    }
}

impl FromStr for Feature {
    type Err = DcError;

    fn from_str(s: &str) -> Result<Feature> {
        Feature::decode_field(s.as_bytes())
    }
}

impl FieldValue for Feature {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.0);
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<Feature> {
        let b: [u8; 4] = data
            .try_into()
            .map_err(|_| DcError::protocol(format!("malformed feature [{}]", data.len())))?;
        Ok(Feature(b))
    }

    fn is_default_field(&self) -> bool {
        *self == Feature::default()
    }
}

/// A set of features with add/remove state, as negotiated by `SUP`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModFeatures(pub BTreeMap<Feature, bool>);

impl ModFeatures {
    pub fn new() -> ModFeatures {
        ModFeatures::default()
    }

    pub fn set(&mut self, f: Feature, add: bool) {
        self.0.insert(f, add);
    }

    pub fn is_set(&self, f: Feature) -> bool {
        self.0.contains_key(&f)
    }

    /// Applies the modifications of `other` on top of this set.
    pub fn set_from(&self, other: &ModFeatures) -> ModFeatures {
        let mut out = self.clone();
        for (&f, &add) in &other.0 {
            out.0.insert(f, add);
        }
        out
    }

    /// Features added on both sides.
    pub fn intersect(&self, other: &ModFeatures) -> ModFeatures {
        let mut out = ModFeatures::new();
        for (&f, &add) in &self.0 {
            if add && other.0.get(&f) == Some(&true) {
                out.0.insert(f, true);
            }
        }
        out
    }

    /// Comma-joined list of the added features.
    pub fn join(&self) -> String {
        let list: Vec<String> = self
            .0
            .iter()
            .filter(|(_, &add)| add)
            .map(|(f, _)| f.to_string())
            .collect();
        list.join(",")
    }
}

impl FieldValue for ModFeatures {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        for (i, (f, &add)) in self.0.iter().enumerate() {
            if i != 0 {
                buf.push(b' ');
            }
            buf.extend_from_slice(if add { b"AD" } else { b"RM" });
            buf.extend_from_slice(&f.0);
        }
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<ModFeatures> {
        let mut out = ModFeatures::new();
        for tok in data.split(|&b| b == b' ') {
            if tok.is_empty() {
                continue;
            }
            let (add, name) = match tok {
                _ if tok.starts_with(b"AD") => (true, &tok[2..]),
                _ if tok.starts_with(b"RM") => (false, &tok[2..]),
                _ => {
                    return Err(DcError::protocol(format!(
                        "invalid features modifier: {:?}",
                        String::from_utf8_lossy(tok)
                    )))
                }
            };
            out.0.insert(Feature::decode_field(name)?, add);
        }
        Ok(out)
    }

    fn is_default_field(&self) -> bool {
        self.0.is_empty()
    }
}

/// An ordered feature list, comma-joined on the wire (the `SU` user-info
/// field).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtFeatures(pub Vec<Feature>);

impl ExtFeatures {
    pub fn has(&self, f: Feature) -> bool {
        self.0.contains(&f)
    }
}

impl From<Vec<Feature>> for ExtFeatures {
    fn from(v: Vec<Feature>) -> ExtFeatures {
        ExtFeatures(v)
    }
}

impl FieldValue for ExtFeatures {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        for (i, f) in self.0.iter().enumerate() {
            if i != 0 {
                buf.push(b',');
            }
            buf.extend_from_slice(&f.0);
        }
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<ExtFeatures> {
        if data.is_empty() {
            return Ok(ExtFeatures::default());
        }
        let mut out = Vec::new();
        for part in data.split(|&b| b == b',') {
            out.push(Feature::decode_field(part)?);
        }
        Ok(ExtFeatures(out))
    }

    fn is_default_field(&self) -> bool {
        self.0.is_empty()
    }
}

/// A file path, `/`-joined on the wire with each segment escaped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path(pub Vec<String>);

impl From<Vec<String>> for Path {
    fn from(v: Vec<String>) -> Path {
        Path(v)
    }
}

impl FieldValue for Path {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        for (i, seg) in self.0.iter().enumerate() {
            if i != 0 {
                buf.push(b'/');
            }
            escape_into(seg, buf);
        }
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<Path> {
        if data.is_empty() {
            return Ok(Path::default());
        }
        Ok(Path(
            data.split(|&b| b == b'/').map(unescape).collect(),
        ))
    }

    fn is_default_field(&self) -> bool {
        self.0.is_empty()
    }
}
