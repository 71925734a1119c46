//! Search requests and results.

use crate::error::{DcError, Result};
use crate::tiger::Hash;

use super::types::{
    atoi_trim, marshal_name, marshal_string, parse_u64_trim, splitn, unmarshal_name,
    unmarshal_string,
};
use super::{MessageBody, TextDecoder, TextEncoder};

/// The content category of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataType(pub u32);

impl DataType {
    pub const ANY: DataType = DataType(1);
    pub const AUDIO: DataType = DataType(2);
    pub const COMPRESSED: DataType = DataType(3);
    pub const DOCUMENT: DataType = DataType(4);
    pub const EXECUTABLE: DataType = DataType(5);
    pub const PICTURE: DataType = DataType(6);
    pub const VIDEO: DataType = DataType(7);
    pub const FOLDERS: DataType = DataType(8);
    pub const TTH: DataType = DataType(9);
    pub const DISK_IMAGE: DataType = DataType(10);
    pub const COMICS: DataType = DataType(11);
    pub const BOOK: DataType = DataType(12);
    pub const MAGNET: DataType = DataType(13);
}

/// A search request:
/// `$Search addr-or-Hub:user restricted?max?size?type?pattern-or-TTH:hash|`.
///
/// Spaces inside the pattern travel as `$` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Search {
    /// Response address for active searches.
    pub address: String,
    /// User name for passive (hub-routed) searches.
    pub user: String,

    pub size_restricted: bool,
    pub is_max_size: bool,
    pub size: u64,
    pub data_type: DataType,

    pub pattern: String,
    pub tth: Option<Hash>,
}

impl MessageBody for Search {
    const TYPE: &'static str = "Search";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        if !self.address.is_empty() {
            buf.extend_from_slice(self.address.as_bytes());
        } else {
            buf.extend_from_slice(b"Hub:");
            marshal_name(enc, &self.user, buf)?;
        }
        buf.push(b' ');
        if self.size_restricted {
            buf.extend_from_slice(if self.is_max_size { b"T?T" } else { b"T?F" });
        } else {
            buf.extend_from_slice(b"F?T");
        }
        buf.push(b'?');
        buf.extend_from_slice(self.size.to_string().as_bytes());
        buf.push(b'?');
        let dt = if self.data_type.0 == 0 {
            DataType::ANY
        } else {
            self.data_type
        };
        buf.extend_from_slice(dt.0.to_string().as_bytes());
        buf.push(b'?');
        if dt == DataType::TTH {
            let tth = self
                .tth
                .as_ref()
                .ok_or_else(|| DcError::protocol("invalid TTH pointer"))?;
            buf.extend_from_slice(b"TTH:");
            let start = buf.len();
            buf.resize(start + Hash::BASE32_LEN, 0);
            tth.encode_base32_into(&mut buf[start..]);
        } else {
            let mut pattern = Vec::new();
            marshal_string(enc, &self.pattern, &mut pattern)?;
            for b in &mut pattern {
                if *b == b' ' {
                    *b = b'$';
                }
            }
            buf.extend_from_slice(&pattern);
        }
        Ok(())
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Search> {
        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("invalid search command"))?;
        let mut m = Search::default();
        const NAME_PREFIX: &[u8] = b"Hub:";
        let field = &data[..i];
        match field.strip_prefix(NAME_PREFIX) {
            Some(name) => m.user = unmarshal_name(dec, name)?,
            None => m.address = String::from_utf8_lossy(field).into_owned(),
        }
        m.unmarshal_constraints(dec, &data[i + 1..])?;
        Ok(m)
    }
}

impl Search {
    fn unmarshal_constraints(&mut self, dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<()> {
        let fields = splitn(data, b'?', 5);
        if fields.len() < 5 {
            return Err(DcError::protocol("invalid search string"));
        }

        self.size_restricted = unmarshal_bool_flag(fields[0])?;
        self.is_max_size = unmarshal_bool_flag(fields[1])?;

        let size = fields[2];
        if !size.is_empty() {
            if size[0] == b'-' {
                // some clients send a restricted search with size -1
                parse_u64_trim(&size[1..])
                    .ok_or_else(|| DcError::field("size", "invalid number"))?;
                self.size_restricted = false;
                self.size = 0;
            } else {
                self.size = parse_u64_trim(size)
                    .ok_or_else(|| DcError::field("size", "invalid number"))?;
            }
        }

        let typ = parse_u64_trim(fields[3])
            .ok_or_else(|| DcError::field("data type", "invalid number"))?;
        self.data_type = DataType(typ as u32);

        let field = fields[4];
        if self.data_type == DataType::TTH {
            let hash = field
                .strip_prefix(b"TTH:")
                .ok_or_else(|| DcError::protocol("invalid TTH search"))?;
            let hash = hash.strip_suffix(b"$").unwrap_or(hash);
            self.tth = Some(Hash::from_base32(hash)?);
        } else {
            let mut pattern = unmarshal_string(dec, field)?;
            if pattern.contains('$') {
                pattern = pattern.replace('$', " ");
            }
            self.pattern = pattern;
        }
        Ok(())
    }
}

fn unmarshal_bool_flag(data: &[u8]) -> Result<bool> {
    match data {
        b"T" => Ok(true),
        b"F" => Ok(false),
        _ => Err(DcError::protocol("invalid bool flag")),
    }
}

const SR_SEP: u8 = 0x05;

/// A search result:
/// `$SR from path[<0x05>size] free/total<0x05>TTH-or-hub (addr)[<0x05>to]|`.
///
/// A directory result has no size field, which also removes the 0x05
/// between the path and the slots; the parser resolves the ambiguity by
/// scanning the first segment backward for the slot separator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sr {
    pub from: String,
    pub path: Vec<String>,
    pub is_dir: bool,
    /// Only set for files.
    pub size: u64,
    pub free_slots: i32,
    pub total_slots: i32,
    pub hub_name: String,
    pub tth: Option<Hash>,
    pub hub_address: String,
    pub to: String,
}

impl MessageBody for Sr {
    const TYPE: &'static str = "SR";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_name(enc, &self.from, buf)?;
        if self.path.is_empty() {
            return Err(DcError::protocol("invalid SR command: empty path"));
        }
        buf.push(b' ');
        for (i, p) in self.path.iter().enumerate() {
            if i != 0 {
                buf.push(b'\\');
            }
            marshal_string(enc, p, buf)?;
        }
        if !self.is_dir {
            buf.push(SR_SEP);
            buf.extend_from_slice(self.size.to_string().as_bytes());
        }
        buf.push(b' ');
        buf.extend_from_slice(self.free_slots.to_string().as_bytes());
        buf.push(b'/');
        buf.extend_from_slice(self.total_slots.to_string().as_bytes());
        buf.push(SR_SEP);
        match &self.tth {
            Some(tth) => {
                buf.extend_from_slice(b"TTH:");
                let start = buf.len();
                buf.resize(start + Hash::BASE32_LEN, 0);
                tth.encode_base32_into(&mut buf[start..]);
            }
            // legacy result without a TTH carries the hub name instead
            None => marshal_string(enc, &self.hub_name, buf)?,
        }
        buf.extend_from_slice(b" (");
        buf.extend_from_slice(self.hub_address.as_bytes());
        buf.push(b')');
        if self.to.is_empty() {
            return Ok(());
        }
        buf.push(SR_SEP);
        marshal_name(enc, &self.to, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Sr> {
        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("invalid SR command: missing name"))?;
        let mut m = Sr {
            from: unmarshal_name(dec, &data[..i])?,
            ..Sr::default()
        };
        let data = &data[i + 1..];

        let i = data
            .iter()
            .position(|&b| b == SR_SEP)
            .ok_or_else(|| DcError::protocol("invalid SR command: missing separator"))?;
        // either the path alone (file) or path and slots (directory)
        let maybe_path = &data[..i];
        let mut data = &data[i + 1..];

        // scan backward for the slot separator
        let mut has_sep = false;
        let mut split_at = None;
        for (j, &b) in maybe_path.iter().enumerate().rev() {
            if b == b'/' {
                has_sep = true;
            } else if !b.is_ascii_digit() {
                split_at = Some(j);
                break;
            }
        }
        let (path, slots): (&[u8], &[u8]) = match (has_sep, split_at) {
            (true, Some(j)) => {
                m.is_dir = true;
                (&maybe_path[..j], &maybe_path[j + 1..])
            }
            _ => {
                // file result: size and slots follow after the next 0x05
                let i = data
                    .iter()
                    .position(|&b| b == SR_SEP)
                    .ok_or_else(|| DcError::protocol("invalid SR command: missing size"))?;
                let size_and_slots = &data[..i];
                data = &data[i + 1..];
                let i = size_and_slots
                    .iter()
                    .position(|&b| b == b' ')
                    .ok_or_else(|| {
                        DcError::protocol("invalid SR command: missing size separator")
                    })?;
                m.size = parse_u64_trim(&size_and_slots[..i])
                    .ok_or_else(|| DcError::field("size", "invalid number"))?;
                (maybe_path, &size_and_slots[i + 1..])
            }
        };
        let path = unmarshal_string(dec, path)?;
        m.path = path.split('\\').map(str::to_string).collect();

        let i = slots
            .iter()
            .position(|&b| b == b'/')
            .ok_or_else(|| DcError::protocol("invalid SR command: missing slots separator"))?;
        m.free_slots = atoi_trim(&slots[..i])
            .ok_or_else(|| DcError::field("free slots", "invalid number"))? as i32;
        m.total_slots = atoi_trim(&slots[i + 1..])
            .ok_or_else(|| DcError::field("total slots", "invalid number"))? as i32;

        let mut data = data;
        if let Some(rest) = data.strip_prefix(b"TTH:") {
            let i = Hash::BASE32_LEN;
            if i + 1 >= rest.len() || rest[i] != b' ' || rest[i + 1] != b'(' {
                return Err(DcError::protocol("invalid SR command: invalid TTH result"));
            }
            m.tth = Some(Hash::from_base32(&rest[..i])?);
            data = &rest[i + 2..];
        } else {
            let i = data
                .windows(2)
                .position(|w| w == b" (")
                .ok_or_else(|| {
                    DcError::protocol("invalid SR command: missing TTH or hub name")
                })?;
            m.hub_name = unmarshal_string(dec, &data[..i])?;
            data = &data[i + 2..];
        }
        let i = data
            .iter()
            .position(|&b| b == b')')
            .ok_or_else(|| DcError::protocol("invalid SR command: missing hub address"))?;
        m.hub_address = String::from_utf8_lossy(&data[..i]).into_owned();
        let data = &data[i + 1..];
        if data.is_empty() {
            return Ok(m);
        }
        if data[0] != SR_SEP || data.len() == 1 {
            return Err(DcError::protocol("invalid SR command: missing target"));
        }
        m.to = unmarshal_name(dec, &data[1..])?;
        Ok(m)
    }
}

/// Active short TTH search. Requires the `TTHS` extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TthSearchActive {
    pub tth: Hash,
    pub address: String,
}

impl MessageBody for TthSearchActive {
    const TYPE: &'static str = "SA";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        let start = buf.len();
        buf.resize(start + Hash::BASE32_LEN, 0);
        self.tth.encode_base32_into(&mut buf[start..]);
        buf.push(b' ');
        buf.extend_from_slice(self.address.as_bytes());
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<TthSearchActive> {
        const I: usize = Hash::BASE32_LEN;
        if I >= data.len() || data[I] != b' ' {
            return Err(DcError::protocol("missing separator in SA command"));
        }
        Ok(TthSearchActive {
            tth: Hash::from_base32(&data[..I])?,
            address: String::from_utf8_lossy(&data[I + 1..]).into_owned(),
        })
    }
}

/// Passive short TTH search. Requires the `TTHS` extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TthSearchPassive {
    pub tth: Hash,
    pub user: String,
}

impl MessageBody for TthSearchPassive {
    const TYPE: &'static str = "SP";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        let start = buf.len();
        buf.resize(start + Hash::BASE32_LEN, 0);
        self.tth.encode_base32_into(&mut buf[start..]);
        buf.push(b' ');
        marshal_name(enc, &self.user, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<TthSearchPassive> {
        const I: usize = Hash::BASE32_LEN;
        if I >= data.len() || data[I] != b' ' {
            return Err(DcError::protocol("missing separator in SP command"));
        }
        Ok(TthSearchPassive {
            tth: Hash::from_base32(&data[..I])?,
            user: unmarshal_name(dec, &data[I + 1..])?,
        })
    }
}
