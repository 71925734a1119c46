//! User identity and presence messages, including `MyINFO`.

use std::collections::BTreeMap;

use crate::error::{DcError, Result};
use crate::software::Software;

use super::hub::name_message;
use super::types::{
    atoi_trim, marshal_name, marshal_string, parse_u64_trim, split_n, unmarshal_name,
    unmarshal_string,
};
use super::{MessageBody, TextDecoder, TextEncoder};

name_message! {
    /// A request to enter the hub with a specific user name. The hub
    /// answers with `$Hello` or `$ValidateDenide`.
    ValidateNick, "ValidateNick"
}

name_message! {
    /// Rejects the requested user name.
    ValidateDenide, "ValidateDenide"
}

name_message! {
    /// Identifies a peer on a client-to-client connection.
    MyNick, "MyNick"
}

name_message! {
    /// A notification about a user quitting the hub.
    Quit, "Quit"
}

/// Asks the hub for another user's `$MyINFO`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetInfo {
    pub nick: String,
    pub me: String,
}

impl MessageBody for GetInfo {
    const TYPE: &'static str = "GetINFO";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_name(enc, &self.nick, buf)?;
        buf.push(b' ');
        marshal_name(enc, &self.me, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<GetInfo> {
        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("invalid GetINFO command"))?;
        Ok(GetInfo {
            nick: unmarshal_name(dec, &data[..i])?,
            me: unmarshal_name(dec, &data[i + 1..])?,
        })
    }
}

/// The connection mode advertised in the `MyINFO` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserMode {
    #[default]
    Unknown,
    Active,
    Passive,
    Socks5,
    Other(u8),
}

impl UserMode {
    pub(crate) fn from_byte(b: u8) -> UserMode {
        match b {
            b' ' => UserMode::Unknown,
            b'A' => UserMode::Active,
            b'P' => UserMode::Passive,
            b'5' => UserMode::Socks5,
            other => UserMode::Other(other),
        }
    }

    pub(crate) fn byte(self) -> Option<u8> {
        match self {
            UserMode::Unknown => None,
            UserMode::Active => Some(b'A'),
            UserMode::Passive => Some(b'P'),
            UserMode::Socks5 => Some(b'5'),
            UserMode::Other(b' ') => None,
            UserMode::Other(b) => Some(b),
        }
    }
}

/// The status/flag byte of a `MyINFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserFlag(pub u8);

impl UserFlag {
    pub const NORMAL: UserFlag = UserFlag(0x01);
    pub const AWAY: UserFlag = UserFlag(0x02);
    pub const SERVER: UserFlag = UserFlag(0x04);
    pub const FIREBALL: UserFlag = UserFlag(0x08);
    pub const TLS_DOWNLOAD: UserFlag = UserFlag(0x10);
    pub const TLS_UPLOAD: UserFlag = UserFlag(0x20);
    pub const IPV4: UserFlag = UserFlag(0x40);
    pub const IPV6: UserFlag = UserFlag(0x80);
    pub const TLS: UserFlag = UserFlag(0x10 | 0x20);

    pub fn is_set(self, f: UserFlag) -> bool {
        self.0 & f.0 != 0
    }
}

impl std::ops::BitOr for UserFlag {
    type Output = UserFlag;
    fn bitor(self, rhs: UserFlag) -> UserFlag {
        UserFlag(self.0 | rhs.0)
    }
}

/// User presence information:
/// `$MyINFO $ALL name desc<client V:v,M:m,H:n/r/o,S:s>$ $conn<flag>$email$share$|`.
///
/// The tag is optional on the wire; the emitter always writes the full
/// canonical form, including the three-part hub counts. Unknown tag keys
/// are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MyInfo {
    pub name: String,
    pub desc: String,
    pub client: Software,
    pub mode: UserMode,
    pub hubs_normal: i32,
    pub hubs_registered: i32,
    pub hubs_operator: i32,
    pub slots: i32,
    pub extra: BTreeMap<String, String>,
    pub conn: String,
    pub flag: UserFlag,
    pub email: String,
    pub share_size: u64,
}

impl MessageBody for MyInfo {
    const TYPE: &'static str = "MyINFO";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"$ALL ");
        marshal_name(enc, &self.name, buf)?;
        buf.push(b' ');
        marshal_string(enc, &self.desc, buf)?;

        buf.push(b'<');
        buf.extend_from_slice(self.client.name.as_bytes());
        buf.extend_from_slice(b" V:");
        buf.extend_from_slice(self.client.version.as_bytes());
        buf.extend_from_slice(b",M:");
        buf.push(self.mode.byte().unwrap_or(b' '));
        buf.extend_from_slice(b",H:");
        buf.extend_from_slice(self.hubs_normal.to_string().as_bytes());
        buf.push(b'/');
        buf.extend_from_slice(self.hubs_registered.to_string().as_bytes());
        buf.push(b'/');
        buf.extend_from_slice(self.hubs_operator.to_string().as_bytes());
        buf.extend_from_slice(b",S:");
        buf.extend_from_slice(self.slots.to_string().as_bytes());
        for (name, value) in &self.extra {
            buf.push(b',');
            buf.extend_from_slice(name.as_bytes());
            buf.push(b':');
            buf.extend_from_slice(value.as_bytes());
        }
        buf.push(b'>');

        buf.extend_from_slice(b"$ $");
        buf.extend_from_slice(self.conn.as_bytes());
        buf.push(if self.flag.0 == 0 {
            UserFlag::NORMAL.0
        } else {
            self.flag.0
        });
        buf.push(b'$');
        buf.extend_from_slice(self.email.as_bytes());
        buf.push(b'$');
        buf.extend_from_slice(self.share_size.to_string().as_bytes());
        buf.push(b'$');
        Ok(())
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<MyInfo> {
        const PREFIX: &[u8] = b"$ALL ";
        let data = data
            .strip_prefix(PREFIX)
            .ok_or_else(|| DcError::protocol("invalid info command: wrong prefix"))?;

        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("invalid info command: no separators"))?;
        let mut m = MyInfo {
            name: unmarshal_name(dec, &data[..i])?,
            ..MyInfo::default()
        };
        let data = &data[i + 1..];

        let mut fields = split_n(data, b'$', 6)
            .ok_or_else(|| {
                DcError::protocol(format!(
                    "invalid info command: {:?}",
                    String::from_utf8_lossy(data)
                ))
            })?
            .into_iter();
        let mut next = || fields.next().unwrap_or(&[]);

        // description with an optional embedded tag
        let field = next();
        let mut has_tag = false;
        let desc = match field.iter().position(|&b| b == b'<') {
            None => field,
            Some(i) => {
                has_tag = true;
                let mut tag = &field[i + 1..];
                if tag.is_empty() {
                    return Err(DcError::protocol("empty info tag"));
                }
                if tag.last() == Some(&b'>') {
                    tag = &tag[..tag.len() - 1];
                }
                m.parse_tag(tag)?;
                &field[..i]
            }
        };
        m.desc = unmarshal_string(dec, desc)?;

        // legacy single-character mode field
        let field = next();
        if field.len() != 1 {
            return Err(DcError::protocol(format!(
                "unknown legacy user mode: {:?}",
                String::from_utf8_lossy(field)
            )));
        }
        if !has_tag {
            m.mode = UserMode::from_byte(field[0]);
        }

        let field = next();
        if !field.is_empty() {
            m.flag = UserFlag(field[field.len() - 1]);
            m.conn = String::from_utf8_lossy(&field[..field.len() - 1]).into_owned();
        }

        m.email = String::from_utf8_lossy(next()).into_owned();

        let field = next();
        if !field.is_empty() {
            // lenient: a non-numeric share field decodes as zero
            m.share_size = parse_u64_trim(field).unwrap_or(0);
        }
        Ok(m)
    }
}

impl MyInfo {
    fn parse_tag(&mut self, tag: &[u8]) -> Result<()> {
        let mut tag = tag;
        let mut client: &[u8] = &[];
        let ver = tag
            .windows(3)
            .position(|w| w == b" V:" || w == b" v:");
        if let Some(i) = ver {
            client = &tag[..i];
            tag = &tag[i + 1..];
        }
        let mut first = true;
        while !tag.is_empty() {
            let field = match tag.iter().position(|&b| b == b',') {
                Some(i) => {
                    let f = &tag[..i];
                    tag = &tag[i + 1..];
                    f
                }
                None => {
                    let f = tag;
                    tag = &[];
                    f
                }
            };
            let was_first = first;
            first = false;
            if field.is_empty() {
                continue;
            }
            let i = match field.iter().position(|&b| b == b':') {
                Some(i) => i,
                None if was_first => {
                    client = field;
                    continue;
                }
                None => {
                    return Err(DcError::protocol(format!(
                        "unknown field name in tag: {:?}",
                        String::from_utf8_lossy(field)
                    )))
                }
            };
            if i == 0 {
                return Err(DcError::protocol("unknown field name in tag"));
            }
            let key = &field[..i];
            let val = &field[i + 1..];
            if key.len() != 1 {
                self.extra.insert(
                    String::from_utf8_lossy(key).into_owned(),
                    String::from_utf8_lossy(val).into_owned(),
                );
                continue;
            }
            match key[0].to_ascii_uppercase() {
                b'V' => self.client.version = String::from_utf8_lossy(val).into_owned(),
                b'M' => {
                    self.mode = if val.len() == 1 {
                        UserMode::from_byte(val[0])
                    } else {
                        UserMode::Unknown
                    };
                }
                b'H' => {
                    if val.is_empty() {
                        self.hubs_normal = 1;
                        continue;
                    }
                    match split_n(val, b'/', 3) {
                        Some(hubs) => {
                            self.hubs_normal = atoi_trim(hubs[0])
                                .ok_or_else(|| DcError::field("hubs normal", "invalid number"))?
                                as i32;
                            self.hubs_registered = atoi_trim(hubs[1]).ok_or_else(|| {
                                DcError::field("hubs registered", "invalid number")
                            })? as i32;
                            self.hubs_operator = atoi_trim(hubs[2]).ok_or_else(|| {
                                DcError::field("hubs operator", "invalid number")
                            })?
                                as i32;
                        }
                        // legacy single hub count
                        None => {
                            self.hubs_normal = atoi_trim(val).ok_or_else(|| {
                                DcError::protocol(format!(
                                    "invalid hubs counts: {:?}",
                                    String::from_utf8_lossy(val)
                                ))
                            })? as i32;
                        }
                    }
                }
                b'S' => {
                    self.slots = atoi_trim(val)
                        .ok_or_else(|| DcError::field("slots", "invalid number"))?
                        as i32;
                }
                _ => {
                    self.extra.insert(
                        String::from_utf8_lossy(key).into_owned(),
                        String::from_utf8_lossy(val).into_owned(),
                    );
                }
            }
        }
        self.client.name = String::from_utf8_lossy(client).into_owned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unmarshal(data: &[u8]) -> MyInfo {
        MyInfo::unmarshal(None, data).unwrap()
    }

    fn marshal(m: &MyInfo) -> Vec<u8> {
        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_full_tag_roundtrip() {
        let data: &[u8] = b"$ALL johndoe RU<ApexDC++ V:0.4.0,M:P,H:27/1/3,S:92,L:512>$ $LAN(T3)K$example@example.com$1234$";
        let m = unmarshal(data);
        assert_eq!(m.name, "johndoe");
        assert_eq!(m.desc, "RU");
        assert_eq!(m.client, Software { name: "ApexDC++".into(), version: "0.4.0".into() });
        assert_eq!(m.mode, UserMode::Passive);
        assert_eq!((m.hubs_normal, m.hubs_registered, m.hubs_operator), (27, 1, 3));
        assert_eq!(m.slots, 92);
        assert_eq!(m.extra.get("L").map(String::as_str), Some("512"));
        assert_eq!(m.conn, "LAN(T3)");
        assert_eq!(m.flag, UserFlag(b'K'));
        assert_eq!(m.email, "example@example.com");
        assert_eq!(m.share_size, 1234);
        assert_eq!(marshal(&m), data);
    }

    #[test]
    fn test_no_tag_canonical_form() {
        let m = unmarshal(b"$ALL verg P verg$ $0.005A$$$");
        assert_eq!(m.name, "verg");
        assert_eq!(m.desc, "P verg");
        assert_eq!(m.mode, UserMode::Unknown);
        assert_eq!(m.conn, "0.005");
        assert_eq!(m.flag, UserFlag(b'A'));
        assert_eq!(marshal(&m), b"$ALL verg P verg< V:,M: ,H:0/0/0,S:0>$ $0.005A$$0$".to_vec());
    }

    #[test]
    fn test_dangling_tag_field() {
        let m = unmarshal(b"$ALL whist RU [29]some desc<GreylynkDC++ v:2.3.5,$ $LAN(T1)A$$65075277005$");
        assert_eq!(m.desc, "RU [29]some desc");
        assert_eq!(m.client, Software { name: "GreylynkDC++".into(), version: "2.3.5".into() });
        assert_eq!(m.mode, UserMode::Unknown);
        assert_eq!(m.share_size, 65075277005);
        assert_eq!(
            marshal(&m),
            b"$ALL whist RU [29]some desc<GreylynkDC++ V:2.3.5,M: ,H:0/0/0,S:0>$ $LAN(T1)A$$65075277005$".to_vec()
        );
    }

    #[test]
    fn test_no_version_and_space_in_hubs() {
        let m = unmarshal(b"$ALL vespa9347q1 <StrgDC++,M:A,H:1 /0/0,S:2>$ $0.01.$$37038592310$");
        assert_eq!(m.client.name, "StrgDC++");
        assert_eq!(m.client.version, "");
        assert_eq!(m.mode, UserMode::Active);
        assert_eq!(m.hubs_normal, 1);
        assert_eq!(m.slots, 2);
        assert_eq!(m.flag, UserFlag(b'.'));
        assert_eq!(
            marshal(&m),
            b"$ALL vespa9347q1 <StrgDC++ V:,M:A,H:1/0/0,S:2>$ $0.01.$$37038592310$".to_vec()
        );
    }

    #[test]
    fn test_only_name_emits_normal_flag() {
        let m = unmarshal(b"$ALL #GlobalOpChat $ $$$0$");
        assert_eq!(m.name, "#GlobalOpChat");
        assert_eq!(m.flag, UserFlag(0));
        assert_eq!(
            marshal(&m),
            b"$ALL #GlobalOpChat < V:,M: ,H:0/0/0,S:0>$ $\x01$$0$".to_vec()
        );
    }

    #[test]
    fn test_legacy_mode_field() {
        let m = unmarshal(b"$ALL -EA-Sports $P$$$0$");
        assert_eq!(m.mode, UserMode::Passive);
        assert_eq!(
            marshal(&m),
            b"$ALL -EA-Sports < V:,M:P,H:0/0/0,S:0>$ $\x01$$0$".to_vec()
        );
    }

    #[test]
    fn test_single_hub_count_normalized() {
        let m = unmarshal(b"$ALL N8611 <++ V:0.868,M:A,H:34,S:3>$A$0.005.$$27225945203$");
        assert_eq!(m.hubs_normal, 34);
        assert_eq!((m.hubs_registered, m.hubs_operator), (0, 0));
        // tag present, so the legacy mode field is ignored
        assert_eq!(m.mode, UserMode::Active);
        assert_eq!(
            marshal(&m),
            b"$ALL N8611 <++ V:0.868,M:A,H:34/0/0,S:3>$ $0.005.$$27225945203$".to_vec()
        );
    }

    #[test]
    fn test_non_numeric_share_is_zero() {
        let m = unmarshal(b"$ALL test @ HUB-Bot$ $BOT $mail (3.0.1)$BOT $");
        assert_eq!(m.conn, "BOT");
        assert_eq!(m.flag, UserFlag::TLS_UPLOAD); // trailing space byte
        assert_eq!(m.email, "mail (3.0.1)");
        assert_eq!(m.share_size, 0);
    }
}
