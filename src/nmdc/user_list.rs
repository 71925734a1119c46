//! User-list messages: nick lists, operator lists and address reports.

use crate::error::{DcError, Result};

use super::hub::no_args_message;
use super::types::{marshal_name, unmarshal_name};
use super::{MessageBody, TextDecoder, TextEncoder};

no_args_message! {
    /// Asks the hub for the list of online users.
    GetNickList, "GetNickList"
}

/// A list of user names separated by `$$`.
pub type Names = Vec<String>;

fn marshal_names(
    enc: Option<&dyn TextEncoder>,
    names: &[String],
    buf: &mut Vec<u8>,
) -> Result<()> {
    if names.is_empty() {
        buf.extend_from_slice(b"$$");
        return Ok(());
    }
    for name in names {
        marshal_name(enc, name, buf)?;
        buf.extend_from_slice(b"$$");
    }
    Ok(())
}

fn unmarshal_names(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Names> {
    let data = data.strip_suffix(b"$$").unwrap_or(data);
    if data.is_empty() {
        return Ok(Names::new());
    }
    let mut names = Names::new();
    let mut rest = data;
    loop {
        match rest.windows(2).position(|w| w == b"$$") {
            Some(i) => {
                names.push(unmarshal_name(dec, &rest[..i])?);
                rest = &rest[i + 2..];
            }
            None => {
                names.push(unmarshal_name(dec, rest)?);
                return Ok(names);
            }
        }
    }
}

macro_rules! names_message {
    ($(#[$meta:meta])* $name:ident, $typ:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            pub names: Names,
        }

        impl MessageBody for $name {
            const TYPE: &'static str = $typ;

            fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
                marshal_names(enc, &self.names, buf)
            }

            fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<$name> {
                Ok($name {
                    names: unmarshal_names(dec, data)?,
                })
            }
        }
    };
}

names_message! {
    /// The list of hub operators.
    OpList, "OpList"
}

names_message! {
    /// The list of hub bots. Requires the `BotList` extension.
    BotList, "BotList"
}

/// A user name and IP address pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserAddress {
    pub name: String,
    pub ip: String,
}

/// IP report for one or more users: `name ip$$…`. Requires the `UserIP2`
/// extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserIpList {
    pub list: Vec<UserAddress>,
}

impl MessageBody for UserIpList {
    const TYPE: &'static str = "UserIP";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        for a in &self.list {
            marshal_name(enc, &a.name, buf)?;
            buf.push(b' ');
            buf.extend_from_slice(a.ip.as_bytes());
            buf.extend_from_slice(b"$$");
        }
        Ok(())
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<UserIpList> {
        let data = data.strip_suffix(b"\r").unwrap_or(data);
        let data = data.strip_suffix(b"$$").unwrap_or(data);
        let mut m = UserIpList::default();
        let mut rest = data;
        loop {
            let (entry, next) = match rest.windows(2).position(|w| w == b"$$") {
                Some(i) => (&rest[..i], Some(&rest[i + 2..])),
                None => (rest, None),
            };
            let mut a = UserAddress::default();
            let mut name = entry;
            if let Some(i) = entry.iter().rposition(|&b| b == b' ') {
                a.ip = String::from_utf8_lossy(&entry[i + 1..]).into_owned();
                name = &entry[..i];
            }
            a.name = unmarshal_name(dec, name)?;
            m.list.push(a);
            match next {
                Some(n) => rest = n,
                None => return Ok(m),
            }
        }
    }
}
