//! Hub session messages.

use crate::error::{DcError, Result};

use super::types::{marshal_name, marshal_string, unmarshal_name, unmarshal_string};
use super::{MessageBody, TextDecoder, TextEncoder};

macro_rules! name_message {
    ($(#[$meta:meta])* $name:ident, $typ:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            pub name: String,
        }

        impl MessageBody for $name {
            const TYPE: &'static str = $typ;

            fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
                marshal_name(enc, &self.name, buf)
            }

            fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<$name> {
                Ok($name {
                    name: unmarshal_name(dec, data)?,
                })
            }
        }
    };
}

macro_rules! string_message {
    ($(#[$meta:meta])* $name:ident($field:ident), $typ:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            pub $field: String,
        }

        impl MessageBody for $name {
            const TYPE: &'static str = $typ;

            fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
                marshal_string(enc, &self.$field, buf)
            }

            fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<$name> {
                Ok($name {
                    $field: unmarshal_string(dec, data)?,
                })
            }
        }
    };
}

macro_rules! no_args_message {
    ($(#[$meta:meta])* $name:ident, $typ:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl MessageBody for $name {
            const TYPE: &'static str = $typ;

            fn marshal(&self, _: Option<&dyn TextEncoder>, _: &mut Vec<u8>) -> Result<()> {
                Ok(())
            }

            fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<$name> {
                if !data.is_empty() {
                    return Err(DcError::protocol("unexpected argument for the command"));
                }
                Ok($name)
            }
        }
    };
}

pub(crate) use {name_message, no_args_message, string_message};

name_message! {
    /// Greets a user whose nick was accepted.
    Hello, "Hello"
}

name_message! {
    /// Confirms a registered user's login. A Verlihub dialect message.
    LogedIn, "LogedIn"
}

string_message! {
    /// The hub name shown in clients.
    HubName(name), "HubName"
}

string_message! {
    /// The hub topic. Requires the `HubTopic` extension.
    HubTopic(text), "HubTopic"
}

/// The legacy hub-version handshake message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Version {
    pub vers: String,
}

impl MessageBody for Version {
    const TYPE: &'static str = "Version";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.vers.as_bytes());
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Version> {
        Ok(Version {
            vers: String::from_utf8_lossy(data).into_owned(),
        })
    }
}

/// Alternative hub addresses, comma-separated. Requires the `FailOver`
/// extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailOver {
    pub host: Vec<String>,
}

impl MessageBody for FailOver {
    const TYPE: &'static str = "FailOver";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        for (i, h) in self.host.iter().enumerate() {
            if i != 0 {
                buf.push(b',');
            }
            buf.extend_from_slice(h.as_bytes());
        }
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<FailOver> {
        Ok(FailOver {
            host: data
                .split(|&b| b == b',')
                .map(|h| String::from_utf8_lossy(h).into_owned())
                .collect(),
        })
    }
}

no_args_message! {
    /// Announces that all following bytes are zlib-compressed. Requires
    /// the `ZPipe0` extension.
    ZOn, "ZOn"
}
