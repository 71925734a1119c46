//! Operator actions, password handshake and error notifications.

use crate::error::{DcError, Result};

use super::hub::{name_message, no_args_message, string_message};
use super::types::{marshal_name, marshal_string, unmarshal_name, unmarshal_string};
use super::{MessageBody, TextDecoder, TextEncoder};

/// Redirects the user to another hub address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForceMove {
    pub address: String,
}

impl MessageBody for ForceMove {
    const TYPE: &'static str = "ForceMove";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.address.as_bytes());
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<ForceMove> {
        Ok(ForceMove {
            address: String::from_utf8_lossy(data).into_owned(),
        })
    }
}

name_message! {
    /// Kicks a user from the hub.
    Kick, "Kick"
}

name_message! {
    /// Drops a user's connection.
    Close, "Close"
}

no_args_message! {
    /// Requests the current hub topic.
    GetTopic, "GetTopic"
}

string_message! {
    /// Sets the hub topic.
    SetTopic(text), "SetTopic"
}

string_message! {
    /// The user's password, answering `$GetPass`.
    MyPass(pass), "MyPass"
}

no_args_message! {
    /// Rejects the supplied password.
    BadPass, "BadPass"
}

no_args_message! {
    /// Asks a registered user for a password.
    GetPass, "GetPass"
}

macro_rules! text_error_message {
    ($(#[$meta:meta])* $name:ident, $typ:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            pub text: String,
        }

        impl MessageBody for $name {
            const TYPE: &'static str = $typ;

            fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
                if self.text.is_empty() {
                    return Ok(());
                }
                marshal_string(enc, &self.text, buf)
            }

            fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<$name> {
                Ok($name {
                    text: unmarshal_string(dec, data)?,
                })
            }
        }
    };
}

text_error_message! {
    /// A recoverable operation failure.
    Failed, "Failed"
}

text_error_message! {
    /// A fatal error notification.
    ErrorMessage, "Error"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_roundtrip() {
        let m = ErrorMessage::unmarshal(None, b"message").unwrap();
        assert_eq!(m.text, "message");
        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(buf, b"message");
    }

    #[test]
    fn test_force_move() {
        let m = ForceMove::unmarshal(None, b"dc.example.org:411").unwrap();
        assert_eq!(m.address, "dc.example.org:411");
    }
}
