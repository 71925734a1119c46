//! Hub session messages: SID assignment, user commands, the password
//! handshake and disconnects.

use data_encoding::BASE32_NOPAD;

use crate::error::{DcError, Result};
use crate::tiger::Hash;

use super::marshal::{adc_msg, int_wrapper_field};
use super::types::{MsgType, Path, Sid};
use super::MessageBody;

/// Assigns a session ID to the connecting client. The payload is the
/// bare SID, byte for byte; no other message shares this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SidAssign {
    pub sid: Sid,
}

impl MessageBody for SidAssign {
    const CMD: MsgType = MsgType(*b"SID");

    fn marshal_adc(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.sid.0);
        Ok(())
    }

    fn unmarshal_adc(data: &[u8]) -> Result<SidAssign> {
        let b: [u8; 4] = data
            .try_into()
            .map_err(|_| DcError::protocol(format!("malformed SID [{}]", data.len())))?;
        Ok(SidAssign { sid: Sid(b) })
    }
}

/// User-command category bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Category(pub i32);

impl Category {
    pub const HUB: Category = Category(1);
    pub const USER: Category = Category(2);
    pub const SEARCH: Category = Category(4);
    pub const FILE_LIST: Category = Category(8);
}

impl std::ops::BitOr for Category {
    type Output = Category;
    fn bitor(self, rhs: Category) -> Category {
        Category(self.0 | rhs.0)
    }
}

int_wrapper_field!(Category);

adc_msg! {
    /// A hub-provided menu command (`UCMD` extension).
    pub struct UserCommand : b"CMD" {
        pub path: Path => pos,
        pub command: String => tag "TT",
        pub category: Category => tag "CT",
        pub remove: i32 => tag "RM",
        pub constrained: i32 => tag "CO",
        pub separator: i32 => tag "SP",
    }
}

/// A password challenge carrying random salt bytes, base32 without
/// padding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetPassword {
    pub salt: Vec<u8>,
}

impl MessageBody for GetPassword {
    const CMD: MsgType = MsgType(*b"GPA");

    fn marshal_adc(&self, buf: &mut Vec<u8>) -> Result<()> {
        let start = buf.len();
        buf.resize(start + BASE32_NOPAD.encode_len(self.salt.len()), 0);
        BASE32_NOPAD.encode_mut(&self.salt, &mut buf[start..]);
        Ok(())
    }

    fn unmarshal_adc(data: &[u8]) -> Result<GetPassword> {
        let salt = BASE32_NOPAD
            .decode(data)
            .map_err(|e| DcError::field("salt", format!("invalid base32: {}", e)))?;
        Ok(GetPassword { salt })
    }
}

adc_msg! {
    /// The tiger digest answering a password challenge.
    pub struct Password : b"PAS" {
        pub hash: Hash => pos,
    }
}

adc_msg! {
    /// A disconnect notice, optionally carrying a reason, a ban duration
    /// and a redirect address.
    pub struct Disconnect : b"QUI" {
        pub id: Sid => pos,
        pub message: String => tag "MS",
        pub by: Sid => tag "ID",
        pub duration: i32 => tag "TL",
        pub redirect: String => tag "RD",
    }
}
