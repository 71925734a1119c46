//! Tiger hash and the Tiger Tree Hash (TTH) file identifier.
//!
//! Both protocols identify file content by the root of a Tiger hash tree
//! built over 1024-byte blocks. This module provides the 24-byte
//! [`Hash`] value with its canonical unpadded-base32 text form, plus the
//! streaming tree computation in [`tth`]/[`tth_leaves`].

mod tth;

pub use tth::{tth, tth_leaves, tth_root, Leaves, TTH_BLOCK_SIZE};

use std::fmt;
use std::str::FromStr;

use data_encoding::{BASE32_NOPAD, HEXLOWER};
use digest::Digest;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DcError, Result};

/// A Tiger/192 hash value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; Hash::SIZE]);

impl Hash {
    /// Digest size in bytes (192 bits).
    pub const SIZE: usize = 24;

    /// Length of the canonical base32 form (no padding).
    pub const BASE32_LEN: usize = 39;

    /// Tiger compression block size in bytes.
    pub const BLOCK_SIZE: usize = 64;

    /// Calculates the tiger hash of a byte slice.
    pub fn digest(data: impl AsRef<[u8]>) -> Hash {
        let out = ::tiger::Tiger::digest(data.as_ref());
        let mut h = Hash([0u8; Hash::SIZE]);
        h.0.copy_from_slice(&out);
        h
    }

    /// Checks if the hash value is all zeros.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; Hash::SIZE]
    }

    /// Returns the raw digest bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Hash::SIZE] {
        &self.0
    }

    /// Returns the hexadecimal representation of the hash.
    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }

    /// Returns the canonical base32 representation of the hash.
    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(&self.0)
    }

    /// Encodes the base32 form into a caller buffer of exactly
    /// [`Hash::BASE32_LEN`] bytes.
    pub fn encode_base32_into(&self, buf: &mut [u8]) {
        BASE32_NOPAD.encode_mut(&self.0, buf);
    }

    /// Decodes a hash from its base32 byte form.
    pub fn from_base32(s: &[u8]) -> Result<Hash> {
        if s.len() != Hash::BASE32_LEN {
            return Err(DcError::protocol(format!(
                "wrong base32 hash length: {} vs {}",
                s.len(),
                Hash::BASE32_LEN,
            )));
        }
        let mut h = Hash([0u8; Hash::SIZE]);
        let n = BASE32_NOPAD
            .decode_mut(s, &mut h.0)
            .map_err(|e| DcError::protocol(format!("invalid base32 hash: {:?}", e.error)))?;
        if n != Hash::SIZE {
            return Err(DcError::protocol(format!(
                "wrong base32 decoded size: {} vs {}",
                n,
                Hash::SIZE,
            )));
        }
        Ok(h)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_base32())
    }
}

impl FromStr for Hash {
    type Err = DcError;

    fn from_str(s: &str) -> Result<Hash> {
        Hash::from_base32(s.as_bytes())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base32())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
