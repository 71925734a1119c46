//! The Lock/Key pseudo-cryptographic handshake.

use crate::error::Result;

use super::{MessageBody, TextDecoder, TextEncoder};

/// Magic byte used in the hub and client handshakes.
pub const DEFAULT_KEY_MAGIC: u8 = 5;

/// Prefix on a lock indicating that the `Supports` handshake can be used.
pub(crate) const EXT_LOCK_PREFIX: &str = "EXTENDEDPROTOCOL";

fn key_escape(b: u8) -> Option<&'static [u8]> {
    Some(match b {
        0 => b"/%DCN000%/",
        5 => b"/%DCN005%/",
        36 => b"/%DCN036%/",
        96 => b"/%DCN096%/",
        124 => b"/%DCN124%/",
        126 => b"/%DCN126%/",
        _ => return None,
    })
}

/// A challenge sent by the server to the client:
/// `$Lock EXTENDEDPROTOCOL<lock> Pk=<pk>Ref=<ref>|`.
///
/// Some dialects concatenate `Pk=` and `Ref=` without a separator; the
/// parser accepts both forms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lock {
    /// Suppresses the `EXTENDEDPROTOCOL` prefix.
    pub no_ext: bool,
    pub lock: String,
    pub pk: String,
    pub reference: String,
}

impl MessageBody for Lock {
    const TYPE: &'static str = "Lock";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        if !self.no_ext {
            buf.extend_from_slice(EXT_LOCK_PREFIX.as_bytes());
        }
        buf.extend_from_slice(self.lock.as_bytes());
        if !self.pk.is_empty() {
            buf.extend_from_slice(b" Pk=");
            buf.extend_from_slice(self.pk.as_bytes());
        }
        if !self.reference.is_empty() {
            if self.pk.is_empty() {
                buf.push(b' ');
            }
            buf.extend_from_slice(b"Ref=");
            buf.extend_from_slice(self.reference.as_bytes());
        }
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Lock> {
        let mut m = Lock {
            no_ext: true,
            ..Lock::default()
        };
        let mut data = data;
        if data.starts_with(EXT_LOCK_PREFIX.as_bytes()) {
            m.no_ext = false;
            data = &data[EXT_LOCK_PREFIX.len()..];
        }
        let i = match data.iter().position(|&b| b == b' ') {
            Some(i) => i,
            None => {
                m.lock = String::from_utf8_lossy(data).into_owned();
                return Ok(m);
            }
        };
        m.lock = String::from_utf8_lossy(&data[..i]).into_owned();

        let mut data = &data[i + 1..];
        if data.starts_with(b"Pk=") {
            data = &data[3..];
        }
        match data.windows(4).position(|w| w == b"Ref=") {
            Some(i) => {
                m.pk = String::from_utf8_lossy(&data[..i]).into_owned();
                m.reference = String::from_utf8_lossy(&data[i + 4..]).into_owned();
            }
            None => {
                m.pk = String::from_utf8_lossy(data).into_owned();
            }
        }
        Ok(m)
    }
}

impl Lock {
    /// The lock string used for key calculation. The full form includes
    /// the `Pk=`/`Ref=` suffixes.
    pub fn lock_string(&self, full: bool) -> Vec<u8> {
        if !full {
            let mut out = Vec::new();
            if !self.no_ext {
                out.extend_from_slice(EXT_LOCK_PREFIX.as_bytes());
            }
            out.extend_from_slice(self.lock.as_bytes());
            return out;
        }
        let mut out = Vec::new();
        self.marshal(None, &mut out).expect("lock marshal is infallible");
        out
    }

    /// Calculates the response to the challenge.
    pub fn key(&self) -> Key {
        self.custom_key(DEFAULT_KEY_MAGIC, false)
    }

    /// Calculates the response with a custom magic byte, optionally over
    /// the full lock string.
    ///
    /// Every byte is XORed with its predecessor (the first with the last
    /// two and the magic), nibbles are swapped, and bytes the protocol
    /// cannot carry are replaced with their `/%DCN…%/` token.
    pub fn custom_key(&self, magic: u8, full: bool) -> Key {
        let lock = self.lock_string(full);
        if lock.is_empty() {
            return Key::default();
        }
        let n = lock.len();
        let mut key = vec![0u8; n];
        key[0] = lock[0] ^ lock[n - 1] ^ lock[n.saturating_sub(2)] ^ magic;
        for i in 1..n {
            key[i] = lock[i] ^ lock[i - 1];
        }
        let mut out = Vec::with_capacity(n);
        for b in key {
            let swapped = (b << 4) | (b >> 4);
            match key_escape(swapped) {
                Some(tok) => out.extend_from_slice(tok),
                None => out.push(swapped),
            }
        }
        Key { key: out }
    }
}

/// The response to a [`Lock`] challenge. The key is kept as raw bytes:
/// the transformation routinely produces output that is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Key {
    pub key: Vec<u8>,
}

impl MessageBody for Key {
    const TYPE: &'static str = "Key";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(&self.key);
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Key> {
        Ok(Key { key: data.to_vec() })
    }
}
