//! The ADC field-marshaling engine.
//!
//! ADC payloads are space-separated fields, either positional or
//! two-byte-tagged. Message types declare their layout through the
//! [`adc_msg!`] macro, which generates the field walk at compile time:
//! every field names its wire position or tag, whether it is always
//! emitted (`req`), and whether it repeats. Decoding scans the token
//! list; encoding emits fields in declared order, skipping tagged fields
//! that hold their default value.

use std::borrow::Cow;

use crate::error::{DcError, Result};
use crate::tiger::Hash;

/// Escapes an ADC string value: `\` → `\\`, space → `\s`, LF → `\n`.
pub fn escape(s: &str) -> String {
    let mut buf = Vec::with_capacity(s.len());
    escape_into(s, &mut buf);
    String::from_utf8(buf).expect("escaping preserves utf-8")
}

pub(crate) fn escape_into(s: &str, buf: &mut Vec<u8>) {
    for &b in s.as_bytes() {
        match b {
            b'\\' => buf.extend_from_slice(b"\\\\"),
            b' ' => buf.extend_from_slice(b"\\s"),
            b'\n' => buf.extend_from_slice(b"\\n"),
            _ => buf.push(b),
        }
    }
}

/// Reverses [`escape`]. Unknown escape sequences keep the backslash.
pub fn unescape(data: &[u8]) -> String {
    if !data.contains(&b'\\') {
        return String::from_utf8_lossy(data).into_owned();
    }
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\\' && i + 1 < data.len() {
            match data[i + 1] {
                b's' => out.push(b' '),
                b'n' => out.push(b'\n'),
                b'\\' => out.push(b'\\'),
                other => {
                    out.push(b'\\');
                    out.push(other);
                }
            }
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn unescape_cow(data: &[u8]) -> Cow<'_, str> {
    if !data.contains(&b'\\') {
        return String::from_utf8_lossy(data);
    }
    Cow::Owned(unescape(data))
}

/// A value that can appear as an ADC payload field.
pub trait FieldValue: Sized + Default {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()>;
    fn decode_field(data: &[u8]) -> Result<Self>;
    /// Tagged fields holding their default are omitted unless marked
    /// `req`.
    fn is_default_field(&self) -> bool;
}

impl FieldValue for String {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        escape_into(self, buf);
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<String> {
        Ok(unescape_cow(data).into_owned())
    }

    fn is_default_field(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! int_field_value {
    ($($ty:ty),+) => {
        $(
            impl FieldValue for $ty {
                fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
                    buf.extend_from_slice(self.to_string().as_bytes());
                    Ok(())
                }

                fn decode_field(data: &[u8]) -> Result<$ty> {
                    decode_int(data).map(|v| v as $ty)
                }

                fn is_default_field(&self) -> bool {
                    *self == 0
                }
            }
        )+
    };
}

int_field_value!(i16, i32, i64, u16, u32, u64);

/// Decodes a decimal integer; the empty string is zero, and a float with
/// a zero fraction (`"12.0"`) is accepted for broken clients.
fn decode_int(data: &[u8]) -> Result<i64> {
    if data.is_empty() {
        return Ok(0);
    }
    let s = std::str::from_utf8(data)
        .map_err(|_| DcError::protocol("invalid integer encoding"))?;
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    let f: f64 = s
        .parse()
        .map_err(|_| DcError::protocol(format!("invalid integer: {:?}", s)))?;
    if f.round() != f {
        return Err(DcError::protocol(format!("invalid integer: {:?}", s)));
    }
    Ok(f as i64)
}

impl FieldValue for bool {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(if *self { b'1' } else { b'0' });
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<bool> {
        match data {
            b"" | b"0" => Ok(false),
            b"1" => Ok(true),
            _ => Err(DcError::protocol(format!(
                "invalid bool value: {:?}",
                String::from_utf8_lossy(data)
            ))),
        }
    }

    fn is_default_field(&self) -> bool {
        !*self
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Some(v) => v.encode_field(buf),
            None => Ok(()),
        }
    }

    fn decode_field(data: &[u8]) -> Result<Option<T>> {
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(T::decode_field(data)?))
    }

    fn is_default_field(&self) -> bool {
        self.is_none()
    }
}

impl FieldValue for Hash {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        let start = buf.len();
        buf.resize(start + Hash::BASE32_LEN, 0);
        self.encode_base32_into(&mut buf[start..]);
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<Hash> {
        Hash::from_base32(data)
    }

    fn is_default_field(&self) -> bool {
        self.is_zero()
    }
}

/// Splits a payload into space-separated tokens. An empty payload has no
/// tokens.
pub(crate) fn tokens(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    data.split(|&b| b == b' ').collect()
}

/// Decoding state walking the token list of one payload.
pub(crate) struct FieldReader<'a> {
    toks: Vec<&'a [u8]>,
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> FieldReader<'a> {
        FieldReader {
            toks: tokens(data),
            pos: 0,
        }
    }

    /// Takes the next positional field; exhausted input decodes as the
    /// zero value, so trailing empty positionals may be omitted.
    pub fn positional<T: FieldValue>(&mut self, field: &'static str) -> Result<T> {
        let tok = self.toks.get(self.pos).copied().unwrap_or(b"");
        self.pos += 1;
        T::decode_field(tok).map_err(|e| DcError::field(field, e))
    }

    /// Finds a single tagged field; a missing tag yields the default.
    pub fn tagged<T: FieldValue>(&mut self, field: &'static str, tag: &str) -> Result<T> {
        let mut found: Option<&[u8]> = None;
        for tok in &self.toks[self.pos.min(self.toks.len())..] {
            if let Some(v) = tok.strip_prefix(tag.as_bytes()) {
                if found.is_some() {
                    return Err(DcError::field(field, "expected single value"));
                }
                found = Some(v);
            }
        }
        match found {
            Some(v) => T::decode_field(v).map_err(|e| DcError::field(field, e)),
            None => Ok(T::default()),
        }
    }

    /// Collects a repeatable tagged field in wire order.
    pub fn repeated<T: FieldValue>(&mut self, field: &'static str, tag: &str) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for tok in &self.toks[self.pos.min(self.toks.len())..] {
            if let Some(v) = tok.strip_prefix(tag.as_bytes()) {
                out.push(T::decode_field(v).map_err(|e| DcError::field(field, e))?);
            }
        }
        Ok(out)
    }
}

/// Encoding state emitting space separation between fields.
pub(crate) struct FieldWriter<'a> {
    buf: &'a mut Vec<u8>,
    first: bool,
}

impl<'a> FieldWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> FieldWriter<'a> {
        FieldWriter { buf, first: true }
    }

    fn sep(&mut self) {
        if !self.first {
            self.buf.push(b' ');
        }
        self.first = false;
    }

    pub fn positional<T: FieldValue>(&mut self, v: &T) -> Result<()> {
        self.sep();
        v.encode_field(self.buf)
    }

    pub fn tagged<T: FieldValue>(&mut self, tag: &str, v: &T, req: bool) -> Result<()> {
        if !req && v.is_default_field() {
            return Ok(());
        }
        self.sep();
        self.buf.extend_from_slice(tag.as_bytes());
        v.encode_field(self.buf)
    }

    pub fn repeated<T: FieldValue>(&mut self, tag: &str, vs: &[T]) -> Result<()> {
        for v in vs {
            self.sep();
            self.buf.extend_from_slice(tag.as_bytes());
            v.encode_field(self.buf)?;
        }
        Ok(())
    }
}

/// Declares an ADC message: its three-byte command and the field schema.
///
/// Field specs:
/// - `pos` — positional, always emitted in declared order;
/// - `tag "XX"` — tagged, omitted when the value is the default;
/// - `req "XX"` — tagged, always emitted;
/// - `repeat "XX"` — repeatable tagged field over a `Vec`.
macro_rules! adc_msg {
    (
        $(#[$meta:meta])*
        pub struct $name:ident : $cmd:literal {
            $(
                $(#[$fmeta:meta])*
                pub $field:ident : $ty:ty => $kind:ident $($tag:literal)?,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl $crate::adc::MessageBody for $name {
            const CMD: $crate::adc::MsgType = $crate::adc::MsgType(*$cmd);

            fn marshal_adc(&self, buf: &mut Vec<u8>) -> $crate::error::Result<()> {
                let mut w = $crate::adc::marshal::FieldWriter::new(buf);
                $( adc_msg!(@encode w, self.$field, $kind $($tag)?); )*
                let _ = &mut w;
                Ok(())
            }

            fn unmarshal_adc(data: &[u8]) -> $crate::error::Result<Self> {
                let mut r = $crate::adc::marshal::FieldReader::new(data);
                $( let $field = adc_msg!(@decode r, $field, $kind $($tag)?); )*
                let _ = &mut r;
                Ok($name { $( $field, )* })
            }
        }
    };

    (@encode $w:ident, $v:expr, pos) => {
        $w.positional(&$v)?;
    };
    (@encode $w:ident, $v:expr, tag $tag:literal) => {
        $w.tagged($tag, &$v, false)?;
    };
    (@encode $w:ident, $v:expr, req $tag:literal) => {
        $w.tagged($tag, &$v, true)?;
    };
    (@encode $w:ident, $v:expr, repeat $tag:literal) => {
        $w.repeated($tag, &$v)?;
    };

    (@decode $r:ident, $field:ident, pos) => {
        $r.positional(stringify!($field))?
    };
    (@decode $r:ident, $field:ident, tag $tag:literal) => {
        $r.tagged(stringify!($field), $tag)?
    };
    (@decode $r:ident, $field:ident, req $tag:literal) => {
        $r.tagged(stringify!($field), $tag)?
    };
    (@decode $r:ident, $field:ident, repeat $tag:literal) => {
        $r.repeated(stringify!($field), $tag)?
    };
}

/// Implements [`FieldValue`] for an integer newtype (flag or enum-like
/// wire values).
macro_rules! int_wrapper_field {
    ($($ty:ty),+) => {
        $(
            impl $crate::adc::marshal::FieldValue for $ty {
                fn encode_field(&self, buf: &mut Vec<u8>) -> $crate::error::Result<()> {
                    self.0.encode_field(buf)
                }

                fn decode_field(data: &[u8]) -> $crate::error::Result<Self> {
                    Ok(Self($crate::adc::marshal::FieldValue::decode_field(data)?))
                }

                fn is_default_field(&self) -> bool {
                    self.0 == 0
                }
            }
        )+
    };
}

pub(crate) use {adc_msg, int_wrapper_field};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_roundtrip() {
        assert_eq!(escape("some text\\with\nall"), "some\\stext\\\\with\\nall");
        assert_eq!(unescape(b"some\\stext\\\\with\\nall"), "some text\\with\nall");
    }

    #[test]
    fn test_unknown_escape_is_kept() {
        assert_eq!(unescape(b"a\\qb"), "a\\qb");
    }

    #[test]
    fn test_decode_int_variants() {
        assert_eq!(decode_int(b"").unwrap(), 0);
        assert_eq!(decode_int(b"123").unwrap(), 123);
        assert_eq!(decode_int(b"-5").unwrap(), -5);
        assert_eq!(decode_int(b"12.0").unwrap(), 12);
        assert!(decode_int(b"12.5").is_err());
        assert!(decode_int(b"abc").is_err());
    }

    #[test]
    fn test_bool_decoding() {
        assert!(bool::decode_field(b"1").unwrap());
        assert!(!bool::decode_field(b"0").unwrap());
        assert!(!bool::decode_field(b"").unwrap());
        assert!(bool::decode_field(b"2").is_err());
    }

    #[test]
    fn test_tagged_single_value() {
        let mut r = FieldReader::new(b"NIname SS123");
        let name: String = r.tagged("name", "NI").unwrap();
        assert_eq!(name, "name");
        let missing: i64 = r.tagged("missing", "XX").unwrap();
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_tagged_duplicate_is_error() {
        let mut r = FieldReader::new(b"NIa NIb");
        assert!(r.tagged::<String>("name", "NI").is_err());
    }

    #[test]
    fn test_repeated() {
        let mut r = FieldReader::new(b"ANfoo TOtok ANbar");
        let and: Vec<String> = r.repeated("and", "AN").unwrap();
        assert_eq!(and, vec!["foo", "bar"]);
    }

    #[test]
    fn test_positional_after_end() {
        let mut r = FieldReader::new(b"one");
        let a: String = r.positional("a").unwrap();
        let b: String = r.positional("b").unwrap();
        assert_eq!(a, "one");
        assert_eq!(b, "");
    }
}
