//! Value-level encoding rules for NMDC: escape tables, names, strings
//! and the pluggable text transcoders.
//!
//! NMDC predates UTF-8 hubs; values arrive in the connection encoding,
//! escaped with HTML-style entities plus a legacy `/%DCN…%/` token scheme
//! for bytes the protocol cannot carry. Escaping operates on the encoded
//! byte form, transcoding to UTF-8 happens afterwards.

use std::borrow::Cow;

use crate::error::{DcError, Result};

/// Maximum user-name length in bytes.
pub const MAX_NAME: usize = 256;

/// Bytes that may never appear in a user name.
pub const INVALID_NAME_CHARS: &[u8] = b"$\x00\r\n\t";

/// Decodes bytes in the connection encoding into UTF-8 text.
///
/// The actual encoding tables are a collaborator concern; implementations
/// wrap whatever transcoding library the application uses.
pub trait TextDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<String>;
}

/// Encodes UTF-8 text into the connection encoding.
pub trait TextEncoder: Send + Sync {
    fn encode(&self, s: &str) -> Result<Vec<u8>>;
}

/// Decoder of last resort: replaces invalid sequences instead of failing.
pub(crate) struct LossyUtf8;

impl TextDecoder for LossyUtf8 {
    fn decode(&self, data: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

const LEGACY_TOKENS: [(&[u8], u8); 6] = [
    (b"/%DCN000%/", 0x00),
    (b"/%DCN005%/", 0x05),
    (b"/%DCN036%/", b'$'),
    (b"/%DCN096%/", b'`'),
    (b"/%DCN124%/", b'|'),
    (b"/%DCN126%/", b'~'),
];

fn escape_seq(b: u8) -> Option<&'static str> {
    match b {
        b'&' => Some("&amp;"),
        b'$' => Some("&#36;"),
        b'|' => Some("&#124;"),
        _ => None,
    }
}

fn escape_name_seq(b: u8) -> Option<&'static str> {
    match b {
        b'&' => Some("&amp;"),
        b'<' => Some("&lt;"),
        b'>' => Some("&gt;"),
        b'$' => Some("&#36;"),
        b'|' => Some("&#124;"),
        _ => None,
    }
}

/// Escapes a string value.
pub fn escape(s: &str) -> String {
    let mut buf = Vec::with_capacity(s.len());
    escape_into(s.as_bytes(), escape_seq, &mut buf);
    // escape sequences are pure ASCII, the rest is copied verbatim
    String::from_utf8(buf).expect("escaping preserves utf-8")
}

/// Escapes a string value according to name escaping rules.
pub fn escape_name(s: &str) -> String {
    let mut buf = Vec::with_capacity(s.len());
    escape_into(s.as_bytes(), escape_name_seq, &mut buf);
    String::from_utf8(buf).expect("escaping preserves utf-8")
}

fn escape_into(s: &[u8], table: fn(u8) -> Option<&'static str>, buf: &mut Vec<u8>) {
    let mut last = 0;
    for (i, &b) in s.iter().enumerate() {
        if let Some(seq) = table(b) {
            buf.extend_from_slice(&s[last..i]);
            buf.extend_from_slice(seq.as_bytes());
            last = i + 1;
        }
    }
    buf.extend_from_slice(&s[last..]);
}

fn contains_subslice(hay: &[u8], needle: &[u8]) -> bool {
    hay.windows(needle.len()).any(|w| w == needle)
}

/// Unescapes a byte string, borrowing when no escape sequence is present.
pub fn unescape_bytes(b: &[u8]) -> Cow<'_, [u8]> {
    let html = b.contains(&b'&');
    let legacy = contains_subslice(b, b"/%DCN");
    if !html && !legacy {
        return Cow::Borrowed(b);
    }
    let mut out = b.to_vec();
    if legacy {
        out = unescape_legacy(&out);
    }
    if html {
        out = unescape_html(&out);
    }
    Cow::Owned(out)
}

/// Unescapes a string value.
pub fn unescape(s: &str) -> String {
    String::from_utf8_lossy(&unescape_bytes(s.as_bytes())).into_owned()
}

fn unescape_legacy(b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    'outer: while i < b.len() {
        if b[i] == b'/' {
            for (tok, val) in LEGACY_TOKENS {
                if b[i..].starts_with(tok) {
                    out.push(val);
                    i += tok.len();
                    continue 'outer;
                }
            }
        }
        out.push(b[i]);
        i += 1;
    }
    out
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut tmp = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}

/// Decodes named and numeric HTML entities. Unknown entities are copied
/// verbatim.
fn unescape_html(b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] != b'&' {
            out.push(b[i]);
            i += 1;
            continue;
        }
        let rest = &b[i + 1..];
        let end = match rest.iter().position(|&c| c == b';') {
            Some(e) if e > 0 && e <= 8 => e,
            _ => {
                out.push(b'&');
                i += 1;
                continue;
            }
        };
        let entity = &rest[..end];
        let decoded: Option<char> = match entity {
            b"amp" => Some('&'),
            b"lt" => Some('<'),
            b"gt" => Some('>'),
            b"quot" => Some('"'),
            b"apos" => Some('\''),
            _ if entity.starts_with(b"#") => parse_numeric_entity(&entity[1..]),
            _ => None,
        };
        match decoded {
            Some(c) => {
                push_char(&mut out, c);
                i += 1 + end + 1;
            }
            None => {
                out.push(b'&');
                i += 1;
            }
        }
    }
    out
}

fn parse_numeric_entity(digits: &[u8]) -> Option<char> {
    let (digits, radix) = match digits.first() {
        Some(b'x') | Some(b'X') => (&digits[1..], 16),
        _ => (digits, 10),
    };
    if digits.is_empty() {
        return None;
    }
    let s = std::str::from_utf8(digits).ok()?;
    let v = u32::from_str_radix(s, radix).ok()?;
    char::from_u32(v)
}

/// Marshals a string value: transcode to the connection encoding, then
/// escape.
pub(crate) fn marshal_string(
    enc: Option<&dyn TextEncoder>,
    s: &str,
    buf: &mut Vec<u8>,
) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(DcError::protocol("invalid characters in text"));
    }
    match enc {
        Some(e) => escape_into(&e.encode(s)?, escape_seq, buf),
        None => escape_into(s.as_bytes(), escape_seq, buf),
    }
    Ok(())
}

/// Unmarshals a string value: unescape, then transcode to UTF-8.
pub(crate) fn unmarshal_string(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<String> {
    if data.contains(&0) {
        return Err(DcError::protocol("invalid characters in text"));
    }
    let raw = unescape_bytes(data);
    match dec {
        Some(d) => d.decode(&raw),
        None => std::str::from_utf8(&raw)
            .map(str::to_string)
            .map_err(|_| DcError::UnknownEncoding(raw.into_owned())),
    }
}

/// Marshals a user name; stricter than a plain string value.
pub(crate) fn marshal_name(
    enc: Option<&dyn TextEncoder>,
    s: &str,
    buf: &mut Vec<u8>,
) -> Result<()> {
    if s.len() > MAX_NAME {
        return Err(DcError::Limit("name"));
    }
    if s.bytes().any(|b| INVALID_NAME_CHARS.contains(&b)) {
        return Err(DcError::protocol(format!(
            "invalid characters in name: {:?}",
            s
        )));
    }
    match enc {
        Some(e) => escape_into(&e.encode(s)?, escape_name_seq, buf),
        None => escape_into(s.as_bytes(), escape_name_seq, buf),
    }
    Ok(())
}

/// Unmarshals a user name. Validation runs on the escaped wire form, so
/// escaped occurrences of forbidden bytes are accepted.
pub(crate) fn unmarshal_name(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<String> {
    if data.len() > MAX_NAME {
        return Err(DcError::Limit("name"));
    }
    if data.iter().any(|b| INVALID_NAME_CHARS.contains(b)) {
        return Err(DcError::protocol(format!(
            "invalid characters in name: {:?}",
            String::from_utf8_lossy(data)
        )));
    }
    let raw = unescape_bytes(data);
    match dec {
        Some(d) => d.decode(&raw),
        None => std::str::from_utf8(&raw)
            .map(str::to_string)
            .map_err(|_| DcError::UnknownEncoding(raw.into_owned())),
    }
}

/// Trims leading and trailing ASCII spaces.
pub(crate) fn trim_space(mut s: &[u8]) -> &[u8] {
    while let [b' ', rest @ ..] = s {
        s = rest;
    }
    while let [rest @ .., b' '] = s {
        s = rest;
    }
    s
}

/// Parses a signed decimal integer, tolerating surrounding spaces.
pub(crate) fn atoi_trim(s: &[u8]) -> Option<i64> {
    let s = trim_space(s);
    if s.is_empty() {
        return None;
    }
    let (neg, digits) = match s[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() {
        return None;
    }
    let mut n: i64 = 0;
    for &c in digits {
        if !c.is_ascii_digit() {
            return None;
        }
        n = n.checked_mul(10)?.checked_add((c - b'0') as i64)?;
    }
    Some(if neg { -n } else { n })
}

/// Parses an unsigned decimal integer, tolerating surrounding spaces.
pub(crate) fn parse_u64_trim(s: &[u8]) -> Option<u64> {
    let s = trim_space(s);
    if s.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &c in s {
        if !c.is_ascii_digit() {
            return None;
        }
        n = n.checked_mul(10)?.checked_add((c - b'0') as u64)?;
    }
    Some(n)
}

/// Splits `p` on `sep` requiring exactly `n` fields; positional NMDC
/// messages validate their field counts with this.
pub(crate) fn split_n(p: &[u8], sep: u8, n: usize) -> Option<Vec<&[u8]>> {
    let count = p.iter().filter(|&&b| b == sep).count();
    if count != n - 1 {
        return None;
    }
    Some(p.split(|&b| b == sep).collect())
}

/// Splits `p` on `sep` into at most `n` fields; the final field keeps any
/// remaining separators.
pub(crate) fn splitn(p: &[u8], sep: u8, n: usize) -> Vec<&[u8]> {
    let mut out = Vec::with_capacity(n);
    let mut rest = p;
    while out.len() + 1 < n {
        match rest.iter().position(|&b| b == sep) {
            Some(i) => {
                out.push(&rest[..i]);
                rest = &rest[i + 1..];
            }
            None => break,
        }
    }
    out.push(rest);
    out
}

/// Command names are restricted to `[0-9A-Za-z./_:-]`.
pub(crate) fn is_cmd_name(p: &[u8]) -> bool {
    p.iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b'-' | b'_' | b'.' | b':'))
}
