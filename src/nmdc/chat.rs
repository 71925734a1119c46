//! Chat-related messages: main chat, private messages and user commands.

use crate::error::{DcError, Result};

use super::types::{
    atoi_trim, marshal_name, marshal_string, trim_space, unmarshal_name, unmarshal_string,
    MAX_NAME,
};
use super::{MessageBody, TextDecoder, TextEncoder};

/// A main-chat message: `<name> text|`, or `text|` when anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatMessage {
    pub name: String,
    pub text: String,
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.text)
        } else {
            write!(f, "<{}> {}", self.name, self.text)
        }
    }
}

/// Decodes the next rune, substituting U+FFFD for invalid sequences.
fn decode_rune(b: &[u8]) -> (char, usize) {
    match std::str::from_utf8(&b[..b.len().min(4)]) {
        Ok(s) => {
            let c = s.chars().next().unwrap_or('\u{FFFD}');
            (c, c.len_utf8())
        }
        Err(e) if e.valid_up_to() > 0 => {
            let c = std::str::from_utf8(&b[..e.valid_up_to()])
                .expect("validated prefix")
                .chars()
                .next()
                .expect("non-empty prefix");
            (c, c.len_utf8())
        }
        Err(_) => ('\u{FFFD}', 1),
    }
}

/// Locates the end of the name in `<name> text` input.
///
/// Malformed clients emit names containing `>` and skip the separating
/// space, so the parser scans for a `>` followed by whitespace and falls
/// back to the last `>` not followed by whitespace. This reproduces the
/// tolerance heuristic of existing hub software.
fn find_name_end(data: &[u8]) -> Result<(usize, usize)> {
    let mut base = 0;
    while base < data.len() {
        let j = data[base..]
            .iter()
            .position(|&b| matches!(b, b'>' | b'\r' | b'\n'));
        let j = match j {
            Some(j) if data[base + j] == b'>' => j,
            _ => {
                // no '>' followed by a space, or a line break comes
                // first; use the last '>' not followed by a space
                if base == 0 {
                    return Err(DcError::protocol(
                        "name in chat message should have a closing token",
                    ));
                }
                return Ok((base - 1, 1));
            }
        };
        if base + j == data.len() - 1 {
            return Ok((j, 1));
        }
        let (c, sz) = decode_rune(&data[base + j + 1..]);
        if c.is_whitespace() {
            return Ok((base + j, sz + 1));
        }
        base += j + 1;
    }
    Ok((0, 0))
}

impl MessageBody for ChatMessage {
    const TYPE: &'static str = "";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        if !self.name.is_empty() {
            buf.push(b'<');
            marshal_name(enc, &self.name, buf)?;
            buf.extend_from_slice(b"> ");
        }
        marshal_string(enc, &self.text, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<ChatMessage> {
        let mut m = ChatMessage::default();
        let mut data = data;
        if data.first() == Some(&b'<') {
            data = &data[1..];
            let (i, off) = find_name_end(data)?;
            let name = &data[..i];
            if name.len() > MAX_NAME {
                return Err(DcError::protocol("name in chat message is too long"));
            }
            m.name = unmarshal_name(dec, name)?;
            data = &data[(i + off).min(data.len())..];
        }
        m.text = unmarshal_string(dec, data)?;
        Ok(m)
    }
}

/// A private message: `$To: to From: from $<name> text|`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrivateMessage {
    pub to: String,
    pub from: String,
    pub name: String,
    pub text: String,
}

impl MessageBody for PrivateMessage {
    const TYPE: &'static str = "To:";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_name(enc, &self.to, buf)?;
        buf.extend_from_slice(b" From: ");
        marshal_name(enc, &self.from, buf)?;
        buf.extend_from_slice(b" $<");
        marshal_name(enc, &self.name, buf)?;
        buf.extend_from_slice(b"> ");
        marshal_string(enc, &self.text, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<PrivateMessage> {
        const FROM_TOKEN: &[u8] = b" From: ";
        const NAME_TOKEN: &[u8] = b" $<";

        let mut m = PrivateMessage::default();
        let i = find(data, FROM_TOKEN)
            .ok_or_else(|| DcError::protocol("invalid To message: no 'from' delimiter"))?;
        m.to = unmarshal_name(dec, &data[..i])?;
        let data = &data[i + FROM_TOKEN.len()..];

        let i = find(data, NAME_TOKEN)
            .ok_or_else(|| DcError::protocol("invalid To message: no name delimiter"))?;
        m.from = unmarshal_name(dec, &data[..i])?;
        let data = &data[i + NAME_TOKEN.len()..];

        let i = find(data, b"> ")
            .ok_or_else(|| DcError::protocol("invalid To message: no name end delimiter"))?;
        m.name = unmarshal_name(dec, &data[..i])?;
        m.text = unmarshal_string(dec, &data[i + 2..])?;
        Ok(m)
    }
}

/// A private message routed to the main chat of the target. Requires the
/// `MCTo` extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct McTo {
    pub to: String,
    pub from: String,
    pub text: String,
}

impl MessageBody for McTo {
    const TYPE: &'static str = "MCTo";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        marshal_name(enc, &self.to, buf)?;
        buf.extend_from_slice(b" $");
        marshal_name(enc, &self.from, buf)?;
        buf.push(b' ');
        marshal_string(enc, &self.text, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<McTo> {
        let mut m = McTo::default();
        let i = find(data, b" $")
            .ok_or_else(|| DcError::protocol("invalid MCTo: no name delimiter"))?;
        m.to = unmarshal_name(dec, &data[..i])?;
        let data = &data[i + 2..];

        let i = data
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| DcError::protocol("invalid MCTo: no message delimiter"))?;
        m.from = unmarshal_name(dec, &data[..i])?;
        m.text = unmarshal_string(dec, &data[i + 1..])?;
        Ok(m)
    }
}

/// User-command presentation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UCmdType(pub u8);

impl UCmdType {
    pub const SEPARATOR: UCmdType = UCmdType(0);
    pub const RAW: UCmdType = UCmdType(1);
    pub const RAW_NICK_LIMITED: UCmdType = UCmdType(2);
    pub const ERASE: UCmdType = UCmdType(255);
}

/// User-command context bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UCmdContext(pub u8);

impl UCmdContext {
    pub const HUB: UCmdContext = UCmdContext(1);
    pub const USER: UCmdContext = UCmdContext(2);
    pub const SEARCH: UCmdContext = UCmdContext(4);
    pub const FILE_LIST: UCmdContext = UCmdContext(8);
}

impl std::ops::BitOr for UCmdContext {
    type Output = UCmdContext;
    fn bitor(self, rhs: UCmdContext) -> UCmdContext {
        UCmdContext(self.0 | rhs.0)
    }
}

/// A hub-provided menu command. Requires the `UserCommand` extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserCommand {
    pub typ: UCmdType,
    pub context: UCmdContext,
    pub path: Vec<String>,
    pub command: String,
}

impl MessageBody for UserCommand {
    const TYPE: &'static str = "UserCommand";

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(self.typ.0.to_string().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.context.0.to_string().as_bytes());
        if !self.path.is_empty() {
            buf.push(b' ');
            for (i, p) in self.path.iter().enumerate() {
                if i != 0 {
                    buf.push(b'\\');
                }
                marshal_string(enc, p, buf)?;
            }
        }
        if self.command.is_empty() {
            return Ok(());
        }
        buf.extend_from_slice(b" $");
        marshal_string(enc, &self.command, buf)
    }

    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<UserCommand> {
        let mut m = UserCommand::default();
        let data = trim_space(data);
        let parts = super::types::splitn(data, b' ', 3);
        if parts.len() < 2 {
            return Err(DcError::protocol("invalid user command"));
        }

        let t = atoi_trim(parts[0])
            .ok_or_else(|| DcError::field("type", "invalid number in user command"))?;
        m.typ = UCmdType(t as u8);

        // tolerate trailing junk glued to the context number
        let mut ctx = parts[1];
        if let Some(i) = ctx.iter().position(|b| !b.is_ascii_digit()) {
            ctx = &ctx[..i];
        }
        let c = atoi_trim(ctx)
            .ok_or_else(|| DcError::field("context", "invalid number in user command"))?;
        m.context = UCmdContext(c as u8);
        if parts.len() == 2 {
            return Ok(m);
        }

        let val = parts[2];
        let i = val
            .iter()
            .position(|&b| b == b'$')
            .filter(|&i| i >= 1)
            .ok_or_else(|| DcError::protocol("invalid raw user command"))?;
        let mut path = &val[..i];
        while path.last() == Some(&b' ') {
            path = &path[..path.len() - 1];
        }
        for p in path.split(|&b| b == b'\\') {
            if p.is_empty() {
                continue;
            }
            m.path.push(
                unmarshal_string(dec, p)
                    .map_err(|_| DcError::protocol("invalid path in user command"))?,
            );
        }
        m.command = unmarshal_string(dec, &val[i + 1..])?;
        Ok(m)
    }
}

fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(data: &[u8]) -> ChatMessage {
        ChatMessage::unmarshal(None, data).unwrap()
    }

    #[test]
    fn test_chat_simple() {
        let m = chat(b"<bob> text");
        assert_eq!(m.name, "bob");
        assert_eq!(m.text, "text");
    }

    #[test]
    fn test_chat_no_space_after_name() {
        let m = chat(b"<bob>text msg");
        assert_eq!(m.name, "bob");
        assert_eq!(m.text, "text msg");
    }

    #[test]
    fn test_chat_name_with_separators() {
        let m = chat(b"<b >b >> text");
        assert_eq!(m.name, "b >b >");
        assert_eq!(m.text, "text");
    }

    #[test]
    fn test_chat_line_break_fallback() {
        let m = chat(b"<bob>some text\r\nthis is formatting>>> some more text");
        assert_eq!(m.name, "bob");
        assert_eq!(m.text, "some text\r\nthis is formatting>>> some more text");
    }

    #[test]
    fn test_chat_empty_name() {
        let m = chat(b"<> text");
        assert_eq!(m.name, "");
        assert_eq!(m.text, "text");
    }

    #[test]
    fn test_chat_trailing_name_only() {
        let m = chat(b"<bob>");
        assert_eq!(m.name, "bob");
        assert_eq!(m.text, "");
    }

    #[test]
    fn test_chat_missing_closing_token() {
        assert!(ChatMessage::unmarshal(None, b"<noclose").is_err());
    }

    #[test]
    fn test_chat_whitespace_separator_is_consumed() {
        let m = chat("<bob>\n   > trailing".as_bytes());
        assert_eq!(m.name, "bob");
        assert_eq!(m.text, "   > trailing");
    }

    #[test]
    fn test_private_message() {
        let m =
            PrivateMessage::unmarshal(None, b"user 1 From: room 1 $<user 2> private message")
                .unwrap();
        assert_eq!(m.to, "user 1");
        assert_eq!(m.from, "room 1");
        assert_eq!(m.name, "user 2");
        assert_eq!(m.text, "private message");

        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(buf, b"user 1 From: room 1 $<user 2> private message");
    }

    #[test]
    fn test_mcto() {
        let m = McTo::unmarshal(None, b"target $sender some message").unwrap();
        assert_eq!(m.to, "target");
        assert_eq!(m.from, "sender");
        assert_eq!(m.text, "some message");
    }

    #[test]
    fn test_user_command_raw() {
        let m = UserCommand::unmarshal(None, b"1 3 a\\b\\c$<%[mynick]> +cchist").unwrap();
        assert_eq!(m.typ, UCmdType::RAW);
        assert_eq!(m.context, UCmdContext::HUB | UCmdContext::USER);
        assert_eq!(m.path, vec!["a", "b", "c"]);
        assert_eq!(m.command, "<%[mynick]> +cchist");

        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(buf, b"1 3 a\\b\\c $<%[mynick]> +cchist");
    }

    #[test]
    fn test_user_command_erase() {
        let m = UserCommand::unmarshal(None, b"255 1 ").unwrap();
        assert_eq!(m.typ, UCmdType::ERASE);
        assert_eq!(m.context, UCmdContext::HUB);
        assert!(m.path.is_empty());
        assert!(m.command.is_empty());

        let mut buf = Vec::new();
        m.marshal(None, &mut buf).unwrap();
        assert_eq!(buf, b"255 1");
    }

    #[test]
    fn test_user_command_escaped_context() {
        let m = UserCommand::unmarshal(None, b"0 3&#124;").unwrap();
        assert_eq!(m.typ, UCmdType::SEPARATOR);
        assert_eq!(m.context, UCmdContext::HUB | UCmdContext::USER);
    }
}
