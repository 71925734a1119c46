//! NMDC protocol codec.
//!
//! The legacy Direct Connect protocol: `|`-delimited lines, `$`-prefixed
//! positional commands, HTML-style escaping and a hub-chosen text
//! encoding. This module maps wire lines to typed [`Message`] values and
//! back, with a process-wide registry of command names and a raw-message
//! fallback for unknown commands.

mod addr;
mod chat;
mod connect;
mod extensions;
mod files;
mod hub;
mod lock;
mod ops;
mod ping;
mod reader;
mod search;
mod types;
mod user;
mod user_list;
mod writer;

pub use addr::{normalize_addr, parse_addr, DEFAULT_PORT, SCHEME_NMDC, SCHEME_NMDCS};
pub use chat::{ChatMessage, McTo, PrivateMessage, UCmdContext, UCmdType, UserCommand};
pub use connect::{ConnectToMe, CtmKind, RevConnectToMe};
pub use extensions::{Extensions, Supports};
pub use files::{AdcGet, AdcSnd, Direction, MaxedOut};
pub use hub::{FailOver, Hello, HubName, HubTopic, LogedIn, Version, ZOn};
pub use lock::{Key, Lock, DEFAULT_KEY_MAGIC};
pub use ops::{
    BadPass, Close, ErrorMessage, Failed, ForceMove, GetPass, GetTopic, Kick, MyPass, SetTopic,
};
pub use ping::{BotInfo, HubInfo};
pub use reader::Reader;
pub use search::{DataType, Search, Sr, TthSearchActive, TthSearchPassive};
pub use types::{
    escape, escape_name, unescape, unescape_bytes, TextDecoder, TextEncoder, INVALID_NAME_CHARS,
    MAX_NAME,
};
pub use user::{GetInfo, MyInfo, MyNick, Quit, UserFlag, UserMode, ValidateDenide, ValidateNick};
pub use user_list::{BotList, GetNickList, Names, OpList, UserAddress, UserIpList};
pub use writer::Writer;

use std::collections::HashMap;
use std::sync::LazyLock;

use bytes::Bytes;

use crate::error::{DcError, Result};

/// NMDC line delimiter.
pub const LINE_DELIM: u8 = b'|';

/// Maximum command-name length accepted by default.
pub const MAX_CMD_NAME: usize = 32;

/// A single NMDC protocol message body.
///
/// `TYPE` is the command name without the `$` prefix; chat messages are a
/// special case with an empty name. Marshal and unmarshal deal only with
/// the payload, never the command name or the `|` delimiter.
pub trait MessageBody: Sized + Into<Message> {
    const TYPE: &'static str;

    fn marshal(&self, enc: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()>;
    fn unmarshal(dec: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Self>;
}

/// A raw NMDC message in the connection encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage {
    pub typ: String,
    pub data: Bytes,
}

impl RawMessage {
    pub fn new(typ: impl Into<String>, data: impl Into<Bytes>) -> RawMessage {
        RawMessage {
            typ: typ.into(),
            data: data.into(),
        }
    }

    /// Re-decodes the payload through the registry.
    pub fn decode(&self, dec: Option<&dyn TextDecoder>) -> Result<Message> {
        decode_command(dec, &self.typ, &self.data)
    }
}

type DecodeFn = fn(Option<&dyn TextDecoder>, &[u8]) -> Result<Message>;

macro_rules! nmdc_messages {
    ($( $variant:ident($ty:ty) ),+ $(,)?) => {
        /// A decoded NMDC protocol message.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            /// Main-chat message, the only line shape without a command
            /// name.
            Chat(ChatMessage),
            $( $variant($ty), )+
            /// A message with an unregistered command name, kept
            /// undecoded.
            Raw(RawMessage),
        }

        impl Message {
            /// The command name without the `$` prefix; empty for chat.
            pub fn type_name(&self) -> &str {
                match self {
                    Message::Chat(_) => "",
                    $( Message::$variant(_) => <$ty>::TYPE, )+
                    Message::Raw(m) => &m.typ,
                }
            }

            fn marshal_body(
                &self,
                enc: Option<&dyn TextEncoder>,
                buf: &mut Vec<u8>,
            ) -> Result<()> {
                match self {
                    Message::Chat(m) => m.marshal(enc, buf),
                    $( Message::$variant(m) => m.marshal(enc, buf), )+
                    Message::Raw(m) => {
                        buf.extend_from_slice(&m.data);
                        Ok(())
                    }
                }
            }
        }

        impl From<ChatMessage> for Message {
            fn from(m: ChatMessage) -> Message { Message::Chat(m) }
        }

        impl TryFrom<Message> for ChatMessage {
            type Error = Message;

            fn try_from(m: Message) -> std::result::Result<ChatMessage, Message> {
                match m {
                    Message::Chat(v) => Ok(v),
                    other => Err(other),
                }
            }
        }

        impl From<RawMessage> for Message {
            fn from(m: RawMessage) -> Message { Message::Raw(m) }
        }

        $(
            impl From<$ty> for Message {
                fn from(m: $ty) -> Message { Message::$variant(m) }
            }

            impl TryFrom<Message> for $ty {
                type Error = Message;

                fn try_from(m: Message) -> std::result::Result<$ty, Message> {
                    match m {
                        Message::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )+

        fn build_registry() -> HashMap<&'static str, DecodeFn> {
            let mut map: HashMap<&'static str, DecodeFn> = HashMap::new();
            $(
                let prev = map.insert(
                    <$ty>::TYPE,
                    |dec, data| Ok(Message::from(<$ty>::unmarshal(dec, data)?)),
                );
                assert!(
                    prev.is_none(),
                    "message type {:?} is already registered",
                    <$ty>::TYPE,
                );
            )+
            map
        }
    };
}

nmdc_messages! {
    PrivateMessage(PrivateMessage),
    McTo(McTo),
    UserCommand(UserCommand),
    Lock(Lock),
    Key(Key),
    Supports(Supports),
    ValidateNick(ValidateNick),
    ValidateDenide(ValidateDenide),
    MyNick(MyNick),
    Quit(Quit),
    MyInfo(MyInfo),
    GetInfo(GetInfo),
    Hello(Hello),
    LogedIn(LogedIn),
    Version(Version),
    HubName(HubName),
    HubTopic(HubTopic),
    FailOver(FailOver),
    ZOn(ZOn),
    MyPass(MyPass),
    BadPass(BadPass),
    GetPass(GetPass),
    GetNickList(GetNickList),
    OpList(OpList),
    BotList(BotList),
    UserIp(UserIpList),
    ConnectToMe(ConnectToMe),
    RevConnectToMe(RevConnectToMe),
    Search(Search),
    Sr(Sr),
    TthSearchActive(TthSearchActive),
    TthSearchPassive(TthSearchPassive),
    AdcGet(AdcGet),
    AdcSnd(AdcSnd),
    Direction(Direction),
    MaxedOut(MaxedOut),
    Failed(Failed),
    ErrorMessage(ErrorMessage),
    ForceMove(ForceMove),
    Kick(Kick),
    Close(Close),
    GetTopic(GetTopic),
    SetTopic(SetTopic),
    BotInfo(BotInfo),
    HubInfo(HubInfo),
}

/// The process-wide command registry, populated once and read-only
/// thereafter. A duplicate command name is a fatal init error.
static REGISTRY: LazyLock<HashMap<&'static str, DecodeFn>> = LazyLock::new(build_registry);

/// Checks if a command name is registered.
pub fn is_registered(typ: &str) -> bool {
    REGISTRY.contains_key(typ)
}

/// Lists all registered command names, sorted.
pub fn registered_types() -> Vec<&'static str> {
    let mut types: Vec<_> = REGISTRY.keys().copied().collect();
    types.sort_unstable();
    types
}

pub(crate) fn decode_command(
    dec: Option<&dyn TextDecoder>,
    typ: &str,
    data: &[u8],
) -> Result<Message> {
    match REGISTRY.get(typ) {
        Some(f) => f(dec, data),
        None => Ok(Message::Raw(RawMessage::new(
            typ,
            Bytes::copy_from_slice(data),
        ))),
    }
}

/// Encodes a message into a buffer: command name, payload and the `|`
/// delimiter. An empty payload collapses the separator space, producing
/// `$TYPE|` rather than `$TYPE |`.
pub fn marshal_to(
    enc: Option<&dyn TextEncoder>,
    buf: &mut Vec<u8>,
    msg: &Message,
) -> Result<()> {
    let typ = msg.type_name();
    if !typ.is_empty() {
        buf.reserve(typ.len() + 3);
        buf.push(b'$');
        buf.extend_from_slice(typ.as_bytes());
        buf.push(b' ');
    }
    let n = buf.len();
    msg.marshal_body(enc, buf)?;
    if n == buf.len() && !typ.is_empty() {
        buf[n - 1] = LINE_DELIM; // ' ' -> '|'
        return Ok(());
    }
    buf.push(LINE_DELIM);
    Ok(())
}

/// Encodes a message, returning the full framed line.
pub fn marshal(enc: Option<&dyn TextEncoder>, msg: &Message) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    marshal_to(enc, &mut buf, msg)?;
    Ok(buf)
}

/// Decodes a single message from one framed line (delimiter included).
pub fn unmarshal(dec: Option<&dyn TextDecoder>, line: &[u8]) -> Result<Message> {
    if line.last() != Some(&LINE_DELIM) {
        return Err(DcError::protocol("expected line delimiter"));
    }
    if line.contains(&0) {
        return Err(DcError::protocol(
            "message should not contain null characters",
        ));
    }
    let line = &line[..line.len() - 1];
    if line.is_empty() {
        return Err(DcError::protocol("cannot unmarshal a keep-alive line"));
    }
    let (cmd, args) = split_command(line);
    match cmd {
        None => Ok(Message::Chat(ChatMessage::unmarshal(dec, args)?)),
        Some(cmd) => {
            let typ = validate_cmd_name(cmd, MAX_CMD_NAME)?;
            decode_command(dec, typ, args)
        }
    }
}

/// Splits a delimiter-stripped line into command name and payload; chat
/// lines yield no command.
pub(crate) fn split_command(line: &[u8]) -> (Option<&[u8]>, &[u8]) {
    if line.first() != Some(&b'$') {
        return (None, line);
    }
    let line = &line[1..];
    match line.iter().position(|&b| b == b' ') {
        Some(i) => (Some(&line[..i]), &line[i + 1..]),
        None => (Some(line), &[][..]),
    }
}

pub(crate) fn validate_cmd_name(cmd: &[u8], max: usize) -> Result<&str> {
    if cmd.is_empty() {
        return Err(DcError::protocol("command name is empty"));
    }
    if cmd.len() > max {
        return Err(DcError::protocol("command name is too long"));
    }
    if !types::is_cmd_name(cmd) {
        return Err(DcError::protocol(format!(
            "command name should be in ascii: {:?}",
            String::from_utf8_lossy(cmd)
        )));
    }
    std::str::from_utf8(cmd)
        .map_err(|_| DcError::protocol("command name should be in ascii"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_populated() {
        assert!(is_registered("MyINFO"));
        assert!(is_registered("To:"));
        assert!(is_registered("SR"));
        assert!(!is_registered("NoSuchCommand"));
        let types = registered_types();
        assert!(types.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_marshal_empty_payload_collapses_space() {
        let msg = Message::from(GetNickList);
        assert_eq!(marshal(None, &msg).unwrap(), b"$GetNickList|");
    }

    #[test]
    fn test_marshal_chat() {
        let msg = Message::Chat(ChatMessage {
            name: "bob".into(),
            text: "text".into(),
        });
        assert_eq!(marshal(None, &msg).unwrap(), b"<bob> text|");
    }

    #[test]
    fn test_unknown_command_roundtrip() {
        let msg = unmarshal(None, b"$Unknown some payload|").unwrap();
        match &msg {
            Message::Raw(raw) => {
                assert_eq!(raw.typ, "Unknown");
                assert_eq!(&raw.data[..], b"some payload");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(marshal(None, &msg).unwrap(), b"$Unknown some payload|");
    }

    #[test]
    fn test_unmarshal_rejects_nul() {
        assert!(matches!(
            unmarshal(None, b"$Cmd a\x00b|"),
            Err(DcError::Protocol(_))
        ));
    }

    #[test]
    fn test_validate_cmd_name() {
        assert!(validate_cmd_name(b"To:", MAX_CMD_NAME).is_ok());
        assert!(validate_cmd_name(b"", MAX_CMD_NAME).is_err());
        assert!(validate_cmd_name(b"Some\tCommand", MAX_CMD_NAME).is_err());
        assert!(validate_cmd_name(&[b'x'; 33], MAX_CMD_NAME).is_err());
    }
}
