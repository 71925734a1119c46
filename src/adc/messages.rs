//! ADC message bodies: the registry, the raw fallback and the session
//! control messages.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use bytes::Bytes;

use crate::error::{DcError, Result};

use super::chat::ChatMessage;
use super::connect::{ConnectRequest, RevConnectRequest};
use super::files::{GetInfoRequest, GetRequest, GetResponse};
use super::hub::{Disconnect, GetPassword, Password, SidAssign, UserCommand};
use super::marshal::{escape_into, unescape, FieldValue};
use super::search::{SearchRequest, SearchResult};
use super::types::{ModFeatures, MsgType};
use super::user::{HubInfo, UserInfo};

/// A single ADC message body.
///
/// `CMD` is the three-byte command name. Marshal and unmarshal deal only
/// with the payload; the packet envelope adds the kind, routing fields
/// and delimiter.
pub trait MessageBody: Sized + Into<Message> {
    const CMD: MsgType;

    fn marshal_adc(&self, buf: &mut Vec<u8>) -> Result<()>;
    fn unmarshal_adc(data: &[u8]) -> Result<Self>;
}

/// A raw ADC message: the command name and the unparsed payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage {
    pub typ: MsgType,
    pub data: Bytes,
}

impl RawMessage {
    pub fn new(typ: MsgType, data: impl Into<Bytes>) -> RawMessage {
        RawMessage {
            typ,
            data: data.into(),
        }
    }

    /// Decodes the payload through the registry.
    pub fn decode(&self) -> Result<Message> {
        unmarshal_message(self.typ, &self.data)
    }
}

type DecodeFn = fn(&[u8]) -> Result<Message>;

macro_rules! adc_messages {
    ($( $variant:ident($ty:ty) ),+ $(,)?) => {
        /// A decoded ADC message.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $( $variant($ty), )+
            /// Hub information; shares the `INF` command with user info
            /// and is only decoded in the info-packet context.
            HubInfo(HubInfo),
            /// A message with an unregistered command, kept undecoded.
            Raw(RawMessage),
        }

        impl Message {
            /// The three-byte command name of the message.
            pub fn cmd(&self) -> MsgType {
                match self {
                    $( Message::$variant(_) => <$ty as MessageBody>::CMD, )+
                    Message::HubInfo(_) => <HubInfo as MessageBody>::CMD,
                    Message::Raw(m) => m.typ,
                }
            }

            /// Encodes the payload without the command name or envelope.
            pub fn marshal_body(&self, buf: &mut Vec<u8>) -> Result<()> {
                match self {
                    $( Message::$variant(m) => m.marshal_adc(buf), )+
                    Message::HubInfo(m) => m.marshal_adc(buf),
                    Message::Raw(m) => {
                        buf.extend_from_slice(&m.data);
                        Ok(())
                    }
                }
            }
        }

        impl From<HubInfo> for Message {
            fn from(m: HubInfo) -> Message { Message::HubInfo(m) }
        }

        impl From<RawMessage> for Message {
            fn from(m: RawMessage) -> Message { Message::Raw(m) }
        }

        impl TryFrom<Message> for HubInfo {
            type Error = Message;

            fn try_from(m: Message) -> std::result::Result<HubInfo, Message> {
                match m {
                    Message::HubInfo(v) => Ok(v),
                    other => Err(other),
                }
            }
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

        fn build_registry() -> HashMap<MsgType, DecodeFn> {
            let mut map: HashMap<MsgType, DecodeFn> = HashMap::new();
            $(
                let prev = map.insert(
                    <$ty as MessageBody>::CMD,
                    |data| Ok(Message::from(<$ty>::unmarshal_adc(data)?)),
                );
                assert!(
                    prev.is_none(),
                    "message {:?} is already registered",
                    <$ty as MessageBody>::CMD,
                );
            )+
            map
        }
    };
}

adc_messages! {
    Supported(Supported),
    Status(Status),
    ZOn(ZOn),
    ZOff(ZOff),
    UserInfo(UserInfo),
    ChatMessage(ChatMessage),
    SearchRequest(SearchRequest),
    SearchResult(SearchResult),
    ConnectRequest(ConnectRequest),
    RevConnectRequest(RevConnectRequest),
    GetInfoRequest(GetInfoRequest),
    GetRequest(GetRequest),
    GetResponse(GetResponse),
    SidAssign(SidAssign),
    UserCommand(UserCommand),
    GetPassword(GetPassword),
    Password(Password),
    Disconnect(Disconnect),
}

/// The process-wide command registry, populated once and read-only
/// thereafter. A duplicate command is a fatal init error.
static REGISTRY: LazyLock<HashMap<MsgType, DecodeFn>> = LazyLock::new(build_registry);

/// Checks if a command is registered.
pub fn is_registered(cmd: MsgType) -> bool {
    REGISTRY.contains_key(&cmd)
}

/// Decodes a message payload by command name; unknown commands yield a
/// [`RawMessage`].
pub fn unmarshal_message(cmd: MsgType, data: &[u8]) -> Result<Message> {
    match REGISTRY.get(&cmd) {
        Some(f) => f(data),
        None => Ok(Message::Raw(RawMessage::new(
            cmd,
            Bytes::copy_from_slice(data),
        ))),
    }
}

/// A single tagged field of a partial user-info update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Field {
    pub tag: [u8; 2],
    pub value: String,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", String::from_utf8_lossy(&self.tag), self.value)
    }
}

/// An ordered tagged-field list, used for partial `INF` updates where
/// the absent fields must stay untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fields(pub Vec<Field>);

/// A partial user-info update, transferring only the changed fields.
pub type UserInfoMod = Fields;

impl FieldValue for Fields {
    fn encode_field(&self, buf: &mut Vec<u8>) -> Result<()> {
        for (i, f) in self.0.iter().enumerate() {
            if i != 0 {
                buf.push(b' ');
            }
            buf.extend_from_slice(&f.tag);
            escape_into(&f.value, buf);
        }
        Ok(())
    }

    fn decode_field(data: &[u8]) -> Result<Fields> {
        let mut out = Vec::new();
        if data.is_empty() {
            return Ok(Fields(out));
        }
        for tok in data.split(|&b| b == b' ') {
            if tok.len() < 2 {
                return Err(DcError::protocol(format!(
                    "invalid field: {:?}",
                    String::from_utf8_lossy(tok)
                )));
            }
            out.push(Field {
                tag: [tok[0], tok[1]],
                value: unescape(&tok[2..]),
            });
        }
        Ok(Fields(out))
    }

    fn is_default_field(&self) -> bool {
        self.0.is_empty()
    }
}

/// Feature negotiation: paired `AD`/`RM` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Supported {
    pub features: ModFeatures,
}

impl MessageBody for Supported {
    const CMD: MsgType = MsgType(*b"SUP");

    fn marshal_adc(&self, buf: &mut Vec<u8>) -> Result<()> {
        self.features.encode_field(buf)
    }

    fn unmarshal_adc(data: &[u8]) -> Result<Supported> {
        Ok(Supported {
            features: ModFeatures::decode_field(data)?,
        })
    }
}

/// Status severity: the hundreds digit of the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Severity(pub i32);

impl Severity {
    pub const SUCCESS: Severity = Severity(0);
    pub const RECOVERABLE: Severity = Severity(1);
    pub const FATAL: Severity = Severity(2);
}

/// A status report: three-digit code (severity × 100 + code) and an
/// escaped message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    pub sev: Severity,
    pub code: i32,
    pub msg: String,
}

impl Status {
    /// File/slot-not-available status code promoted to a standard
    /// not-found error.
    pub const CODE_FILE_NOT_AVAILABLE: i32 = 51;

    pub fn ok(&self) -> bool {
        self.sev == Severity::SUCCESS
    }

    pub fn recoverable(&self) -> bool {
        self.ok() || self.sev == Severity::RECOVERABLE
    }

    /// Converts a non-success status into an error. Code 51 maps to
    /// `io::ErrorKind::NotFound` so callers can treat missing-file
    /// responses uniformly.
    pub fn err(&self) -> Option<DcError> {
        if self.ok() {
            return None;
        }
        if self.code == Status::CODE_FILE_NOT_AVAILABLE {
            return Some(DcError::Io(std::io::ErrorKind::NotFound.into()));
        }
        Some(DcError::Status(self.clone()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.msg)
    }
}

impl MessageBody for Status {
    const CMD: MsgType = MsgType(*b"STA");

    fn marshal_adc(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(format!("{}{:02} ", self.sev.0, self.code).as_bytes());
        escape_into(&self.msg, buf);
        Ok(())
    }

    fn unmarshal_adc(data: &[u8]) -> Result<Status> {
        let (code, msg) = match data.iter().position(|&b| b == b' ') {
            Some(i) => (&data[..i], &data[i + 1..]),
            None => (data, &[][..]),
        };
        let code: i32 = std::str::from_utf8(code)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DcError::field("code", "wrong status code"))?;
        Ok(Status {
            sev: Severity(code / 100),
            code: code % 100,
            msg: unescape(msg),
        })
    }
}

macro_rules! no_args_message {
    ($(#[$meta:meta])* $name:ident, $cmd:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl MessageBody for $name {
            const CMD: MsgType = MsgType(*$cmd);

            fn marshal_adc(&self, _: &mut Vec<u8>) -> Result<()> {
                Ok(())
            }

            fn unmarshal_adc(data: &[u8]) -> Result<$name> {
                if !data.is_empty() {
                    return Err(DcError::protocol("unexpected argument for the command"));
                }
                Ok($name)
            }
        }
    };
}

no_args_message! {
    /// Announces that all following bytes are zlib-compressed. Requires
    /// the `ZLIF` extension.
    ZOn, b"ZON"
}

no_args_message! {
    /// Ends a compressed segment.
    ZOff, b"ZOF"
}
