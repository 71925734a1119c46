//! ADC protocol codec.
//!
//! The modern Direct Connect protocol: `\n`-delimited lines, a one-byte
//! routing kind, three-byte commands and space-separated tagged fields.
//! This module maps wire lines to typed [`Packet`]/[`Message`] values
//! and back.

mod addr;
mod chat;
mod connect;
mod extensions;
mod files;
mod hub;
pub(crate) mod marshal;
mod messages;
mod packets;
mod reader;
mod search;
mod types;
mod user;
mod writer;

pub use addr::{
    normalize_addr, parse_addr, PROTO_ADC, PROTO_ADCS, SCHEME_ADC, SCHEME_ADCS,
};
pub use chat::ChatMessage;
pub use connect::{ConnectRequest, RevConnectRequest};
pub use extensions::*;
pub use files::{GetInfoRequest, GetRequest, GetResponse, FILE_LIST_BZIP};
pub use hub::{Category, Disconnect, GetPassword, Password, SidAssign, UserCommand};
pub use marshal::{escape, unescape};
pub use messages::{
    is_registered, unmarshal_message, Field, Fields, Message, MessageBody, RawMessage,
    Severity, Status, Supported, UserInfoMod, ZOff, ZOn,
};
pub use packets::{
    decode_packet, decode_packet_raw, BroadcastPacket, ClientPacket, DirectPacket, EchoPacket,
    FeaturePacket, FeatureSel, HubPacket, InfoPacket, Packet, UdpPacket,
};
pub use reader::Reader;
pub use search::{ExtGroup, FileType, SearchRequest, SearchResult};
pub use types::{Cid, ExtFeatures, Feature, ModFeatures, MsgType, Path, Pid, Sid};
pub use user::{AwayType, HubInfo, UserInfo, UserType};
pub use writer::{StreamKind, WriteStream, Writer};

/// ADC line delimiter.
pub const LINE_DELIM: u8 = b'\n';
