//! The `Supports` handshake and the extension set.

use std::collections::HashSet;

use crate::error::Result;

use super::{MessageBody, TextDecoder, TextEncoder};

/// Lists protocol extensions supported by the peer:
/// `$Supports ext1 ext2 …|`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Supports {
    pub ext: Vec<String>,
}

impl Supports {
    /// Intersects two supported sets, keeping the order of `other`.
    pub fn intersect(&self, other: &Supports) -> Supports {
        let own: HashSet<&str> = self.ext.iter().map(String::as_str).collect();
        Supports {
            ext: other
                .ext
                .iter()
                .filter(|e| own.contains(e.as_str()))
                .cloned()
                .collect(),
        }
    }
}

impl MessageBody for Supports {
    const TYPE: &'static str = "Supports";

    fn marshal(&self, _: Option<&dyn TextEncoder>, buf: &mut Vec<u8>) -> Result<()> {
        for (i, ext) in self.ext.iter().enumerate() {
            if i != 0 {
                buf.push(b' ');
            }
            buf.extend_from_slice(ext.as_bytes());
        }
        Ok(())
    }

    fn unmarshal(_: Option<&dyn TextDecoder>, data: &[u8]) -> Result<Supports> {
        Ok(Supports {
            ext: data
                .split(|&b| b == b' ')
                .filter(|s| !s.is_empty())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
        })
    }
}

/// An unordered set of protocol extensions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extensions(HashSet<String>);

impl Extensions {
    pub fn new() -> Extensions {
        Extensions::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn set(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    pub fn intersect(&self, other: &Extensions) -> Extensions {
        Extensions(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn intersect_list(&self, other: &[String]) -> Extensions {
        Extensions(
            other
                .iter()
                .filter(|e| self.0.contains(*e))
                .cloned()
                .collect(),
        )
    }

    /// Lists the extensions, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.0.iter().map(String::as_str).collect();
        out.sort_unstable();
        out
    }
}

impl FromIterator<String> for Extensions {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Extensions {
        Extensions(iter.into_iter().collect())
    }
}

// known extensions
pub const EXT_NO_HELLO: &str = "NoHello";
pub const EXT_NO_GET_INFO: &str = "NoGetINFO";
pub const EXT_USER_COMMAND: &str = "UserCommand";
pub const EXT_USER_IP2: &str = "UserIP2";
pub const EXT_TTH_SEARCH: &str = "TTHSearch";
pub const EXT_ZPIPE0: &str = "ZPipe0";
pub const EXT_TLS: &str = "TLS";
pub const EXT_ADC_GET: &str = "ADCGet";
pub const EXT_BOT_INFO: &str = "BotINFO";
pub const EXT_HUB_INFO: &str = "HubINFO";
pub const EXT_HUB_TOPIC: &str = "HubTopic";
pub const EXT_BOT_LIST: &str = "BotList";
pub const EXT_MCTO: &str = "MCTo";
pub const EXT_NICK_CHANGE: &str = "NickChange";
pub const EXT_CLIENT_NICK: &str = "ClientNick";
pub const EXT_FEATURED_NETWORKS: &str = "FeaturedNetworks";
pub const EXT_GET_ZBLOCK: &str = "GetZBlock";
pub const EXT_CLIENT_ID: &str = "ClientID";
pub const EXT_XML_BZLIST: &str = "XmlBZList";
pub const EXT_MINISLOTS: &str = "Minislots";
pub const EXT_TTHL: &str = "TTHL";
pub const EXT_TTHF: &str = "TTHF";
pub const EXT_TTHS: &str = "TTHS";
pub const EXT_ZLIG: &str = "ZLIG";
pub const EXT_ACTM: &str = "ACTM";
pub const EXT_BZLIST: &str = "BZList";
pub const EXT_SALT_PASS: &str = "SaltPass";
pub const EXT_DHT0: &str = "DHT0";
pub const EXT_FAIL_OVER: &str = "FailOver";
pub const EXT_OP_PLUS: &str = "OpPlus";
pub const EXT_QUICK_LIST: &str = "QuickList";
pub const EXT_BAN_MSG: &str = "BanMsg";
pub const EXT_NICK_RULE: &str = "NickRule";
pub const EXT_SEARCH_RULE: &str = "SearchRule";
pub const EXT_EXT_JSON2: &str = "ExtJSON2";
