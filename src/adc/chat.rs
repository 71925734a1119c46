//! Chat messages (`MSG`).

use super::marshal::adc_msg;
use super::types::Sid;

adc_msg! {
    /// A chat message, optionally marked as a private message (`PM`) or
    /// a `/me` action (`ME1`).
    pub struct ChatMessage : b"MSG" {
        pub text: String => pos,
        /// The chat session SID for private messages.
        pub pm: Option<Sid> => tag "PM",
        pub me: bool => tag "ME",
        /// Unix timestamp of the `TS` extension.
        pub ts: i64 => tag "TS",
    }
}
