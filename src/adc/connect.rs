//! Client connection setup (`CTM`/`RCM`).

use super::marshal::adc_msg;

adc_msg! {
    /// An invitation to connect: `proto port token`.
    pub struct ConnectRequest : b"CTM" {
        pub proto: String => pos,
        pub port: i32 => pos,
        pub token: String => pos,
    }
}

adc_msg! {
    /// A reverse connection request from a passive peer: `proto token`.
    pub struct RevConnectRequest : b"RCM" {
        pub proto: String => pos,
        pub token: String => pos,
    }
}
