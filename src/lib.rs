//! # dcwire
//!
//! Wire-protocol core for Direct Connect file-sharing hubs.
//!
//! The crate provides everything needed to frame, encode, decode and
//! validate protocol messages on hub and client connections for both
//! generations of the protocol family:
//!
//! - [`nmdc`] — the legacy `|`-delimited, `$`-prefixed text protocol;
//! - [`adc`] — the modern `\n`-delimited protocol with SID routing;
//! - [`line`] — the shared delimiter framer, including the in-band zlib
//!   switching both protocols use and a coalescing async writer;
//! - [`tiger`] — the Tiger hash and Tiger Tree Hash identifying file
//!   content.
//!
//! ## Example
//!
//! ```
//! use dcwire::nmdc;
//!
//! let mut r = nmdc::Reader::new(&b"<bob> hello|"[..]);
//! match r.read_msg().unwrap() {
//!     Some(nmdc::Message::Chat(m)) => {
//!         assert_eq!(m.name, "bob");
//!         assert_eq!(m.text, "hello");
//!     }
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

pub mod adc;
pub mod line;
pub mod nmdc;
pub mod tiger;

mod addr;
mod error;
mod software;

pub use addr::{normalize_addr, parse_addr};
pub use error::{DcError, Result};
pub use software::Software;
