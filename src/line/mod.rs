//! Delimiter-framed line transport shared by both protocols.
//!
//! NMDC frames messages with `|`, ADC with `\n`; everything else about the
//! byte transport is identical, including the in-band zlib switching both
//! protocols use for hub-to-client and client-to-client links. The reader
//! and writer here are parameterised by the delimiter byte and know
//! nothing about message contents.
//!
//! # Compression switching
//!
//! A hub announces compression with a regular framed line (`$ZOn|`,
//! `ZON\n`). Every byte after that line's delimiter belongs to a zlib
//! stream, and every byte after the zlib stream's end marker belongs to
//! the plaintext framing again. [`Reader`] therefore feeds the inflater
//! from its own buffer with byte-exact consumption accounting, so that no
//! plaintext byte is ever lost to decoder lookahead, and flips back
//! automatically when the zlib stream ends. The zlib state machines are
//! reset and reused across toggles rather than reallocated.

mod reader;
mod sched;
mod writer;

pub use reader::{BinaryReader, Reader, DEFAULT_MAX_LINE};
pub use sched::{spawn_async_writer, AsyncWriter, AsyncWriterConfig, DEFAULT_FLUSH_DELAY};
pub use writer::Writer;

use crate::error::Result;

/// Hook observing each raw framed line.
///
/// Returning `Ok(false)` drops the line: the reader silently consumes it,
/// the writer skips it.
pub type LineHook = Box<dyn FnMut(&[u8]) -> Result<bool> + Send>;

/// Callback toggling an I/O deadline on the transport around each flush.
pub type TimeoutHook = Box<dyn FnMut(bool) -> std::io::Result<()> + Send>;
