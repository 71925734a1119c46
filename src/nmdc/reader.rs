//! NMDC message reader: line framing plus command dispatch.

use std::io::Read;
use std::sync::Arc;

use crate::error::{DcError, Result};
use crate::line;

use super::types::LossyUtf8;
use super::{
    decode_command, split_command, validate_cmd_name, ChatMessage, Message, MessageBody,
    RawMessage, TextDecoder, LINE_DELIM, MAX_CMD_NAME,
};

/// Decodes NMDC messages from a byte stream.
///
/// The reader is per-connection and single-owner. Hooks observe the
/// protocol at several levels: raw lines, raw commands, decoded messages,
/// keep-alives, and the two error-recovery points (`on_unknown_encoding`
/// and `on_unmarshal_error`).
pub struct Reader<R> {
    r: line::Reader<R>,
    dec: Option<Arc<dyn TextDecoder>>,
    max_cmd_name: usize,

    /// Called when an empty (keep-alive) message is received.
    on_keep_alive: Option<Box<dyn FnMut() -> Result<()> + Send>>,
    /// Called for every raw message; commands carry a name, chat does
    /// not. Returning `Ok(false)` drops the message.
    on_raw_message: Option<RawHook>,
    /// Called when a payload is not valid UTF-8. May supply a new
    /// decoder, or `None` to decode lossily and continue.
    on_unknown_encoding: Option<EncodingHook>,
    /// Called for every decoded message. Returning `Ok(false)` drops it.
    on_message: Option<Box<dyn FnMut(&Message) -> Result<bool> + Send>>,
    /// Called when a message fails to decode. Returning `Ok(true)` skips
    /// the message instead of failing the read.
    on_unmarshal_error: Option<Box<dyn FnMut(&[u8], &DcError) -> Result<bool> + Send>>,
}

type RawHook = Box<dyn FnMut(Option<&[u8]>, &[u8]) -> Result<bool> + Send>;
type EncodingHook = Box<dyn FnMut(&[u8]) -> Result<Option<Arc<dyn TextDecoder>>> + Send>;

impl<R: Read> Reader<R> {
    pub fn new(src: R) -> Reader<R> {
        Reader {
            r: line::Reader::new(src, LINE_DELIM),
            dec: None,
            max_cmd_name: MAX_CMD_NAME,
            on_keep_alive: None,
            on_raw_message: None,
            on_unknown_encoding: None,
            on_message: None,
            on_unmarshal_error: None,
        }
    }

    /// Access to the underlying line reader (compression switching,
    /// binary windows, line hooks).
    pub fn line_reader(&mut self) -> &mut line::Reader<R> {
        &mut self.r
    }

    /// Switches the connection into zlib-inflate mode; used after a
    /// `$ZOn|` announcement.
    pub fn enable_inflate(&mut self) -> Result<()> {
        self.r.enable_inflate()
    }

    /// Sets the maximum accepted command-name length.
    pub fn set_max_cmd_name(&mut self, n: usize) {
        self.max_cmd_name = n;
    }

    /// Sets the text decoder converting the connection encoding to UTF-8.
    /// `None` means the connection uses UTF-8.
    pub fn set_decoder(&mut self, dec: Option<Arc<dyn TextDecoder>>) {
        self.dec = dec;
    }

    pub fn on_keep_alive(&mut self, hook: Box<dyn FnMut() -> Result<()> + Send>) {
        self.on_keep_alive = Some(hook);
    }

    pub fn on_raw_message(&mut self, hook: RawHook) {
        self.on_raw_message = Some(hook);
    }

    pub fn on_unknown_encoding(&mut self, hook: EncodingHook) {
        self.on_unknown_encoding = Some(hook);
    }

    pub fn on_message(&mut self, hook: Box<dyn FnMut(&Message) -> Result<bool> + Send>) {
        self.on_message = Some(hook);
    }

    pub fn on_unmarshal_error(
        &mut self,
        hook: Box<dyn FnMut(&[u8], &DcError) -> Result<bool> + Send>,
    ) {
        self.on_unmarshal_error = Some(hook);
    }

    /// Reads the next message. Returns `Ok(None)` at a clean end of
    /// stream.
    pub fn read_msg(&mut self) -> Result<Option<Message>> {
        self.read_msg_expect(None)
    }

    /// Reads the next message, requiring the given type. Any other
    /// command fails with [`DcError::UnexpectedCommand`] carrying the raw
    /// payload.
    pub fn read_msg_to<T>(&mut self) -> Result<Option<T>>
    where
        T: MessageBody + TryFrom<Message, Error = Message>,
    {
        let expected = [T::TYPE];
        match self.read_msg_expect(Some(&expected))? {
            None => Ok(None),
            Some(msg) => match T::try_from(msg) {
                Ok(m) => Ok(Some(m)),
                Err(other) => Err(unexpected(&[T::TYPE], &other)),
            },
        }
    }

    /// Reads the next message, accepting the first match out of several
    /// command names. An empty name stands for chat messages.
    pub fn read_msg_any(&mut self, expected: &[&str]) -> Result<Option<Message>> {
        self.read_msg_expect(Some(expected))
    }

    fn read_msg_expect(&mut self, expected: Option<&[&str]>) -> Result<Option<Message>> {
        loop {
            let line = match self.r.read_line()? {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.contains(&0) {
                return Err(DcError::protocol(
                    "message should not contain null characters",
                ));
            }
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                if let Some(hook) = self.on_keep_alive.as_mut() {
                    hook()?;
                }
                continue;
            }
            let (cmd, args) = split_command(line);
            if let Some(hook) = self.on_raw_message.as_mut() {
                if !hook(cmd, args)? {
                    continue;
                }
            }
            let typ: Option<&str> = match cmd {
                Some(cmd) => Some(validate_cmd_name(cmd, self.max_cmd_name)?),
                None => None,
            };
            if let Some(expected) = expected {
                let got = typ.unwrap_or("");
                if !expected.contains(&got) {
                    if typ.is_none() {
                        return Err(DcError::protocol("expected command, got chat message"));
                    }
                    if expected.len() == 1 && expected[0].is_empty() {
                        return Err(DcError::protocol("expected chat message, got command"));
                    }
                    return Err(DcError::UnexpectedCommand {
                        expected: expected.join(","),
                        received: got.to_string(),
                        data: args.to_vec(),
                    });
                }
            }
            let res = decode_line(self.dec.as_deref(), typ, args);
            let res = match res {
                Err(DcError::UnknownEncoding(text)) => {
                    match self.on_unknown_encoding.as_mut() {
                        None => Err(DcError::UnknownEncoding(text)),
                        Some(hook) => match hook(&text)? {
                            Some(dec) => {
                                // switch the connection decoder and retry
                                self.dec = Some(dec);
                                decode_line(self.dec.as_deref(), typ, args)
                            }
                            // the hook asked to continue without a
                            // decoder: reinterpret the bytes lossily
                            None => decode_line(Some(&LossyUtf8), typ, args),
                        },
                    }
                }
                other => other,
            };
            let msg = match res {
                Ok(msg) => msg,
                Err(err) => {
                    if let Some(hook) = self.on_unmarshal_error.as_mut() {
                        if hook(line, &err)? {
                            tracing::debug!(error = %err, "nmdc: message skipped after decode error");
                            continue;
                        }
                    }
                    return Err(err);
                }
            };
            if let Some(hook) = self.on_message.as_mut() {
                if !hook(&msg)? {
                    continue;
                }
            }
            return Ok(Some(msg));
        }
    }
}

fn decode_line(dec: Option<&dyn TextDecoder>, typ: Option<&str>, args: &[u8]) -> Result<Message> {
    match typ {
        None => Ok(Message::Chat(ChatMessage::unmarshal(dec, args)?)),
        Some(typ) => decode_command(dec, typ, args),
    }
}

fn unexpected(expected: &[&str], got: &Message) -> DcError {
    let data = match got {
        Message::Raw(RawMessage { data, .. }) => data.to_vec(),
        _ => Vec::new(),
    };
    DcError::UnexpectedCommand {
        expected: expected.join(","),
        received: got.type_name().to_string(),
        data,
    }
}
