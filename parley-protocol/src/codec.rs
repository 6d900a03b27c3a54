//! Line codec for the chat protocol
//!
//! Frames are text lines. Encoded lines end with `\r\n`; decoded lines may
//! end with `\n` or `\r\n`. Bytes are decoded as lossy UTF-8 and there is
//! no length limit. A partial line still buffered at end of stream is
//! delivered as a final line.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::command::Command;
use crate::error::CommandError;
use crate::message::{self, DecodedMessage, ServerMessage};

const LINE_END: &[u8] = b"\r\n";

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Codec for Command (encoding) and server lines (decoding)
/// Used by the client side
#[derive(Debug, Default)]
pub struct ClientCodec {
    lines: LineFramer,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ClientCodec {
    type Item = DecodedMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.next_line(src).map(|line| message::decode(&line)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.last_line(src).map(|line| message::decode(&line)))
    }
}

impl Encoder<Command> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_line(&item, dst);
        Ok(())
    }
}

/// Codec for ServerMessage (encoding) and Command (decoding)
/// Used by the server side
///
/// A line that does not parse as a command is yielded as `Err(CommandError)`
/// inside the item, so the stream keeps going.
#[derive(Debug, Default)]
pub struct ServerCodec {
    lines: LineFramer,
}

impl ServerCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ServerCodec {
    type Item = Result<Command, CommandError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.next_line(src).map(|line| Command::parse(&line)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.last_line(src).map(|line| Command::parse(&line)))
    }
}

impl Encoder<ServerMessage> for ServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: ServerMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_line(&item, dst);
        Ok(())
    }
}

fn encode_line(item: &impl std::fmt::Display, dst: &mut BytesMut) {
    let line = item.to_string();
    dst.reserve(line.len() + LINE_END.len());
    dst.put_slice(line.as_bytes());
    dst.put_slice(LINE_END);
}

/// Splits a byte buffer into lines
#[derive(Debug, Default)]
struct LineFramer {
    /// Bytes of `src` already searched for a newline
    scanned: usize,
}

impl LineFramer {
    fn next_line(&mut self, src: &mut BytesMut) -> Option<String> {
        match src[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;
                let mut line = src.split_to(end + 1);
                line.truncate(end);
                if line.last() == Some(&b'\r') {
                    line.truncate(end - 1);
                }
                Some(String::from_utf8_lossy(&line).into_owned())
            }
            None => {
                self.scanned = src.len();
                None
            }
        }
    }

    fn last_line(&mut self, src: &mut BytesMut) -> Option<String> {
        if let Some(line) = self.next_line(src) {
            return Some(line);
        }
        if src.is_empty() {
            return None;
        }
        self.scanned = 0;
        let mut line = src.split();
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}
