//! Line framing for the chat protocol.
//!
//! Decodes a byte stream into newline-delimited lines and frames
//! outgoing lines with CRLF. A received chunk may carry any number of
//! lines; the decoder yields them strictly in arrival order.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ClientError;

/// Maximum accepted line length, tags included.
pub const MAX_LINE_LEN: usize = 8191;

/// Newline-delimited line codec.
///
/// Tolerates both `\r\n` and bare `\n` terminators on read and always
/// writes `\r\n`. Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Default)]
pub struct IrcCodec {
    // Offset already scanned for a newline, to keep decode linear
    // across repeated calls on a growing buffer.
    scanned: usize,
}

impl Decoder for IrcCodec {
    type Item = String;
    type Error = ClientError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, ClientError> {
        let newline = buf[self.scanned..].iter().position(|&b| b == b'\n');

        match newline {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;

                let line = buf.split_to(end + 1);
                let mut line = &line[..end];
                if line.ends_with(b"\r") {
                    line = &line[..line.len() - 1];
                }
                Ok(Some(String::from_utf8_lossy(line).into_owned()))
            }
            None if buf.len() > MAX_LINE_LEN => Err(ClientError::MessageTooLong(buf.len())),
            None => {
                self.scanned = buf.len();
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for IrcCodec {
    type Error = ClientError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), ClientError> {
        if line.len() > MAX_LINE_LEN {
            return Err(ClientError::MessageTooLong(line.len()));
        }
        buf.reserve(line.len() + 2);
        buf.put_slice(line.as_bytes());
        buf.put_slice(b"\r\n");
        Ok(())
    }
}
