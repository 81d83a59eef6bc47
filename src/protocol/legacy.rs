use log::{debug, trace, warn};

use super::{ConnectionState, FrameCodec, Message, Metadata, Utf8Policy, Variant};
use crate::error::{WsError, WsResult};
use crate::net::framing::CloseCode;
use crate::net::{ByteReader, ByteWriter};

/// Opens a text frame.
const TEXT_FRAME_START: u8 = 0x00;
/// Terminates a text frame.
const TEXT_FRAME_END: u8 = 0xFF;
/// Indicator of the length-prefixed binary frame.
const BINARY_FRAME: u8 = 0xFF;

/// Codec for the sentinel-delimited legacy draft.
///
/// The draft has no close frame. Any anomaly on the wire (unknown frame
/// type, zero-length binary frame, end of stream) is read as the peer
/// wanting to stop, and the connection is closed rather than an error raised.
pub struct LegacyFrameCodec<W, R> {
    writer: W,
    reader: R,
    state: ConnectionState,
    metadata: Metadata,
    utf8_policy: Utf8Policy,
}

impl<W: ByteWriter, R: ByteReader> LegacyFrameCodec<W, R> {
    pub fn new(writer: W, reader: R, metadata: Metadata) -> Self {
        Self {
            writer,
            reader,
            state: ConnectionState::Open,
            metadata,
            utf8_policy: Utf8Policy::Lossy,
        }
    }

    pub fn with_utf8_policy(mut self, policy: Utf8Policy) -> Self {
        self.utf8_policy = policy;
        self
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Reads the next text message. Binary frames are skipped.
    pub fn receive(&mut self) -> WsResult<Message> {
        let result = self.read_message();
        if let Err(WsError::Io(ref e)) = result {
            debug!("legacy transport failed mid-frame: {e}");
            self.state.mark_closed();
        }
        result
    }

    /// Sends `text` as one `0x00 .. 0xFF` frame.
    pub fn send(&mut self, text: &str) -> WsResult<()> {
        self.state.ensure_open()?;

        let mut frame = Vec::with_capacity(text.len() + 2);
        frame.push(TEXT_FRAME_START);
        frame.extend_from_slice(text.as_bytes());
        frame.push(TEXT_FRAME_END);

        self.writer.write_frame(&frame)?;
        Ok(())
    }

    /// Shuts the transport down. There is no close frame in this draft.
    pub fn close(&mut self) -> WsResult<()> {
        self.state.close(&mut self.writer)?;
        Ok(())
    }

    fn read_message(&mut self) -> WsResult<Message> {
        loop {
            if self.state.is_closed() {
                return Ok(Message::Closed);
            }

            let Some(indicator) = self.reader.read_byte()? else {
                return Ok(self.hang_up("end of stream"));
            };

            if indicator & 0x80 == 0 {
                if indicator != TEXT_FRAME_START {
                    return Ok(self.hang_up("unsupported text frame type"));
                }
                return match self.read_until_terminator()? {
                    Some(bytes) => Ok(Message::Text(self.utf8_policy.decode(bytes)?)),
                    None => Ok(self.hang_up("end of stream inside text frame")),
                };
            }

            if indicator != BINARY_FRAME {
                return Ok(self.hang_up("unsupported binary frame type"));
            }

            match self.read_length()? {
                None => {
                    warn!("legacy binary frame length overflows u64, closing");
                    return Ok(self.hang_up("oversized binary frame"));
                }
                Some(0) => return Ok(self.hang_up("zero-length binary frame")),
                Some(length) => {
                    let skipped = self.reader.skip(length)?;
                    trace!("discarded {skipped} byte legacy binary frame");
                }
            }
        }
    }

    /// Collects bytes up to the `0xFF` terminator, which is consumed.
    /// `None` if the stream ends first.
    fn read_until_terminator(&mut self) -> WsResult<Option<Vec<u8>>> {
        let mut bytes = Vec::new();
        loop {
            match self.reader.read_byte()? {
                Some(TEXT_FRAME_END) => return Ok(Some(bytes)),
                Some(byte) => bytes.push(byte),
                None => return Ok(None),
            }
        }
    }

    /// Decodes the base-128 length of a binary frame, high bit meaning
    /// "more bytes follow". `0x00` bytes are skipped and never end the
    /// field. End of stream yields 0; `None` means the length overflowed.
    fn read_length(&mut self) -> WsResult<Option<u64>> {
        let mut length: u64 = 0;
        loop {
            let Some(byte) = self.reader.read_byte()? else {
                return Ok(Some(0));
            };
            if byte == 0x00 {
                continue;
            }

            length = match length
                .checked_mul(128)
                .and_then(|l| l.checked_add(u64::from(byte & 0x7F)))
            {
                Some(l) => l,
                None => return Ok(None),
            };
            if byte & 0x80 == 0 {
                return Ok(Some(length));
            }
        }
    }

    fn hang_up(&mut self, reason: &str) -> Message {
        if self.state.mark_closed() {
            debug!("legacy connection closed: {reason}");
        }
        Message::Closed
    }
}

impl<W: ByteWriter, R: ByteReader> FrameCodec for LegacyFrameCodec<W, R> {
    fn variant(&self) -> Variant {
        Variant::Legacy
    }

    fn receive(&mut self) -> WsResult<Message> {
        LegacyFrameCodec::receive(self)
    }

    fn send_message(&mut self, message: &Message) -> WsResult<()> {
        self.state.ensure_open()?;
        match message {
            Message::Text(text) => self.send(text),
            Message::Binary(_) => Err(WsError::Encoding(
                "legacy connections only carry text messages",
            )),
            Message::Closed => Err(WsError::Encoding("cannot send the closed marker")),
        }
    }

    fn close(&mut self, _code: CloseCode, _reason: &str) -> WsResult<()> {
        LegacyFrameCodec::close(self)
    }

    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
