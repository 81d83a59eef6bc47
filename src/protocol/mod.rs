//! # Frame codecs
//!
//! Two incompatible drafts of the same real-time messaging protocol, behind
//! one [`FrameCodec`] interface:
//!
//! - [`LegacyFrameCodec`]: `0x00 .. 0xFF` delimited text frames. Anything
//!   unexpected on the wire closes the connection.
//! - [`ModernFrameCodec`]: opcode/length/mask frames with an explicit close
//!   frame. Violations are answered with close code 1002.
//!
//! The variant is picked once per connection, after the upgrade, with
//! [`Variant::codec`]. Codecs are synchronous: `receive` blocks until a whole
//! frame has been read or the peer is gone.

mod legacy;
mod metadata;
mod modern;
mod state;

use std::fmt;
use std::str::FromStr;

use crate::error::{WsError, WsResult};
use crate::net::framing::CloseCode;
use crate::net::{ByteReader, ByteWriter};

pub use legacy::LegacyFrameCodec;
pub use metadata::{Metadata, DEFAULT_PROTOCOL};
pub use modern::ModernFrameCodec;
pub use state::ConnectionState;

/// A decoded application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    /// The connection is closed; there is nothing more to read.
    Closed,
}

impl Message {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Outbound payload for [`ModernFrameCodec::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> Payload<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }
}

/// How text frame payloads are turned into strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Policy {
    /// Invalid sequences become U+FFFD.
    Lossy,
    /// Invalid sequences fail with [`WsError::InvalidUtf8`].
    Strict,
}

impl Utf8Policy {
    pub fn decode(self, bytes: Vec<u8>) -> WsResult<String> {
        match self {
            Self::Lossy => Ok(String::from_utf8(bytes)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())),
            Self::Strict => Ok(String::from_utf8(bytes)?),
        }
    }
}

/// Protocol revision spoken on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Legacy,
    Modern,
}

impl Variant {
    /// Builds the codec for this variant over the given transport halves.
    pub fn codec<'a, W, R>(
        self,
        writer: W,
        reader: R,
        metadata: Metadata,
    ) -> Box<dyn FrameCodec + 'a>
    where
        W: ByteWriter + 'a,
        R: ByteReader + 'a,
    {
        match self {
            Self::Legacy => Box::new(LegacyFrameCodec::new(writer, reader, metadata)),
            Self::Modern => Box::new(ModernFrameCodec::new(writer, reader, metadata)),
        }
    }
}

impl FromStr for Variant {
    type Err = WsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "modern" => Ok(Self::Modern),
            other => Err(WsError::Config(format!(
                "unknown protocol variant '{other}', expected 'legacy' or 'modern'"
            ))),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Modern => write!(f, "modern"),
        }
    }
}

/// Operations shared by both protocol variants.
pub trait FrameCodec {
    fn variant(&self) -> Variant;

    /// Blocks until one message is read. Returns [`Message::Closed`] once the
    /// connection is closed, whatever the reason.
    fn receive(&mut self) -> WsResult<Message>;

    /// Sends a text or binary message. Sending [`Message::Closed`] is an
    /// encoding error; use [`FrameCodec::close`].
    fn send_message(&mut self, message: &Message) -> WsResult<()>;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&mut self, code: CloseCode, reason: &str) -> WsResult<()>;

    fn is_closed(&self) -> bool;

    fn metadata(&self) -> &Metadata;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn test_lossy_decode_replaces() {
        let decoded = Utf8Policy::Lossy.decode(vec![b'a', 0xff, b'b']).unwrap();
        assert_eq!(decoded, "a\u{FFFD}b");
    }

    #[test]
    fn test_strict_decode_fails() {
        assert!(matches!(
            Utf8Policy::Strict.decode(vec![b'a', 0xff]),
            Err(WsError::InvalidUtf8(_))
        ));
        assert_eq!(Utf8Policy::Strict.decode(b"ok".to_vec()).unwrap(), "ok");
    }

    #[test]
    fn test_message_is_closed() {
        assert!(Message::Closed.is_closed());
        assert!(!Message::Text(String::new()).is_closed());
        assert!(!Message::Binary(Vec::new()).is_closed());
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("legacy".parse::<Variant>().unwrap(), Variant::Legacy);
        assert_eq!(" Modern ".parse::<Variant>().unwrap(), Variant::Modern);
        assert!(matches!(
            "hybi".parse::<Variant>(),
            Err(WsError::Config(_))
        ));
        assert_eq!(Variant::Legacy.to_string(), "legacy");
    }

    #[test]
    fn test_variant_selects_codec() {
        let mut out = Vec::new();
        let codec = Variant::Legacy.codec(&mut out, io::empty(), Metadata::default());
        assert_eq!(codec.variant(), Variant::Legacy);
        drop(codec);

        let codec = Variant::Modern.codec(&mut out, io::empty(), Metadata::default());
        assert_eq!(codec.variant(), Variant::Modern);
        assert_eq!(codec.metadata().protocol, DEFAULT_PROTOCOL);
    }

    #[test]
    fn test_dyn_codec_echo() {
        let mut out = Vec::new();
        let inbound = vec![0x00, b'y', b'o', 0xFF];
        {
            let mut codec =
                Variant::Legacy.codec(&mut out, Cursor::new(inbound), Metadata::default());
            let message = codec.receive().unwrap();
            codec.send_message(&message).unwrap();
            assert_eq!(codec.receive().unwrap(), Message::Closed);
            assert!(codec.is_closed());
        }
        assert_eq!(out, vec![0x00, b'y', b'o', 0xFF]);
    }
}
