//! Frame codecs for the legacy (sentinel-delimited) and modern
//! (opcode/length/mask) drafts of a real-time messaging protocol, driven
//! synchronously over one bidirectional byte stream.

pub mod config;
pub mod error;
pub mod net;
pub mod protocol;

pub use error::{WsError, WsResult};
pub use net::framing::{CloseCode, Frame, OpCode};
pub use net::{ByteReader, ByteWriter};
pub use protocol::{
    ConnectionState, FrameCodec, LegacyFrameCodec, Message, Metadata, ModernFrameCodec, Payload,
    Utf8Policy, Variant,
};
