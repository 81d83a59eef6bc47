use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Result type for codec operations.
pub type WsResult<T> = Result<T, WsError>;

/// Errors surfaced to the caller of a codec.
///
/// Protocol violations and a peer hanging up are not errors: both end in
/// `Message::Closed` from `receive`.
#[derive(Debug, Error)]
pub enum WsError {
    /// The connection was already closed when the call was made.
    #[error("Connection was terminated")]
    ConnectionTerminated,

    #[error("Invalid opcode {0:#x}")]
    InvalidOpcode(u8),

    /// The payload cannot be encoded for the requested frame type.
    #[error("Invalid message encoding: {0}")]
    Encoding(&'static str),

    /// A text frame carried malformed UTF-8 under the strict policy.
    #[error("Invalid UTF-8 in text message: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("Message is too long: {0} bytes")]
    OversizedMessage(u64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
