//! Wire primitives for the modern (opcode/length/mask) frame format.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |     Masking key (if MASK)     |          Payload data         |
//! +-------------------------------+-------------------------------+
//! ```
//!
//! The server-role codec lives in `protocol::modern`. The client-role helpers
//! here (`encode_masked_frame`, `decode_frame`) let a peer or a test speak to it.

use arrayvec::ArrayVec;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{WsError, WsResult};

pub const FIN: u8 = 0b1000_0000;
pub const RSV: u8 = 0b0111_0000;
pub const OPCODE: u8 = 0b0000_1111;
pub const MASK: u8 = 0b1000_0000;
pub const PAYLOAD_LEN: u8 = 0b0111_1111;

/// Length marker: a big-endian u16 length follows.
pub const LEN_16: u8 = 126;
/// Length marker: a big-endian u64 length follows.
pub const LEN_64: u8 = 127;

/// FIN/opcode byte, length byte, 8 extended length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

pub type Preamble = ArrayVec<u8, MAX_HEADER_LEN>;

/// Frame opcodes understood by the modern draft.
///
/// Continuation (0) is deliberately absent: fragmented messages are not
/// reassembled, so a continuation frame is rejected like any other unknown
/// opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = WsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(WsError::InvalidOpcode(other)),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        match value {
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }
}

/// Close frame reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Normal closure.
    Normal,
    /// Endpoint going away.
    GoingAway,
    /// Peer violated the framing rules.
    ProtocolError,
    Other(u16),
}

impl From<u16> for CloseCode {
    fn from(value: u16) -> Self {
        match value {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            code => Self::Other(code),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(value: CloseCode) -> Self {
        match value {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Other(code) => code,
        }
    }
}

/// One decoded modern frame. `payload` is always unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub reserved_bits: u8,
    pub opcode: OpCode,
    pub mask_key: Option<[u8; 4]>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_masked(&self) -> bool {
        self.mask_key.is_some()
    }

    pub fn payload_length(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Builds the frame header for a final frame of `payload_len` bytes.
///
/// Length tiers: `< 126` literal, `< 2^16` marker 126 plus u16, otherwise
/// marker 127 plus u64. When `mask_key` is given the MASK bit is set and the
/// key is appended.
pub fn encode_preamble(
    opcode: OpCode,
    payload_len: usize,
    mask_key: Option<[u8; 4]>,
) -> WsResult<Preamble> {
    let len = u64::try_from(payload_len).map_err(|_| WsError::OversizedMessage(u64::MAX))?;
    let mask_bit = if mask_key.is_some() { MASK } else { 0 };

    let mut preamble = Preamble::new();
    preamble.push(FIN | u8::from(opcode));

    if len < LEN_16 as u64 {
        preamble.push(mask_bit | len as u8);
    } else if len <= u16::MAX as u64 {
        preamble.push(mask_bit | LEN_16);
        preamble
            .try_extend_from_slice(&(len as u16).to_be_bytes())
            .map_err(|_| WsError::OversizedMessage(len))?;
    } else {
        preamble.push(mask_bit | LEN_64);
        preamble
            .try_extend_from_slice(&len.to_be_bytes())
            .map_err(|_| WsError::OversizedMessage(len))?;
    }

    if let Some(key) = mask_key {
        preamble
            .try_extend_from_slice(&key)
            .map_err(|_| WsError::OversizedMessage(len))?;
    }

    Ok(preamble)
}

/// XORs `payload` in place with the 4-byte key. Applying it twice restores
/// the original bytes.
pub fn apply_mask(payload: &mut [u8], mask_key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask_key[i % 4];
    }
}

/// Fresh mask key from the system CSPRNG.
pub fn random_mask_key() -> WsResult<[u8; 4]> {
    let rng = SystemRandom::new();
    let mut key = [0u8; 4];
    rng.fill(&mut key).map_err(|_| {
        WsError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "system random source unavailable",
        ))
    })?;
    Ok(key)
}

/// Encodes a masked final frame, as a client must send it.
pub fn encode_masked_frame(opcode: OpCode, payload: &[u8], mask_key: [u8; 4]) -> WsResult<Vec<u8>> {
    let preamble = encode_preamble(opcode, payload.len(), Some(mask_key))?;

    let mut frame = Vec::with_capacity(preamble.len() + payload.len());
    frame.extend_from_slice(&preamble);
    let body_start = frame.len();
    frame.extend_from_slice(payload);
    apply_mask(&mut frame[body_start..], mask_key);

    Ok(frame)
}

/// Decodes one frame from the front of `buf`.
///
/// Returns `Ok(Some((bytes_consumed, frame)))` when a whole frame is present,
/// `Ok(None)` if more data is needed. Masked frames are unmasked. Reserved
/// bits are reported, not rejected; that policy belongs to the codec.
pub fn decode_frame(buf: &[u8]) -> WsResult<Option<(usize, Frame)>> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let first_byte = buf[0];
    let second_byte = buf[1];
    let opcode = OpCode::try_from(first_byte & OPCODE)?;
    let masked = (second_byte & MASK) != 0;

    let mut header_len = 2;
    let payload_len = match second_byte & PAYLOAD_LEN {
        LEN_16 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            header_len += 2;
            u16::from_be_bytes([buf[2], buf[3]]) as u64
        }
        LEN_64 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut len_bytes = [0u8; 8];
            len_bytes.copy_from_slice(&buf[2..10]);
            header_len += 8;
            u64::from_be_bytes(len_bytes)
        }
        literal => literal as u64,
    };
    let payload_len =
        usize::try_from(payload_len).map_err(|_| WsError::OversizedMessage(payload_len))?;

    let mask_key = if masked {
        if buf.len() < header_len + 4 {
            return Ok(None);
        }
        let key = [
            buf[header_len],
            buf[header_len + 1],
            buf[header_len + 2],
            buf[header_len + 3],
        ];
        header_len += 4;
        Some(key)
    } else {
        None
    };

    let total_len = header_len
        .checked_add(payload_len)
        .ok_or(WsError::OversizedMessage(payload_len as u64))?;
    if buf.len() < total_len {
        return Ok(None);
    }

    let mut payload = buf[header_len..total_len].to_vec();
    if let Some(key) = mask_key {
        apply_mask(&mut payload, key);
    }

    Ok(Some((
        total_len,
        Frame {
            fin: (first_byte & FIN) != 0,
            reserved_bits: (first_byte & RSV) >> 4,
            opcode,
            mask_key,
            payload,
        },
    )))
}
