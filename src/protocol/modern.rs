use log::{debug, warn};

use super::{ConnectionState, FrameCodec, Message, Metadata, Payload, Utf8Policy, Variant};
use crate::error::{WsError, WsResult};
use crate::net::framing::{
    apply_mask, encode_preamble, CloseCode, Frame, OpCode, FIN, LEN_16, LEN_64, MASK, OPCODE,
    PAYLOAD_LEN, RSV,
};
use crate::net::{ByteReader, ByteWriter};

/// Server-role codec for the opcode/length/mask draft.
///
/// Inbound frames must be masked. Outbound frames are never masked. Each
/// `receive` reads exactly one frame; FIN is reported but continuation frames
/// are not reassembled.
pub struct ModernFrameCodec<W, R> {
    writer: W,
    reader: R,
    state: ConnectionState,
    metadata: Metadata,
    utf8_policy: Utf8Policy,
}

impl<W: ByteWriter, R: ByteReader> ModernFrameCodec<W, R> {
    pub fn new(writer: W, reader: R, metadata: Metadata) -> Self {
        Self {
            writer,
            reader,
            state: ConnectionState::Open,
            metadata,
            utf8_policy: Utf8Policy::Strict,
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

    /// Reads one message. Text frames are decoded per the UTF-8 policy, every
    /// other opcode comes back as raw bytes.
    pub fn receive(&mut self) -> WsResult<Message> {
        match self.receive_frame()? {
            None => Ok(Message::Closed),
            Some(frame) if frame.opcode == OpCode::Text => {
                Ok(Message::Text(self.utf8_policy.decode(frame.payload)?))
            }
            Some(frame) => {
                if frame.opcode.is_control() {
                    debug!("{:?} frame left to the caller", frame.opcode);
                }
                Ok(Message::Binary(frame.payload))
            }
        }
    }

    /// Reads one frame. `None` means the connection is closed: it already
    /// was, the peer hung up, or the frame broke the protocol and a close
    /// frame was sent in reply.
    pub fn receive_frame(&mut self) -> WsResult<Option<Frame>> {
        let result = self.read_frame();
        if let Err(WsError::Io(ref e)) = result {
            debug!("modern transport failed mid-frame: {e}");
            self.state.mark_closed();
        }
        result
    }

    /// Sends one unmasked final frame in a single write.
    pub fn send(&mut self, opcode: OpCode, payload: Payload<'_>) -> WsResult<()> {
        self.state.ensure_open()?;

        let body = match (opcode, payload) {
            (OpCode::Text, Payload::Bytes(_)) => {
                return Err(WsError::Encoding("text frames need a text payload"))
            }
            (_, payload) => payload.as_bytes(),
        };

        let preamble = encode_preamble(opcode, body.len(), None)?;
        let mut frame = Vec::with_capacity(preamble.len() + body.len());
        frame.extend_from_slice(&preamble);
        frame.extend_from_slice(body);

        self.writer.write_frame(&frame)?;
        Ok(())
    }

    /// Sends a close frame carrying `code` and `reason`, then tears the
    /// transport down. Teardown failures are ignored. Does nothing when the
    /// connection is already closed.
    pub fn close(&mut self, code: CloseCode, reason: &str) -> WsResult<()> {
        if self.state.is_closed() {
            return Ok(());
        }

        let mut body = Vec::with_capacity(2 + reason.len());
        body.extend_from_slice(&u16::from(code).to_be_bytes());
        body.extend_from_slice(reason.as_bytes());
        let sent = self.send(OpCode::Close, Payload::Bytes(&body));

        if let Err(e) = self.state.close(&mut self.writer) {
            debug!("ignoring transport teardown error: {e}");
        }
        sent
    }

    fn read_frame(&mut self) -> WsResult<Option<Frame>> {
        if self.state.is_closed() {
            return Ok(None);
        }

        let Some(header) = self.reader.read_array::<2>()? else {
            return Ok(self.hang_up());
        };
        let [opcode_octet, length_octet] = header;

        if opcode_octet & RSV != 0 {
            return Ok(self.reject(header, "Reserved bits cannot be set"));
        }

        let opcode = match OpCode::try_from(opcode_octet & OPCODE) {
            Ok(opcode) => opcode,
            Err(_) => {
                let reason = format!("Invalid opcode {:x}", opcode_octet & OPCODE);
                return Ok(self.reject(header, &reason));
            }
        };

        if length_octet & MASK == 0 {
            return Ok(self.reject(header, "MASK must be set"));
        }

        let length = match length_octet & PAYLOAD_LEN {
            LEN_16 => match self.reader.read_array::<2>()? {
                Some(bytes) => u64::from(u16::from_be_bytes(bytes)),
                None => return Ok(self.hang_up()),
            },
            LEN_64 => match self.reader.read_array::<8>()? {
                Some(bytes) => u64::from_be_bytes(bytes),
                None => return Ok(self.hang_up()),
            },
            literal => u64::from(literal),
        };

        if usize::try_from(length).is_err() {
            self.state.mark_closed();
            return Err(WsError::OversizedMessage(length));
        }

        let Some(mask_key) = self.reader.read_array::<4>()? else {
            return Ok(self.hang_up());
        };

        let mut payload = self.reader.read_up_to(length)?;
        if (payload.len() as u64) < length {
            return Ok(self.hang_up());
        }
        apply_mask(&mut payload, mask_key);

        Ok(Some(Frame {
            fin: opcode_octet & FIN != 0,
            reserved_bits: 0,
            opcode,
            mask_key: Some(mask_key),
            payload,
        }))
    }

    /// Answers a protocol violation with close code 1002.
    fn reject(&mut self, header: [u8; 2], reason: &str) -> Option<Frame> {
        warn!("protocol violation: {reason}");
        debug!("offending frame header: {}", hex::encode(header));
        if let Err(e) = self.close(CloseCode::ProtocolError, reason) {
            debug!("could not deliver close frame: {e}");
        }
        None
    }

    fn hang_up(&mut self) -> Option<Frame> {
        if self.state.mark_closed() {
            debug!("modern connection closed: end of stream");
        }
        None
    }
}

impl<W: ByteWriter, R: ByteReader> FrameCodec for ModernFrameCodec<W, R> {
    fn variant(&self) -> Variant {
        Variant::Modern
    }

    fn receive(&mut self) -> WsResult<Message> {
        ModernFrameCodec::receive(self)
    }

    fn send_message(&mut self, message: &Message) -> WsResult<()> {
        self.state.ensure_open()?;
        match message {
            Message::Text(text) => self.send(OpCode::Text, Payload::Text(text.as_str())),
            Message::Binary(bytes) => {
                self.send(OpCode::Binary, Payload::Bytes(bytes.as_slice()))
            }
            Message::Closed => Err(WsError::Encoding("cannot send the closed marker")),
        }
    }

    fn close(&mut self, code: CloseCode, reason: &str) -> WsResult<()> {
        ModernFrameCodec::close(self, code, reason)
    }

    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
