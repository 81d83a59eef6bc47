use std::io;

use log::debug;

use crate::error::{WsError, WsResult};
use crate::net::ByteWriter;

/// Whether a connection may still carry frames. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Open,
    Closed,
}

impl ConnectionState {
    pub fn is_closed(&self) -> bool {
        *self == Self::Closed
    }

    /// Entry guard for every send path.
    pub fn ensure_open(&self) -> WsResult<()> {
        match self {
            Self::Open => Ok(()),
            Self::Closed => Err(WsError::ConnectionTerminated),
        }
    }

    /// Moves to `Closed`. Returns `true` only for the call that made the
    /// transition, so callers can run one-shot side effects.
    pub fn mark_closed(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        *self = Self::Closed;
        debug!("connection state: open -> closed");
        true
    }

    /// Marks the connection closed and shuts the transport down. A second
    /// call does nothing and succeeds.
    pub fn close<W: ByteWriter + ?Sized>(&mut self, writer: &mut W) -> io::Result<()> {
        if !self.mark_closed() {
            return Ok(());
        }
        writer.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingWriter {
        shutdowns: usize,
    }

    impl ByteWriter for CountingWriter {
        fn write_frame(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn shutdown(&mut self) -> io::Result<()> {
            self.shutdowns += 1;
            Ok(())
        }
    }

    #[test]
    fn test_starts_open() {
        let state = ConnectionState::default();
        assert!(!state.is_closed());
        assert!(state.ensure_open().is_ok());
    }

    #[test]
    fn test_mark_closed_is_idempotent() {
        let mut state = ConnectionState::Open;
        assert!(state.mark_closed());
        assert!(!state.mark_closed());
        assert!(state.is_closed());
        assert!(matches!(
            state.ensure_open(),
            Err(WsError::ConnectionTerminated)
        ));
    }

    #[test]
    fn test_close_shuts_transport_down_once() {
        let mut state = ConnectionState::Open;
        let mut writer = CountingWriter::default();

        state.close(&mut writer).unwrap();
        state.close(&mut writer).unwrap();

        assert!(state.is_closed());
        assert_eq!(writer.shutdowns, 1);
    }

    #[test]
    fn test_close_after_mark_closed_skips_shutdown() {
        let mut state = ConnectionState::Open;
        let mut writer = CountingWriter::default();

        state.mark_closed();
        state.close(&mut writer).unwrap();

        assert_eq!(writer.shutdowns, 0);
    }
}
