//! Byte-stream contracts the codecs are written against.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// Upper bound on the buffer reserved before a payload starts arriving.
/// Larger payloads grow the buffer as bytes are actually read.
const PREALLOC_LIMIT: u64 = 64 * 1024;

/// Blocking reader side of a connection.
pub trait ByteReader {
    /// Reads `n` bytes, or fewer if the stream ends first.
    fn read_up_to(&mut self, n: u64) -> io::Result<Vec<u8>>;

    /// Reads one byte, `None` on end of stream.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Discards up to `n` bytes and returns how many were skipped.
    fn skip(&mut self, n: u64) -> io::Result<u64>;

    /// Reads exactly `N` bytes, `None` if the stream ends first.
    fn read_array<const N: usize>(&mut self) -> io::Result<Option<[u8; N]>> {
        let bytes = self.read_up_to(N as u64)?;
        Ok(<[u8; N]>::try_from(bytes.as_slice()).ok())
    }
}

impl<R: Read> ByteReader for R {
    fn read_up_to(&mut self, n: u64) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(n.min(PREALLOC_LIMIT) as usize);
        self.by_ref().take(n).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        io::copy(&mut self.by_ref().take(n), &mut io::sink())
    }
}

/// Writer side of a connection. Each `write_frame` call is one atomic write
/// from the codec's point of view.
pub trait ByteWriter {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Signals that neither direction will be used again.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl ByteWriter for TcpStream {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// In-memory sink, used by tests and for buffering frames.
impl ByteWriter for Vec<u8> {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: ByteWriter + ?Sized> ByteWriter for &mut W {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_frame(bytes)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }
}
