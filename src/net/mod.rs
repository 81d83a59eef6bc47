pub mod framing;
pub mod stream;
pub mod tcp_opt;

pub use stream::{ByteReader, ByteWriter};
