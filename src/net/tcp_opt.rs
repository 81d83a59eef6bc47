use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use socket2::{Domain, Protocol, Socket, Type};

/// Tunes an accepted stream for frame traffic.
///
/// # Options
/// * `TCP_NODELAY`: small frames (close frames, short text) go out immediately.
/// * Blocking mode: the codecs suspend on reads and writes, so the stream must
///   not inherit non-blocking mode from the listener.
pub fn apply_optimizations(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_nonblocking(false)?;
    Ok(())
}

/// Creates a bound, listening socket for inbound connections.
///
/// Address reuse is enabled so a restarted server can rebind while old
/// connections sit in TIME_WAIT.
pub fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}
