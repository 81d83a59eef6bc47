use std::io::BufReader;
use std::net::TcpStream;
use std::process;
use std::thread;

use log::{debug, error, info, warn, LevelFilter};
use tracing_subscriber::EnvFilter;

use ws_draft_codec::config::EchoConfig;
use ws_draft_codec::net::tcp_opt;
use ws_draft_codec::{CloseCode, Metadata, Variant, WsError, WsResult};

const LISTEN_BACKLOG: i32 = 128;

fn main() {
    if let Err(e) = run() {
        eprintln!("ws-echo: {e}");
        process::exit(1);
    }
}

fn run() -> WsResult<()> {
    let config = EchoConfig::from_env()?;
    init_tracing(config.log_level)?;

    let listener = tcp_opt::create_listener(config.bind_addr, LISTEN_BACKLOG)?;
    info!(
        "echoing {} frames on {} (protocol {})",
        config.variant, config.bind_addr, config.metadata.protocol
    );

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        let variant = config.variant;
        let metadata = config.metadata.clone();
        thread::spawn(move || {
            if let Err(e) = serve(stream, variant, metadata) {
                error!("connection ended with error: {e}");
            }
        });
    }

    Ok(())
}

/// Installs the fmt subscriber. Its default `tracing-log` bridge also picks
/// up the `log` records the codecs emit.
fn init_tracing(level: LevelFilter) -> WsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level)?)
        .with_target(true)
        .try_init()
        .map_err(|e| WsError::Config(format!("logger already installed: {e}")))
}

fn log_filter(level: LevelFilter) -> WsResult<EnvFilter> {
    EnvFilter::try_new(level.as_str().to_ascii_lowercase())
        .map_err(|e| WsError::Config(format!("WS_LOG_LEVEL: {e}")))
}

/// Echoes every message back on an already-upgraded stream until the peer
/// goes away.
fn serve(stream: TcpStream, variant: Variant, metadata: Metadata) -> WsResult<()> {
    tcp_opt::apply_optimizations(&stream)?;
    let peer = stream.peer_addr()?;
    let reader = BufReader::new(stream.try_clone()?);
    let mut codec = variant.codec(stream, reader, metadata);
    info!("{peer}: {variant} session started");

    loop {
        let message = codec.receive()?;
        if message.is_closed() {
            break;
        }
        debug!("{peer}: echoing {message:?}");
        codec.send_message(&message)?;
    }

    codec.close(CloseCode::Normal, "")?;
    info!("{peer}: session closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_follows_level() {
        for level in [LevelFilter::Off, LevelFilter::Warn, LevelFilter::Trace] {
            let filter = log_filter(level).unwrap();
            assert_eq!(filter.to_string(), level.as_str().to_ascii_lowercase());
        }
    }

    #[test]
    fn test_init_tracing_installs_once() {
        init_tracing(LevelFilter::Debug).unwrap();
        assert!(log::log_enabled!(log::Level::Debug));
        assert!(matches!(init_tracing(LevelFilter::Info), Err(WsError::Config(_))));
    }
}
