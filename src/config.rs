//! Runtime configuration for the `ws-echo` binary.
//!
//! Values come from the process environment, after `.env` has been loaded.

use std::env;
use std::net::SocketAddr;

use log::LevelFilter;

use crate::error::{WsError, WsResult};
use crate::protocol::{Metadata, Variant, DEFAULT_PROTOCOL};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:9001";

#[derive(Debug, Clone)]
pub struct EchoConfig {
    pub bind_addr: SocketAddr,
    pub variant: Variant,
    /// Attached to every accepted connection, since the upgrade happened
    /// upstream.
    pub metadata: Metadata,
    pub log_level: LevelFilter,
}

impl EchoConfig {
    /// Loads `.env` if present, then reads the `WS_*` variables.
    pub fn from_env() -> WsResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> WsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("WS_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| WsError::Config(format!("WS_BIND_ADDR: {e}")))?;

        let variant = match lookup("WS_VARIANT") {
            Some(value) => value.parse()?,
            None => Variant::Modern,
        };

        let log_level = match lookup("WS_LOG_LEVEL") {
            Some(value) => value
                .parse::<LevelFilter>()
                .map_err(|e| WsError::Config(format!("WS_LOG_LEVEL: {e}")))?,
            None => LevelFilter::Info,
        };

        let metadata = Metadata {
            origin: lookup("WS_ORIGIN"),
            protocol: lookup("WS_PROTOCOL").unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            path: lookup("WS_PATH"),
        };

        Ok(Self {
            bind_addr,
            variant,
            metadata,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> WsResult<EchoConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EchoConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.variant, Variant::Modern);
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(config.metadata, Metadata::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("WS_BIND_ADDR", "0.0.0.0:8080"),
            ("WS_VARIANT", "legacy"),
            ("WS_LOG_LEVEL", "debug"),
            ("WS_PROTOCOL", "chat"),
            ("WS_PATH", "/echo"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.variant, Variant::Legacy);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.metadata.protocol, "chat");
        assert_eq!(config.metadata.path.as_deref(), Some("/echo"));
        assert!(config.metadata.origin.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("WS_BIND_ADDR", "nowhere")]),
            Err(WsError::Config(_))
        ));
        assert!(matches!(
            config(&[("WS_VARIANT", "draft-99")]),
            Err(WsError::Config(_))
        ));
        assert!(matches!(
            config(&[("WS_LOG_LEVEL", "loud")]),
            Err(WsError::Config(_))
        ));
    }
}
