use std::collections::HashMap;

use super::Variant;

pub const DEFAULT_PROTOCOL: &str = "unknown";

/// Values negotiated during the upgrade. Carried for the application; the
/// codecs never look at them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub origin: Option<String>,
    pub protocol: String,
    pub path: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            origin: None,
            protocol: DEFAULT_PROTOCOL.to_string(),
            path: None,
        }
    }
}

impl Metadata {
    /// Extracts metadata from a CGI-style upgrade environment.
    ///
    /// The legacy draft sends the origin as a plain `Origin` header, the modern
    /// one as `Sec-WebSocket-Origin`.
    pub fn from_environ(variant: Variant, environ: &HashMap<String, String>) -> Self {
        let origin_key = match variant {
            Variant::Legacy => "HTTP_ORIGIN",
            Variant::Modern => "HTTP_SEC_WEBSOCKET_ORIGIN",
        };

        Self {
            origin: environ.get(origin_key).cloned(),
            protocol: environ
                .get("HTTP_SEC_WEBSOCKET_PROTOCOL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            path: environ.get("PATH_INFO").cloned(),
        }
    }
}
