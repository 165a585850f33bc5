// ── Runtime connection configuration ──
//
// Describes *where* the server lives and how patient to be with it.
// Embedding applications deserialize it from their own config files;
// core never touches disk.

use std::time::Duration;

use serde::Deserialize;
use snowmix_api::TransportConfig;
use snowmix_api::transport::DEFAULT_PORT;

/// Configuration for connecting to a single Snowmix server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SnowmixConfig {
    /// Host name or address of the control port.
    pub host: String,
    /// Control port (Snowmix listens on 9999 unless configured otherwise).
    pub port: u16,
    /// Connect + greeting timeout (seconds).
    pub connect_timeout_secs: u64,
    /// Whole command/reply exchange timeout (seconds).
    pub response_timeout_secs: u64,
    /// How long setters wait for an optional reply line (milliseconds).
    pub reply_window_ms: u64,
}

impl Default for SnowmixConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            connect_timeout_secs: transport.connect_timeout.as_secs(),
            response_timeout_secs: transport.response_timeout.as_secs(),
            reply_window_ms: u64::try_from(transport.reply_window.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl SnowmixConfig {
    /// Transport tuning derived from this config.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            reply_window: Duration::from_millis(self.reply_window_ms),
            ..TransportConfig::default()
        }
    }
}
