// Shared transport configuration for control sessions.
//
// Timeouts and reply windows live here so every session built from the
// same config behaves identically.

use std::time::Duration;

/// Default Snowmix control port.
pub const DEFAULT_PORT: u16 = 9999;

/// Transport tuning for a control session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound for establishing the TCP connection and reading the greeting.
    pub connect_timeout: Duration,
    /// Upper bound for one complete command/reply exchange.
    pub response_timeout: Duration,
    /// How long a single-line command waits for an optional reply line.
    ///
    /// Most setter commands answer nothing on success, so an empty window
    /// is a successful, empty reply rather than a timeout.
    pub reply_window: Duration,
    /// Longest accepted reply line, in bytes.
    pub max_line_length: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            reply_window: Duration::from_millis(150),
            max_line_length: 64 * 1024,
        }
    }
}

impl TransportConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_reply_window(mut self, window: Duration) -> Self {
        self.reply_window = window;
        self
    }
}
