use thiserror::Error;

/// Top-level error type for the `snowmix-api` crate.
///
/// Covers every failure mode of a control session: connecting, the line
/// transport itself, and replies the server uses to refuse a command.
/// `snowmix-core` maps these into its own error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect failed or timed out.
    #[error("Cannot connect to Snowmix at {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// The first line from the server was not a Snowmix greeting.
    #[error("Unexpected greeting from server: {line:?}")]
    UnexpectedGreeting { line: String },

    /// The server closed the control connection.
    #[error("Connection closed by server")]
    Closed,

    // ── Transport ───────────────────────────────────────────────────
    /// Socket-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (oversized line or I/O failure inside the codec).
    #[error("Line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// No complete reply arrived in time.
    #[error("No reply to {command:?} within {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    // ── Protocol ────────────────────────────────────────────────────
    /// The server answered with a message rejecting the command.
    #[error("Command {command:?} rejected: {message}")]
    Rejected { command: String, message: String },

    /// An earlier exchange was abandoned before its reply was fully read,
    /// so replies can no longer be matched to commands. Reconnect.
    #[error("Session out of step after unfinished exchange {command:?}")]
    Desynchronized { command: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// A timed-out session is left desynchronized; retry on a new one.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connect { .. })
    }

    /// Returns `true` if the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Closed
                | Self::Io(_)
                | Self::Codec(_)
                | Self::UnexpectedGreeting { .. }
                | Self::Desynchronized { .. }
        )
    }
}
