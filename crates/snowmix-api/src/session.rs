// ── Session facade contract ──
//
// The single channel through which collections talk to the server.
// Collections call into a `Session`; a session never calls back.

use std::future::Future;

use crate::error::Error;

/// Per-command options understood by every session implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Strip `STAT:` / `MSG:` prefixes and whitespace, drop blank lines.
    pub tidy: bool,
    /// The reply is a block of lines closed by the server's terminator.
    pub expect_multiline: bool,
    /// Verbosity hint only: log the exchange at `trace` instead of `debug`.
    pub log_at_silly_level: bool,
}

impl SendOptions {
    /// A fire-and-forget setter command with at most one reply line.
    pub const fn command() -> Self {
        Self {
            tidy: true,
            expect_multiline: false,
            log_at_silly_level: false,
        }
    }

    /// A status listing: tidied, multi-line.
    pub const fn listing() -> Self {
        Self {
            tidy: true,
            expect_multiline: true,
            log_at_silly_level: false,
        }
    }

    pub const fn silly(mut self) -> Self {
        self.log_at_silly_level = true;
        self
    }
}

/// What the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Single-line reply. Empty when the server stayed silent.
    Line(String),
    /// Multi-line block, terminator excluded.
    Lines(Vec<String>),
}

impl Response {
    /// Flatten into lines; an empty single-line reply yields no lines.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Line(line) if line.is_empty() => Vec::new(),
            Self::Line(line) => vec![line],
            Self::Lines(lines) => lines,
        }
    }

    pub fn as_line(&self) -> Option<&str> {
        match self {
            Self::Line(line) => Some(line),
            Self::Lines(_) => None,
        }
    }
}

/// Exclusive command/response channel to one server.
///
/// Implementations serialize exchanges: at most one command is outstanding
/// on the wire at a time, however many callers share the session.
pub trait Session: Send + Sync + 'static {
    fn send_command(
        &self,
        command: &str,
        options: SendOptions,
    ) -> impl Future<Output = Result<Response, Error>> + Send;
}

/// Normalize one raw reply line: drop the `STAT:` / `MSG:` prefix and
/// surrounding whitespace. Returns `None` for lines left empty.
pub fn tidy_line(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("STAT:")
        .or_else(|| trimmed.strip_prefix("MSG:"))
        .unwrap_or(trimmed)
        .trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_strips_stat_prefix() {
        assert_eq!(
            tidy_line("STAT: audio mixer 1 <Main>").as_deref(),
            Some("audio mixer 1 <Main>")
        );
    }

    #[test]
    fn tidy_strips_msg_prefix_and_whitespace() {
        assert_eq!(tidy_line("  MSG:   hello  ").as_deref(), Some("hello"));
    }

    #[test]
    fn tidy_drops_bare_terminator() {
        assert_eq!(tidy_line("STAT: "), None);
        assert_eq!(tidy_line("   "), None);
    }

    #[test]
    fn tidy_keeps_unprefixed_lines() {
        assert_eq!(tidy_line("max audio mixers : 4").as_deref(), Some("max audio mixers : 4"));
    }

    #[test]
    fn empty_line_response_has_no_lines() {
        assert!(Response::Line(String::new()).into_lines().is_empty());
        assert_eq!(Response::Line("ok".into()).into_lines(), vec!["ok".to_owned()]);
    }

    #[test]
    fn listing_options() {
        let opts = SendOptions::listing().silly();
        assert!(opts.tidy && opts.expect_multiline && opts.log_at_silly_level);
        assert!(!SendOptions::command().expect_multiline);
    }
}
