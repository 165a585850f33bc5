// ── Core error types ──
//
// Session failures are carried through untouched so callers can inspect
// exactly what the transport reported. Everything else here is a
// local bookkeeping outcome that the caller asked to be surfaced.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors (propagated unchanged) ────────────────────────
    #[error(transparent)]
    Session(#[from] snowmix_api::Error),

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    /// Ids start at 1.
    #[error("Invalid {kind} id {id}")]
    InvalidId { kind: &'static str, id: u32 },

    // ── Batch errors ─────────────────────────────────────────────────
    /// Some operations of a fan-out batch failed. Operations that
    /// succeeded are not rolled back.
    #[error("{failed} of {attempted} {kind} operations failed; first error: {first}")]
    BatchFailed {
        kind: &'static str,
        failed: usize,
        attempted: usize,
        #[source]
        first: Box<CoreError>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Session(e) => e.is_transient(),
            Self::BatchFailed { first, .. } => first.is_transient(),
            Self::NotFound { .. } | Self::InvalidId { .. } | Self::Internal(_) => false,
        }
    }

    /// Returns `true` if this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Fold the results of a fan-out into one outcome, keeping the first error.
pub(crate) fn collect_batch<T>(
    kind: &'static str,
    results: Vec<Result<T, CoreError>>,
) -> Result<Vec<T>, CoreError> {
    let attempted = results.len();
    let mut ok = Vec::with_capacity(attempted);
    let mut failed = 0;
    let mut first = None;

    for result in results {
        match result {
            Ok(value) => ok.push(value),
            Err(e) => {
                failed += 1;
                if first.is_none() {
                    first = Some(e);
                }
            }
        }
    }

    match first {
        None => Ok(ok),
        Some(first) => Err(CoreError::BatchFailed {
            kind,
            failed,
            attempted,
            first: Box::new(first),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_display_unchanged() {
        let err = CoreError::from(snowmix_api::Error::Closed);
        assert_eq!(err.to_string(), snowmix_api::Error::Closed.to_string());
    }

    #[test]
    fn batch_keeps_first_error_and_counts() {
        let results: Vec<Result<u32, CoreError>> = vec![
            Ok(1),
            Err(CoreError::NotFound { kind: "audio feed", id: 2 }),
            Err(CoreError::Internal("later".into())),
        ];

        let err = collect_batch("audio feed", results).unwrap_err();

        match err {
            CoreError::BatchFailed {
                failed,
                attempted,
                first,
                ..
            } => {
                assert_eq!(failed, 2);
                assert_eq!(attempted, 3);
                assert!(first.is_not_found());
            }
            other => panic!("expected BatchFailed, got {other:?}"),
        }
    }

    #[test]
    fn batch_without_errors_returns_values() {
        let results: Vec<Result<u32, CoreError>> = vec![Ok(1), Ok(2)];
        assert_eq!(collect_batch("audio sink", results).ok(), Some(vec![1, 2]));
    }

    #[test]
    fn timeout_is_transient() {
        let err = CoreError::from(snowmix_api::Error::Timeout {
            command: "audio mixer info".into(),
            timeout_ms: 10,
        });
        assert!(err.is_transient());
        assert!(!CoreError::Internal("x".into()).is_transient());
    }
}
