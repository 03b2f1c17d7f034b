use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the streaks file. Unparseable content is not one of them: the
/// store recovers from it by starting over with an empty population.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("streaks file I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode streaks: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("streaks file at {path} does not match what was written")]
    VerificationMismatch { path: PathBuf },

    #[error("streaks file operation timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// The state machine refused to credit a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreditError {
    #[error("event date {event} is before last credited date {last}")]
    DateRegression { last: NaiveDate, event: NaiveDate },
}

/// Errors surfaced by the serialized streak service handle.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("streak service has shut down")]
    Closed,
}
