//! Error types for the reviewer core library.
//!
//! Most variants describe a failure scoped to one file, hunk, call site or
//! signal. Those are logged and skipped by the pipeline; only store failures
//! and pipeline misuse reach the caller.

/// Top-level error enum for the reviewer core library.
#[derive(Debug, thiserror::Error)]
pub enum ReviewerError {
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Blame unavailable for {file} at {reference}: {reason}")]
    BlameUnavailable {
        file: String,
        reference: String,
        reason: String,
    },

    #[error("Malformed diff at line {line}: {reason}")]
    DiffMalformed { line: usize, reason: String },

    #[error("Signal {signal} has a zero total")]
    ZeroTotal { signal: String },

    #[error("Call chain in {file} at line {line} exceeds depth {max_depth}")]
    ResolutionDepthExceeded {
        file: String,
        line: u32,
        max_depth: usize,
    },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReviewerError {
    /// Whether the pipeline may log this error and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReviewerError::Parse { .. }
                | ReviewerError::BlameUnavailable { .. }
                | ReviewerError::DiffMalformed { .. }
                | ReviewerError::ZeroTotal { .. }
                | ReviewerError::ResolutionDepthExceeded { .. }
        )
    }
}

#[cfg(feature = "python")]
impl From<ReviewerError> for pyo3::PyErr {
    fn from(err: ReviewerError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
        match &err {
            ReviewerError::Store(_) | ReviewerError::Sqlite(_) | ReviewerError::Pipeline(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            ReviewerError::Io(_) => PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

pub type ReviewerResult<T> = Result<T, ReviewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_failures_are_recoverable() {
        let parse = ReviewerError::Parse {
            file: "a.py".to_string(),
            message: "syntax".to_string(),
        };
        let depth = ReviewerError::ResolutionDepthExceeded {
            file: "a.py".to_string(),
            line: 3,
            max_depth: 32,
        };
        assert!(parse.is_recoverable());
        assert!(depth.is_recoverable());
        assert!(!ReviewerError::Store("disk full".to_string()).is_recoverable());
        assert!(!ReviewerError::Pipeline("out of order".to_string()).is_recoverable());
    }

    #[test]
    fn messages_name_the_file() {
        let err = ReviewerError::BlameUnavailable {
            file: "pkg/mod.py".to_string(),
            reference: "HEAD~3".to_string(),
            reason: "missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Blame unavailable for pkg/mod.py at HEAD~3: missing"
        );
    }
}
