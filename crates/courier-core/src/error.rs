use thiserror::Error;

/// Error raised by the durable queue storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of one task execution attempt.
///
/// The executor only classifies; it never decides whether to retry.
/// - `Retryable`: network-level failure. The task stays stored and runs
///   again on a future drain.
/// - `Terminal`: the task can never succeed (unknown type, undecodable
///   payload). The drain removes it so it is not selected forever.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("retryable failure: {0}")]
    Retryable(String),

    #[error("terminal failure: {0}")]
    Terminal(String),
}

impl RunError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunError::Terminal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_classification() {
        assert!(RunError::Terminal("bad payload".into()).is_terminal());
        assert!(!RunError::Retryable("timeout".into()).is_terminal());
    }

    #[test]
    fn storage_error_wraps_io() {
        let err: StorageError = std::io::Error::other("disk full").into();
        assert!(err.to_string().contains("disk full"));
    }
}
