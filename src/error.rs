use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("เลข {0} เป็นเลขที่ไม่รับซื้อ")]
    BlockedNumber(String),
    #[error("no cut configuration has been saved")]
    ConfigMissing,
    #[error("draw result unavailable: {0}")]
    UpstreamFetch(String),
    #[error("allocation invariant violated: {0}")]
    ComputationInvariant(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PoolError {
    pub fn validation(message: impl Into<String>) -> Self {
        PoolError::Validation(message.into())
    }

    /// Only a failed draw fetch is worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::UpstreamFetch(_))
    }
}

impl From<reqwest::Error> for PoolError {
    fn from(e: reqwest::Error) -> Self {
        PoolError::UpstreamFetch(e.to_string())
    }
}

pub type Result<T, E = PoolError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_upstream_errors_are_retryable() {
        assert!(PoolError::UpstreamFetch("timeout".into()).is_retryable());
        assert!(!PoolError::validation("bad number").is_retryable());
        assert!(!PoolError::ConfigMissing.is_retryable());
        assert!(!PoolError::ComputationInvariant("kept > total".into()).is_retryable());
    }

    #[test]
    fn test_blocked_number_message_names_the_number() {
        let err = PoolError::BlockedNumber("123".into());
        assert!(err.to_string().contains("123"));
    }
}
