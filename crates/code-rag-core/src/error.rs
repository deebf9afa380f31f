//! Input validation errors.
//!
//! Everything else in code-rag propagates `anyhow::Error`; these variants
//! exist so callers (the HTTP layer in particular) can tell a rejected
//! request apart from a failure that happened while doing the work.

/// A request rejected before any work started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("query is too long: {len} characters (max {max})")]
    QueryTooLong { len: usize, max: usize },

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid parameter {0}: must not start with '-'")]
    OptionLikeParameter(&'static str),

    #[error("batch size must be between 5 and 10, got {0}")]
    InvalidBatchSize(usize),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),
}

impl ValidationError {
    /// Whether the error refers to a missing resource rather than a bad input.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ValidationError::UnknownJob(_) | ValidationError::UnknownSession(_)
        )
    }
}

/// Check that a query is non-blank and at most `max_chars` characters.
///
/// Returns the trimmed query.
pub fn validate_query(query: &str, max_chars: usize) -> Result<&str, ValidationError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(ValidationError::QueryTooLong {
            len,
            max: max_chars,
        });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_query_rejected() {
        assert_eq!(validate_query("   \n", 10), Err(ValidationError::EmptyQuery));
    }

    #[test]
    fn test_oversized_query_rejected() {
        let q = "x".repeat(11);
        assert_eq!(
            validate_query(&q, 10),
            Err(ValidationError::QueryTooLong { len: 11, max: 10 })
        );
    }

    #[test]
    fn test_query_is_trimmed() {
        assert_eq!(validate_query("  where is login?  ", 100), Ok("where is login?"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(ValidationError::UnknownJob("j".into()).is_not_found());
        assert!(!ValidationError::EmptyQuery.is_not_found());
        assert!(!ValidationError::OptionLikeParameter("branch").is_not_found());
    }
}
