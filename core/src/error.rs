/// Failures surfaced by accepting or declining a suggestion.
///
/// Computing a suggestion never fails this way: store problems there are
/// logged and reported as "no suggestion".
#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("recipe {0} not found")]
    NotFound(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SuggestionError::StoreUnavailable(
            anyhow::anyhow!("disk I/O error").context("failed to list meals"),
        );
        assert_eq!(
            err.to_string(),
            "store unavailable: failed to list meals: disk I/O error"
        );

        assert_eq!(SuggestionError::NotFound(7).to_string(), "recipe 7 not found");
    }
}
