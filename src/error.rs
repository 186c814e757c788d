//! Error types for objective scheduling and difficulty scoring.
//!
//! Every variant here is a setup-time bug, not a transient fault: callers are
//! expected to propagate these uncaught into the surrounding training loop.

use thiserror::Error;

/// Result type alias for enmascarar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving objectives, building collators,
/// or constructing difficulty scorers.
#[derive(Error, Debug)]
pub enum Error {
    /// Objective name has no collator implementation or is missing from the
    /// curriculum units.
    #[error("objective '{name}' is not supported")]
    UnsupportedObjective { name: String },

    /// Difficulty scorer name is not present in the registry.
    #[error("difficulty scorer '{name}' is not supported")]
    UnsupportedScorer { name: String },

    /// The curriculum does not define the 'mlm' unit. The 'mlm' unit is the
    /// schedule fallback and owns the loss routine used by perplexity
    /// scoring, so a curriculum without it cannot drive training.
    #[error("curriculum must define an 'mlm' objective unit")]
    MissingMlmUnit,

    /// Tokenizer has no mask token, which masked-LM collation and perplexity
    /// estimation both require. Raised before any batch is processed.
    #[error("tokenizer has no mask token id, required for masked language modeling")]
    MissingMaskToken,

    /// Tokenizer has no pad token but batching required padding.
    #[error("tokenizer has no pad token id, required to pad ragged batches")]
    MissingPadToken,

    /// A collator or the perplexity estimator was handed a zero-row batch.
    #[error("batch is empty")]
    EmptyBatch,

    /// A scorer's non-owning trainer handle no longer points at a live
    /// trainer.
    #[error("trainer was dropped before the difficulty scorer used it")]
    TrainerDropped,

    /// Scorer constructor kwargs failed validation.
    #[error("invalid value for '{field}': {message}")]
    ConfigValue { field: String, message: String },

    /// Tensor dimensions do not line up.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    /// Invariant violation inside the crate.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create an internal error from any displayable message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_objective_names_the_objective() {
        let err = Error::UnsupportedObjective { name: "span".into() };
        assert!(err.to_string().contains("span"));
    }

    #[test]
    fn test_shape_mismatch_reports_both_shapes() {
        let err = Error::ShapeMismatch { expected: vec![2, 4], actual: vec![2, 3] };
        let msg = err.to_string();
        assert!(msg.contains("[2, 4]"));
        assert!(msg.contains("[2, 3]"));
    }

    #[test]
    fn test_config_value_names_the_field() {
        let err = Error::ConfigValue {
            field: "ngram_order".into(),
            message: "must be at least 1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ngram_order"));
        assert!(msg.contains("at least 1"));
    }
}
