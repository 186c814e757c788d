//! Difficulty scoring for curriculum ordering.
//!
//! Scorers are pluggable strategies behind a common contract. Some need
//! only the dataset; others declare a tokenizer or live-trainer capability
//! which the factory injects after construction, so a scorer returned by
//! [`get_difficulty_scorer`] is fully wired.

mod model_perplexity;
mod ngram;
mod registry;

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

pub use model_perplexity::ModelPerplexityScorer;
pub use ngram::NGramPerplexityScorer;
pub use registry::{
    get_difficulty_scorer, DifficultyScorerRegistry, ScorerCtor, DIFFICULTY_SCORER_REGISTRY,
};

use crate::error::Result;
use crate::model::Trainer;
use crate::tokenizer::{MaskingTokenizer, TokenId};

/// Constructor options for difficulty scorers, handed over by the external
/// configuration loader. Unused fields are simply ignored by scorers that
/// do not read them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerKwargs {
    /// N-gram order for [`NGramPerplexityScorer`].
    pub ngram_order: Option<usize>,
    /// Scoring batch size for [`ModelPerplexityScorer`].
    pub scoring_batch_size: Option<usize>,
}

/// A strategy that ranks training examples by difficulty.
///
/// Capability declaration replaces the runtime structural typing of
/// dynamically-typed registries: a scorer states which optional
/// dependencies it needs via `uses_tokenizer` / `uses_trainer`, and the
/// factory calls the matching `bind_*` injection point. The trainer handle
/// is non-owning; scoring never extends the trainer's lifetime.
pub trait DifficultyScorer: Send {
    /// Scorer name, matching its registry key.
    fn name(&self) -> &str;

    /// Whether the factory should inject the trainer's tokenizer.
    fn uses_tokenizer(&self) -> bool {
        false
    }

    /// Whether the factory should inject the trainer handle.
    fn uses_trainer(&self) -> bool {
        false
    }

    /// Receive the tokenizer. Called by the factory only when
    /// [`Self::uses_tokenizer`] is true.
    fn bind_tokenizer(&mut self, _tokenizer: Arc<dyn MaskingTokenizer>) {}

    /// Receive the trainer handle. Called by the factory only when
    /// [`Self::uses_trainer`] is true.
    fn bind_trainer(&mut self, _trainer: Weak<dyn Trainer>) {}

    /// The tokenizer this scorer was bound with, if any. Lets callers audit
    /// the wiring the factory performed.
    fn bound_tokenizer(&self) -> Option<Arc<dyn MaskingTokenizer>> {
        None
    }

    /// Score the examples of `dataset` selected by `indices`, returning one
    /// difficulty value per selected example (higher = harder).
    ///
    /// `global_step` lets trainer-coupled scorers adapt to training
    /// progress.
    fn score_difficulty(
        &mut self,
        dataset: &[Vec<TokenId>],
        indices: &[usize],
        global_step: u64,
    ) -> Result<Vec<f32>>;
}
