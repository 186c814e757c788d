//! Trainer-coupled difficulty scorer.

use std::sync::{Arc, Weak};

use super::{DifficultyScorer, ScorerKwargs};
use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::model::Trainer;
use crate::perplexity::compute_perplexity;
use crate::tokenizer::{MaskingTokenizer, TokenId};

const DEFAULT_SCORING_BATCH_SIZE: usize = 8;

/// Scores difficulty with the live model's pseudo-perplexity: the
/// active-learning family of scorers, re-rankable as training progresses.
///
/// Declares both capabilities. The trainer handle is weak; if the trainer
/// is gone by the time scoring runs, that is a fatal wiring bug surfaced as
/// [`Error::TrainerDropped`].
pub struct ModelPerplexityScorer {
    scoring_batch_size: usize,
    tokenizer: Option<Arc<dyn MaskingTokenizer>>,
    trainer: Option<Weak<dyn Trainer>>,
}

impl ModelPerplexityScorer {
    /// Registry name.
    pub const NAME: &'static str = "model_perplexity";

    /// Build from kwargs (`scoring_batch_size`, default 8).
    ///
    /// # Errors
    /// Returns [`Error::ConfigValue`] for a zero batch size.
    pub fn from_kwargs(kwargs: &ScorerKwargs) -> Result<Self> {
        let scoring_batch_size =
            kwargs.scoring_batch_size.unwrap_or(DEFAULT_SCORING_BATCH_SIZE);
        if scoring_batch_size == 0 {
            return Err(Error::ConfigValue {
                field: "scoring_batch_size".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self { scoring_batch_size, tokenizer: None, trainer: None })
    }
}

impl DifficultyScorer for ModelPerplexityScorer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn uses_tokenizer(&self) -> bool {
        true
    }

    fn uses_trainer(&self) -> bool {
        true
    }

    fn bind_tokenizer(&mut self, tokenizer: Arc<dyn MaskingTokenizer>) {
        self.tokenizer = Some(tokenizer);
    }

    fn bind_trainer(&mut self, trainer: Weak<dyn Trainer>) {
        self.trainer = Some(trainer);
    }

    fn bound_tokenizer(&self) -> Option<Arc<dyn MaskingTokenizer>> {
        self.tokenizer.clone()
    }

    fn score_difficulty(
        &mut self,
        dataset: &[Vec<TokenId>],
        indices: &[usize],
        _global_step: u64,
    ) -> Result<Vec<f32>> {
        let tokenizer = self
            .tokenizer
            .clone()
            .ok_or_else(|| Error::internal("model scorer used before tokenizer injection"))?;
        let trainer = self
            .trainer
            .as_ref()
            .ok_or_else(|| Error::internal("model scorer used before trainer injection"))?
            .upgrade()
            .ok_or(Error::TrainerDropped)?;

        let mut scores = Vec::with_capacity(indices.len());
        for chunk in indices.chunks(self.scoring_batch_size) {
            let rows: Vec<Vec<TokenId>> = chunk
                .iter()
                .map(|&i| {
                    dataset
                        .get(i)
                        .cloned()
                        .ok_or_else(|| Error::internal(format!("dataset index {i} out of range")))
                })
                .collect::<Result<_>>()?;
            let batch = Batch::from_rows(&rows, &*tokenizer)?;
            scores.extend(compute_perplexity(&batch, &*tokenizer, &*trainer)?);
        }
        Ok(scores)
    }
}
