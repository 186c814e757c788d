//! N-gram perplexity difficulty scorer.

use std::collections::HashMap;
use std::sync::Arc;

use super::{DifficultyScorer, ScorerKwargs};
use crate::error::{Error, Result};
use crate::tokenizer::{MaskingTokenizer, TokenId};

const DEFAULT_ORDER: usize = 2;

/// Scores difficulty by the perplexity of a Laplace-smoothed n-gram model
/// fit on the selected examples themselves: examples full of rare
/// transitions come out harder than repetitive ones.
///
/// Needs the tokenizer only to filter special and pad tokens and to size
/// the smoothing denominator; no trainer dependency.
pub struct NGramPerplexityScorer {
    order: usize,
    tokenizer: Option<Arc<dyn MaskingTokenizer>>,
}

impl NGramPerplexityScorer {
    /// Registry name.
    pub const NAME: &'static str = "ngram_perplexity";

    /// Build from kwargs (`ngram_order`, default 2).
    ///
    /// # Errors
    /// Returns [`Error::ConfigValue`] for a zero order.
    pub fn from_kwargs(kwargs: &ScorerKwargs) -> Result<Self> {
        let order = kwargs.ngram_order.unwrap_or(DEFAULT_ORDER);
        if order == 0 {
            return Err(Error::ConfigValue {
                field: "ngram_order".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self { order, tokenizer: None })
    }

    /// Tokens of one example that participate in the language model.
    fn content_tokens(&self, tokenizer: &dyn MaskingTokenizer, row: &[TokenId]) -> Vec<TokenId> {
        let special = tokenizer.special_tokens_mask(row);
        let pad_id = tokenizer.pad_token_id();
        row.iter()
            .zip(special)
            .filter(|&(id, s)| s == 0 && pad_id != Some(*id))
            .map(|(&id, _)| id)
            .collect()
    }
}

/// Transition counts keyed by up to `order - 1` tokens of context.
#[derive(Default)]
struct NGramCounts {
    continuations: HashMap<Vec<TokenId>, HashMap<TokenId, u32>>,
    context_totals: HashMap<Vec<TokenId>, u32>,
}

impl NGramCounts {
    fn observe(&mut self, context: &[TokenId], next: TokenId) {
        *self
            .continuations
            .entry(context.to_vec())
            .or_default()
            .entry(next)
            .or_insert(0) += 1;
        *self.context_totals.entry(context.to_vec()).or_insert(0) += 1;
    }

    /// Laplace-smoothed transition probability.
    fn probability(&self, context: &[TokenId], next: TokenId, vocab: usize) -> f64 {
        let hits = self
            .continuations
            .get(context)
            .and_then(|c| c.get(&next))
            .copied()
            .unwrap_or(0);
        let total = self.context_totals.get(context).copied().unwrap_or(0);
        f64::from(hits + 1) / (f64::from(total) + vocab as f64)
    }
}

impl DifficultyScorer for NGramPerplexityScorer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn uses_tokenizer(&self) -> bool {
        true
    }

    fn bind_tokenizer(&mut self, tokenizer: Arc<dyn MaskingTokenizer>) {
        self.tokenizer = Some(tokenizer);
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
            .ok_or_else(|| Error::internal("ngram scorer used before tokenizer injection"))?;
        let vocab = tokenizer.vocab_size();
        let context_len = self.order - 1;

        let examples: Vec<Vec<TokenId>> = indices
            .iter()
            .map(|&i| {
                dataset
                    .get(i)
                    .map(|row| self.content_tokens(&*tokenizer, row))
                    .ok_or_else(|| Error::internal(format!("dataset index {i} out of range")))
            })
            .collect::<Result<_>>()?;

        let mut counts = NGramCounts::default();
        for tokens in &examples {
            for (pos, &next) in tokens.iter().enumerate() {
                let context = &tokens[pos.saturating_sub(context_len)..pos];
                counts.observe(context, next);
            }
        }

        let mut scores = Vec::with_capacity(examples.len());
        for tokens in &examples {
            if tokens.is_empty() {
                tracing::warn!("Example has no content tokens, difficulty undefined");
                scores.push(f32::NAN);
                continue;
            }
            let log_prob: f64 = tokens
                .iter()
                .enumerate()
                .map(|(pos, &next)| {
                    let context = &tokens[pos.saturating_sub(context_len)..pos];
                    counts.probability(context, next, vocab).ln()
                })
                .sum();
            let perplexity = (-log_prob / tokens.len() as f64).exp();
            scores.push(perplexity as f32);
        }
        Ok(scores)
    }
}
