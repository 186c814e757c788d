//! Whole-word masking collator.

use std::sync::Arc;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Collator;
use crate::batch::{Batch, MaskedBatch, IGNORE_INDEX};
use crate::curriculum::ObjectiveUnit;
use crate::error::{Error, Result};
use crate::tokenizer::{MaskingTokenizer, TokenId};

/// Whole-word masking parameterized by the full objective unit.
///
/// Masking operates on word starts taken from the batch's `word_starts`
/// reference layout (every non-special, non-pad position when the layout is
/// absent). For each example the collator precomputes
/// `num_mask_patterns` candidate layouts, picks one uniformly, extends each
/// selected start into a span of `mask_pattern_size` tokens, and applies the
/// mask/random/keep substitution with probabilities read from the unit.
///
/// The unmask probability is step-dependent: `leave_unmasked_prob_start`
/// applies when the collator is built at step 0, `leave_unmasked_prob`
/// afterwards.
pub struct WholeWordMaskCollator {
    tokenizer: Arc<dyn MaskingTokenizer>,
    unit: ObjectiveUnit,
    mask_id: TokenId,
    leave_unmasked_prob: f64,
    rng: StdRng,
}

impl WholeWordMaskCollator {
    /// Create a collator for the unit, active from `step`.
    ///
    /// # Errors
    /// Returns [`Error::MissingMaskToken`] if the tokenizer cannot mask.
    pub fn new(
        tokenizer: Arc<dyn MaskingTokenizer>,
        unit: ObjectiveUnit,
        step: u64,
    ) -> Result<Self> {
        Self::with_rng(tokenizer, unit, step, StdRng::from_os_rng())
    }

    /// Create a collator with a seed for reproducibility.
    ///
    /// # Errors
    /// Returns [`Error::MissingMaskToken`] if the tokenizer cannot mask.
    pub fn with_seed(
        tokenizer: Arc<dyn MaskingTokenizer>,
        unit: ObjectiveUnit,
        step: u64,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(tokenizer, unit, step, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        tokenizer: Arc<dyn MaskingTokenizer>,
        unit: ObjectiveUnit,
        step: u64,
        rng: StdRng,
    ) -> Result<Self> {
        let mask_id = tokenizer.mask_token_id().ok_or(Error::MissingMaskToken)?;
        let leave_unmasked_prob =
            if step == 0 { unit.leave_unmasked_prob_start } else { unit.leave_unmasked_prob };
        Ok(Self { tokenizer, unit, mask_id, leave_unmasked_prob, rng })
    }

    /// Word-start positions with nonzero probability mass: marked in the
    /// reference layout, not special, not pad.
    fn eligible_starts(&self, batch: &Batch, row: usize) -> Vec<usize> {
        let pad_id = self.tokenizer.pad_token_id();
        (0..batch.seq_len())
            .filter(|&t| {
                let is_start = batch
                    .word_starts
                    .as_ref()
                    .map_or(true, |ws| ws[[row, t]] == 1);
                is_start
                    && batch.special_tokens_mask[[row, t]] == 0
                    && pad_id != Some(batch.input_ids[[row, t]])
            })
            .collect()
    }

    /// One candidate layout: the word starts a pattern selects for masking.
    fn sample_pattern(&mut self, eligible: &[usize]) -> Vec<usize> {
        let n = eligible.len();
        let target = ((self.unit.mask_probability * n as f64).round() as usize).clamp(1, n);

        if self.unit.consecutive_masking {
            // One contiguous run of word starts, clamped so it always fits.
            let start = self.rng.random_range(0..=n - target);
            eligible[start..start + target].to_vec()
        } else if self.unit.probabilistic_masking {
            // Independent sampling; an example may come out unmasked.
            eligible
                .iter()
                .copied()
                .filter(|_| self.rng.random::<f64>() < self.unit.mask_probability)
                .collect()
        } else {
            let picked = rand::seq::index::sample(&mut self.rng, n, target);
            let mut starts: Vec<usize> = picked.iter().map(|i| eligible[i]).collect();
            starts.sort_unstable();
            starts
        }
    }

    /// Extend selected word starts into token spans, skipping positions that
    /// must keep zero probability mass.
    fn span_positions(&self, batch: &Batch, row: usize, starts: &[usize]) -> Vec<usize> {
        let pad_id = self.tokenizer.pad_token_id();
        let span = self.unit.mask_pattern_size.max(1);
        let mut positions = Vec::new();
        for &start in starts {
            for t in start..(start + span).min(batch.seq_len()) {
                if batch.special_tokens_mask[[row, t]] != 0
                    || pad_id == Some(batch.input_ids[[row, t]])
                {
                    break;
                }
                positions.push(t);
            }
        }
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

impl Collator for WholeWordMaskCollator {
    fn name(&self) -> &str {
        "pos"
    }

    fn collate(&mut self, batch: &Batch) -> Result<MaskedBatch> {
        if batch.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let vocab = self.tokenizer.vocab_size() as u32;
        let random_prob = self.unit.random_token_prob;
        let keep_or_random = self.leave_unmasked_prob + random_prob;
        let replace_prob = (1.0 - keep_or_random).max(0.0);
        let random_given_not_replaced =
            if keep_or_random > 0.0 { random_prob / keep_or_random } else { 0.0 };

        let mut input_ids = batch.input_ids.clone();
        let mut labels = Array2::from_elem(input_ids.dim(), IGNORE_INDEX);

        for row in 0..batch.batch_size() {
            let eligible = self.eligible_starts(batch, row);
            if eligible.is_empty() {
                continue;
            }

            let patterns: Vec<Vec<usize>> = (0..self.unit.num_mask_patterns.max(1))
                .map(|_| self.sample_pattern(&eligible))
                .collect();
            let chosen = &patterns[self.rng.random_range(0..patterns.len())];

            for t in self.span_positions(batch, row, chosen) {
                labels[[row, t]] = i64::from(batch.input_ids[[row, t]]);
                if self.rng.random::<f64>() < replace_prob {
                    input_ids[[row, t]] = self.mask_id;
                } else if self.rng.random::<f64>() < random_given_not_replaced {
                    input_ids[[row, t]] = self.rng.random_range(0..vocab);
                }
            }
        }

        Ok(MaskedBatch { input_ids, labels })
    }
}
