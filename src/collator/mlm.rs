//! Standard masked-language-model collator.

use std::sync::Arc;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Collator;
use crate::batch::{Batch, MaskedBatch, IGNORE_INDEX};
use crate::error::{Error, Result};
use crate::tokenizer::{MaskingTokenizer, TokenId};

/// BERT-style random masking: each eligible position is selected with
/// `mask_probability`; selected positions get the mask token 80% of the
/// time, a random vocabulary token 10% of the time, and stay unchanged the
/// remaining 10%.
pub struct MlmCollator {
    tokenizer: Arc<dyn MaskingTokenizer>,
    mask_probability: f64,
    mask_id: TokenId,
    rng: StdRng,
}

impl MlmCollator {
    /// Create a collator with OS-seeded randomness.
    ///
    /// # Errors
    /// Returns [`Error::MissingMaskToken`] if the tokenizer cannot mask.
    pub fn new(tokenizer: Arc<dyn MaskingTokenizer>, mask_probability: f64) -> Result<Self> {
        Self::with_rng(tokenizer, mask_probability, StdRng::from_os_rng())
    }

    /// Create a collator with a seed for reproducibility.
    ///
    /// # Errors
    /// Returns [`Error::MissingMaskToken`] if the tokenizer cannot mask.
    pub fn with_seed(
        tokenizer: Arc<dyn MaskingTokenizer>,
        mask_probability: f64,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(tokenizer, mask_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        tokenizer: Arc<dyn MaskingTokenizer>,
        mask_probability: f64,
        rng: StdRng,
    ) -> Result<Self> {
        let mask_id = tokenizer.mask_token_id().ok_or(Error::MissingMaskToken)?;
        Ok(Self { tokenizer, mask_probability, mask_id, rng })
    }

    /// Configured masking probability.
    pub fn mask_probability(&self) -> f64 {
        self.mask_probability
    }
}

impl Collator for MlmCollator {
    fn name(&self) -> &str {
        "mlm"
    }

    fn collate(&mut self, batch: &Batch) -> Result<MaskedBatch> {
        if batch.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let pad_id = self.tokenizer.pad_token_id();
        let vocab = self.tokenizer.vocab_size() as u32;

        let mut input_ids = batch.input_ids.clone();
        let mut labels = Array2::from_elem(input_ids.dim(), IGNORE_INDEX);

        for b in 0..batch.batch_size() {
            for t in 0..batch.seq_len() {
                let id = input_ids[[b, t]];
                // Special and pad positions carry zero probability mass.
                let eligible =
                    batch.special_tokens_mask[[b, t]] == 0 && pad_id != Some(id);
                if !eligible || self.rng.random::<f64>() >= self.mask_probability {
                    continue;
                }
                labels[[b, t]] = i64::from(id);
                if self.rng.random::<f64>() < 0.8 {
                    input_ids[[b, t]] = self.mask_id;
                } else if self.rng.random::<f64>() < 0.5 {
                    // Half of the remaining 20%.
                    input_ids[[b, t]] = self.rng.random_range(0..vocab);
                }
            }
        }

        Ok(MaskedBatch { input_ids, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::FixedVocabTokenizer;
    use proptest::prelude::*;

    fn batch_of(rows: &[Vec<u32>]) -> Batch {
        let tok = FixedVocabTokenizer::for_tests();
        Batch::from_rows(rows, &tok).unwrap()
    }

    #[test]
    fn test_mask_probability_one_masks_every_eligible_position() {
        let tok = Arc::new(FixedVocabTokenizer::for_tests());
        let mut collator = MlmCollator::with_seed(tok, 1.0, 7).unwrap();
        let batch = batch_of(&[vec![2, 10, 11, 12, 3]]);

        let masked = collator.collate(&batch).unwrap();
        // CLS and SEP excluded, the three interior tokens labeled.
        assert_eq!(masked.num_target_positions(), 3);
        assert_eq!(masked.labels[[0, 0]], IGNORE_INDEX);
        assert_eq!(masked.labels[[0, 4]], IGNORE_INDEX);
    }

    #[test]
    fn test_mask_probability_zero_masks_nothing() {
        let tok = Arc::new(FixedVocabTokenizer::for_tests());
        let mut collator = MlmCollator::with_seed(tok, 0.0, 7).unwrap();
        let batch = batch_of(&[vec![2, 10, 11, 12, 3]]);

        let masked = collator.collate(&batch).unwrap();
        assert_eq!(masked.num_target_positions(), 0);
        assert_eq!(masked.input_ids, batch.input_ids);
    }

    #[test]
    fn test_pad_positions_never_masked() {
        let tok = Arc::new(FixedVocabTokenizer::for_tests());
        let mut collator = MlmCollator::with_seed(tok, 1.0, 3).unwrap();
        // Ragged rows: second row gets padded.
        let batch = batch_of(&[vec![10, 11, 12, 13], vec![10, 11]]);

        let masked = collator.collate(&batch).unwrap();
        assert_eq!(masked.labels[[1, 2]], IGNORE_INDEX);
        assert_eq!(masked.labels[[1, 3]], IGNORE_INDEX);
        assert_eq!(masked.input_ids[[1, 2]], batch.input_ids[[1, 2]]);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let tok = Arc::new(FixedVocabTokenizer::for_tests());
        let batch = batch_of(&[vec![10, 11, 12, 13, 14, 15]]);

        let mut a = MlmCollator::with_seed(tok.clone(), 0.5, 42).unwrap();
        let mut b = MlmCollator::with_seed(tok, 0.5, 42).unwrap();
        let ma = a.collate(&batch).unwrap();
        let mb = b.collate(&batch).unwrap();
        assert_eq!(ma.input_ids, mb.input_ids);
        assert_eq!(ma.labels, mb.labels);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let tok = Arc::new(FixedVocabTokenizer::for_tests());
        let mut collator = MlmCollator::with_seed(tok, 0.15, 1).unwrap();
        let batch = Batch::new(Array2::zeros((0, 0)), Array2::zeros((0, 0))).unwrap();
        assert!(matches!(collator.collate(&batch), Err(Error::EmptyBatch)));
    }

    proptest! {
        // Unlabeled positions are returned untouched, and labeled positions
        // preserve the original id in the label.
        #[test]
        fn prop_labels_are_consistent(seed in 0u64..500, p in 0.0f64..1.0) {
            let tok = Arc::new(FixedVocabTokenizer::for_tests());
            let mut collator = MlmCollator::with_seed(tok, p, seed).unwrap();
            let batch = batch_of(&[vec![2, 10, 11, 12, 13, 14, 3]]);

            let masked = collator.collate(&batch).unwrap();
            for b in 0..batch.batch_size() {
                for t in 0..batch.seq_len() {
                    let label = masked.labels[[b, t]];
                    if label == IGNORE_INDEX {
                        prop_assert_eq!(masked.input_ids[[b, t]], batch.input_ids[[b, t]]);
                    } else {
                        prop_assert_eq!(label, i64::from(batch.input_ids[[b, t]]));
                        prop_assert_eq!(batch.special_tokens_mask[[b, t]], 0);
                    }
                }
            }
        }
    }
}
