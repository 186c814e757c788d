//! Pseudo-perplexity estimation via exhaustive single-token masking.
//!
//! For every example, every non-special position is masked in its own
//! variant and scored in one (chunked) forward sweep. This is the
//! performance-critical path of difficulty scoring: the variant tensor is
//! `seq_len` times the original batch, so forward passes run in bounded
//! chunks.

use ndarray::{s, Array2};

use crate::batch::{Batch, IGNORE_INDEX};
use crate::error::{Error, Result};
use crate::loss::{Loss, Reduction};
use crate::model::Trainer;
use crate::tokenizer::{MaskingTokenizer, TokenId};

/// Upper bound on variant rows per forward pass.
pub const PERPLEXITY_CHUNK_ROWS: usize = 128;

/// Compute per-example pseudo-perplexity of a batch under the trainer's
/// current model.
///
/// Algorithm: for an example of length `L`, build `L` variants where
/// variant `i` masks only position `i`; labels carry the original id at the
/// masked position and [`IGNORE_INDEX`] everywhere else, with special-token
/// positions never scored. Variant losses come from the `"mlm"` unit's loss
/// routine, are summed per variant (at most one position contributes),
/// averaged over `L`, and exponentiated.
///
/// An example with no scorable position (e.g. all special tokens) yields
/// `NaN` rather than a silently well-defined mean.
///
/// Deterministic: repeated calls with a fixed model return identical
/// values.
///
/// # Errors
/// [`Error::MissingMaskToken`] if the tokenizer cannot mask, and
/// [`Error::EmptyBatch`] for a zero-sized batch.
pub fn compute_perplexity(
    batch: &Batch,
    tokenizer: &dyn MaskingTokenizer,
    trainer: &dyn Trainer,
) -> Result<Vec<f32>> {
    compute_perplexity_chunked(batch, tokenizer, trainer, PERPLEXITY_CHUNK_ROWS)
}

/// [`compute_perplexity`] with an explicit chunk size, for callers that
/// need to bound peak memory differently.
pub fn compute_perplexity_chunked(
    batch: &Batch,
    tokenizer: &dyn MaskingTokenizer,
    trainer: &dyn Trainer,
    chunk_rows: usize,
) -> Result<Vec<f32>> {
    let mask_id = tokenizer.mask_token_id().ok_or(Error::MissingMaskToken)?;
    if batch.is_empty() {
        return Err(Error::EmptyBatch);
    }
    let batch_size = batch.batch_size();
    let seq_len = batch.seq_len();
    let chunk_rows = chunk_rows.max(1);

    let (masked_input, labels) = build_masked_variants(batch, mask_id);

    // The mlm unit always exists in a validated curriculum and owns the
    // loss routine used for scoring.
    let mlm_unit = trainer.objective_curriculum().mlm_unit();
    let model = trainer.model();

    let total_rows = batch_size * seq_len;
    let mut variant_loss = vec![0f32; total_rows];
    let mut row = 0;
    while row < total_rows {
        let end = (row + chunk_rows).min(total_rows);
        let inputs = masked_input.slice(s![row..end, ..]);
        let chunk_labels = labels.slice(s![row..end, ..]).to_owned();

        let hidden_states = model.forward(inputs);
        let loss = mlm_unit.compute_loss(&hidden_states, &chunk_labels, Reduction::None)?;
        let Loss::PerToken(per_token) = loss else {
            return Err(Error::internal("unreduced loss expected for perplexity"));
        };
        // At most one position per variant is non-ignored; summing the row
        // recovers that variant's loss.
        for (offset, variant_row) in per_token.outer_iter().enumerate() {
            variant_loss[row + offset] = variant_row.sum();
        }
        row = end;
    }

    let mut perplexities = Vec::with_capacity(batch_size);
    for example in 0..batch_size {
        let rows = &variant_loss[example * seq_len..(example + 1) * seq_len];
        let scored = (0..seq_len)
            .filter(|&i| labels[[example * seq_len + i, i]] != IGNORE_INDEX)
            .count();
        if scored == 0 {
            tracing::warn!("Example {} has no scorable positions, perplexity undefined", example);
            perplexities.push(f32::NAN);
            continue;
        }
        let mean_loss = rows.iter().sum::<f32>() / seq_len as f32;
        perplexities.push(mean_loss.exp());
    }
    Ok(perplexities)
}

/// Build the `(batch * seq_len, seq_len)` variant tensor and its labels.
///
/// Variant row `e * seq_len + i` is example `e` with position `i` replaced
/// by the mask token; its label row carries the original id at `i` unless
/// that position is special.
fn build_masked_variants(batch: &Batch, mask_id: TokenId) -> (Array2<u32>, Array2<i64>) {
    let batch_size = batch.batch_size();
    let seq_len = batch.seq_len();
    let mut masked_input = Array2::<u32>::zeros((batch_size * seq_len, seq_len));
    let mut labels = Array2::<i64>::from_elem((batch_size * seq_len, seq_len), IGNORE_INDEX);

    for example in 0..batch_size {
        for i in 0..seq_len {
            let row = example * seq_len + i;
            for t in 0..seq_len {
                masked_input[[row, t]] = batch.input_ids[[example, t]];
            }
            masked_input[[row, i]] = mask_id;
            if batch.special_tokens_mask[[example, i]] == 0 {
                labels[[row, i]] = i64::from(batch.input_ids[[example, i]]);
            }
        }
    }
    (masked_input, labels)
}
