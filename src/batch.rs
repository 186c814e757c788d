//! Batch data structures for masked language modeling.

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::tokenizer::{MaskingTokenizer, TokenId};

/// Label value that excludes a position from the loss.
pub const IGNORE_INDEX: i64 = -100;

/// A batch of tokenized sequences, shape `(batch_size, seq_len)`.
///
/// Carries the two tensors the tokenizer conventionally emits: `input_ids`
/// and `special_tokens_mask` (1 marks CLS/SEP/PAD-style positions). Whole
/// word masking additionally consumes `word_starts`, a 0/1 reference layout
/// marking maskable word-start positions.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Token IDs, `(batch_size, seq_len)`.
    pub input_ids: Array2<u32>,
    /// 1 where the position holds a special token, `(batch_size, seq_len)`.
    pub special_tokens_mask: Array2<u8>,
    /// Optional word-boundary reference: 1 marks a maskable word start.
    pub word_starts: Option<Array2<u8>>,
}

impl Batch {
    /// Create a batch from pre-built tensors.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the masks do not match `input_ids`.
    pub fn new(input_ids: Array2<u32>, special_tokens_mask: Array2<u8>) -> Result<Self> {
        if input_ids.dim() != special_tokens_mask.dim() {
            return Err(shape_error(&input_ids, special_tokens_mask.dim()));
        }
        Ok(Self { input_ids, special_tokens_mask, word_starts: None })
    }

    /// Attach a word-start reference layout.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the layout shape differs.
    pub fn with_word_starts(mut self, word_starts: Array2<u8>) -> Result<Self> {
        if self.input_ids.dim() != word_starts.dim() {
            return Err(shape_error(&self.input_ids, word_starts.dim()));
        }
        self.word_starts = Some(word_starts);
        Ok(self)
    }

    /// Build a batch from ragged token rows, padding to the longest row.
    ///
    /// Pad positions are marked as special so they are never masked or
    /// scored. The special-tokens mask for real positions comes from the
    /// tokenizer.
    ///
    /// # Errors
    /// Returns [`Error::EmptyBatch`] for zero rows and
    /// [`Error::MissingPadToken`] when padding is needed but the tokenizer
    /// has no pad token.
    pub fn from_rows(rows: &[Vec<TokenId>], tokenizer: &dyn MaskingTokenizer) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let seq_len = rows.iter().map(Vec::len).max().unwrap_or(0);
        if seq_len == 0 {
            return Err(Error::EmptyBatch);
        }
        let needs_padding = rows.iter().any(|r| r.len() < seq_len);
        let pad_id = match tokenizer.pad_token_id() {
            Some(id) => id,
            None if needs_padding => return Err(Error::MissingPadToken),
            None => 0,
        };

        let mut input_ids = Array2::<u32>::from_elem((rows.len(), seq_len), pad_id);
        let mut special = Array2::<u8>::ones((rows.len(), seq_len));
        for (b, row) in rows.iter().enumerate() {
            let row_special = tokenizer.special_tokens_mask(row);
            for (t, &id) in row.iter().enumerate() {
                input_ids[[b, t]] = id;
                special[[b, t]] = row_special.get(t).copied().unwrap_or(0);
            }
        }
        Self::new(input_ids, special)
    }

    /// Number of examples in the batch.
    pub fn batch_size(&self) -> usize {
        self.input_ids.nrows()
    }

    /// Sequence length of the batch.
    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }

    /// True if the batch has no examples or no positions.
    pub fn is_empty(&self) -> bool {
        self.batch_size() == 0 || self.seq_len() == 0
    }
}

fn shape_error(input_ids: &Array2<u32>, actual: (usize, usize)) -> Error {
    Error::ShapeMismatch {
        expected: vec![input_ids.nrows(), input_ids.ncols()],
        actual: vec![actual.0, actual.1],
    }
}

/// A collated, model-ready batch: masked inputs plus loss labels.
///
/// Positions excluded from the loss carry [`IGNORE_INDEX`] in `labels`.
#[derive(Debug, Clone)]
pub struct MaskedBatch {
    /// Token IDs after mask/random/keep substitution.
    pub input_ids: Array2<u32>,
    /// Original IDs at masked positions, [`IGNORE_INDEX`] elsewhere.
    pub labels: Array2<i64>,
}

impl MaskedBatch {
    /// Count positions that participate in the loss.
    pub fn num_target_positions(&self) -> usize {
        self.labels.iter().filter(|&&l| l != IGNORE_INDEX).count()
    }
}
