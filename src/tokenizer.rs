//! Tokenizer seam for masking objectives.
//!
//! Tokenizer construction and training live outside this crate; collators
//! and scorers only need the mask/pad ids and the special-tokens mask, so
//! that is all the trait asks for.

use std::collections::HashSet;

/// Token ID type.
pub type TokenId = u32;

/// The tokenizer surface required by masking collators and scorers.
pub trait MaskingTokenizer: Send + Sync {
    /// ID of the mask token, if the vocabulary defines one.
    fn mask_token_id(&self) -> Option<TokenId>;

    /// ID of the pad token, if the vocabulary defines one.
    fn pad_token_id(&self) -> Option<TokenId>;

    /// Vocabulary size.
    fn vocab_size(&self) -> usize;

    /// 0/1 mask over `ids` with 1 marking special tokens. The ids are
    /// assumed to already carry their special tokens.
    fn special_tokens_mask(&self, ids: &[TokenId]) -> Vec<u8>;

    /// Whether the tokenizer supports offset-mapping operations. Difficulty
    /// scorers that bind a tokenizer require this capability.
    fn supports_offsets(&self) -> bool {
        true
    }
}

/// A [`MaskingTokenizer`] over a fixed vocabulary, defined entirely by its
/// ids. Deterministic, so tests can pin exact masking behavior.
#[derive(Debug, Clone)]
pub struct FixedVocabTokenizer {
    vocab_size: usize,
    mask_id: Option<TokenId>,
    pad_id: Option<TokenId>,
    special_ids: HashSet<TokenId>,
}

impl FixedVocabTokenizer {
    /// Create a tokenizer from explicit ids. Mask and pad ids are added to
    /// the special set automatically.
    pub fn new(
        vocab_size: usize,
        mask_id: Option<TokenId>,
        pad_id: Option<TokenId>,
        special_ids: impl IntoIterator<Item = TokenId>,
    ) -> Self {
        let mut special: HashSet<TokenId> = special_ids.into_iter().collect();
        special.extend(mask_id);
        special.extend(pad_id);
        Self { vocab_size, mask_id, pad_id, special_ids: special }
    }

    /// Vocabulary of 32 with mask=1, pad=0, cls=2, sep=3.
    pub fn for_tests() -> Self {
        Self::new(32, Some(1), Some(0), [2, 3])
    }

    /// Same layout as [`Self::for_tests`] but without a mask token.
    pub fn without_mask_token() -> Self {
        Self::new(32, None, Some(0), [2, 3])
    }
}

impl MaskingTokenizer for FixedVocabTokenizer {
    fn mask_token_id(&self) -> Option<TokenId> {
        self.mask_id
    }

    fn pad_token_id(&self) -> Option<TokenId> {
        self.pad_id
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn special_tokens_mask(&self, ids: &[TokenId]) -> Vec<u8> {
        ids.iter().map(|id| u8::from(self.special_ids.contains(id))).collect()
    }
}
