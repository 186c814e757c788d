//! Seams to the externally-owned model and trainer.
//!
//! The model architecture and the outer training loop live outside this
//! crate; these traits describe the only surface the estimator and the
//! trainer-coupled scorers touch. All tensors are CPU-resident `ndarray`
//! buffers, so there is no separate device-placement step at this layer.

use std::sync::Arc;

use ndarray::{Array3, ArrayView2};

use crate::curriculum::Curriculum;
use crate::tokenizer::MaskingTokenizer;

/// A trained masked language model.
pub trait MaskedLanguageModel: Send + Sync {
    /// Run one forward pass over `(batch, seq)` token ids, producing
    /// per-position vocabulary scores `(batch, seq, vocab)`.
    fn forward(&self, input_ids: ArrayView2<'_, u32>) -> Array3<f32>;
}

/// Handle onto the live trainer state.
///
/// Difficulty scorers hold this only weakly: scoring must not extend the
/// trainer's lifetime, and dropping a scorer must not tear the trainer down.
pub trait Trainer: Send + Sync {
    /// The model being trained.
    fn model(&self) -> &dyn MaskedLanguageModel;

    /// The tokenizer the training data was tokenized with.
    fn tokenizer(&self) -> Arc<dyn MaskingTokenizer>;

    /// The objective curriculum driving training.
    fn objective_curriculum(&self) -> &Curriculum;
}
