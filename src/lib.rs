//! Curriculum-driven objective scheduling for masked-LM pretraining
//!
//! This crate decides, at every training step, which masking objective is
//! active and how batches are collated for it, and ranks training examples
//! by difficulty for curriculum ordering:
//!
//! - Objective curriculum: step-indexed schedule resolving the active
//!   objective unit (`"mlm"` fallback for unscheduled steps)
//! - Collator dispatch: materializes the masked-LM or whole-word-masking
//!   collation strategy for the resolved objective
//! - Difficulty scorers: a registry/factory of pluggable scoring
//!   strategies with capability-based injection of the tokenizer and the
//!   live trainer
//! - Pseudo-perplexity estimation: scores every maskable position of a
//!   batch independently in chunked forward passes
//!
//! The model, tokenizer and outer training loop are external collaborators
//! behind the [`model::MaskedLanguageModel`], [`model::Trainer`] and
//! [`tokenizer::MaskingTokenizer`] traits.
//!
//! # Example
//!
//! ```
//! use enmascarar::collator::load_collator;
//! use enmascarar::curriculum::{Curriculum, CurriculumConfig, ObjectiveUnit};
//! use enmascarar::tokenizer::FixedVocabTokenizer;
//! use std::sync::Arc;
//!
//! let config = CurriculumConfig {
//!     steps: [(0, "mlm".to_string())].into(),
//!     units: [("mlm".to_string(), ObjectiveUnit::mlm(0.15))].into(),
//! };
//! let curriculum = Curriculum::new(config)?;
//! let tokenizer = Arc::new(FixedVocabTokenizer::for_tests());
//!
//! let collator = load_collator(&curriculum, tokenizer, 42)?;
//! assert_eq!(collator.name(), "mlm");
//! # Ok::<(), enmascarar::Error>(())
//! ```

pub mod batch;
pub mod collator;
pub mod curriculum;
pub mod error;
pub mod loss;
pub mod model;
pub mod perplexity;
pub mod scorer;
pub mod tokenizer;

pub use batch::{Batch, MaskedBatch, IGNORE_INDEX};
pub use collator::{load_collator, Collator, MlmCollator, WholeWordMaskCollator};
pub use curriculum::{Curriculum, CurriculumConfig, ObjectiveUnit, MLM_UNIT};
pub use error::{Error, Result};
pub use loss::{masked_cross_entropy, Loss, Reduction};
pub use model::{MaskedLanguageModel, Trainer};
pub use perplexity::{compute_perplexity, compute_perplexity_chunked, PERPLEXITY_CHUNK_ROWS};
pub use scorer::{
    get_difficulty_scorer, DifficultyScorer, DifficultyScorerRegistry, ModelPerplexityScorer,
    NGramPerplexityScorer, ScorerKwargs,
};
pub use tokenizer::{FixedVocabTokenizer, MaskingTokenizer, TokenId};
