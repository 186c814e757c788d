//! Batch collation for masking objectives.
//!
//! [`load_collator`] is the dispatch point the training loop calls each time
//! the schedule transitions: it resolves the active objective for the step
//! and materializes the matching collation strategy.

mod mlm;
mod whole_word;

use std::sync::Arc;

pub use mlm::MlmCollator;
pub use whole_word::WholeWordMaskCollator;

use crate::batch::{Batch, MaskedBatch};
use crate::curriculum::{Curriculum, MLM_UNIT};
use crate::error::{Error, Result};
use crate::tokenizer::MaskingTokenizer;

/// Turns raw batches into model-ready masked batches.
///
/// Collators are constructed per objective transition and hold their own
/// RNG; `collate` takes `&mut self` for sampling only.
pub trait Collator: Send {
    /// Objective name this collator implements.
    fn name(&self) -> &str;

    /// Mask a batch, producing substituted inputs and loss labels.
    fn collate(&mut self, batch: &Batch) -> Result<MaskedBatch>;
}

/// Load the data collator for the objective active at `step`.
///
/// Resolves the active unit name through the curriculum schedule, then
/// dispatches: `"mlm"` builds a [`MlmCollator`] from the mlm unit's mask
/// probability, `"pos"` builds a [`WholeWordMaskCollator`] from the full
/// `"pos"` unit. Any other resolved name is unsupported and fatal: the
/// training loop cannot proceed without a collator.
///
/// # Errors
/// [`Error::UnsupportedObjective`] for unknown names,
/// [`Error::MissingMaskToken`] when the tokenizer cannot mask.
pub fn load_collator(
    curriculum: &Curriculum,
    tokenizer: Arc<dyn MaskingTokenizer>,
    step: u64,
) -> Result<Box<dyn Collator>> {
    let name = curriculum.active_unit_name(step);
    tracing::info!("Loading '{}' objective collator at step {}", name, step);

    match name {
        MLM_UNIT => {
            let unit = curriculum.mlm_unit();
            Ok(Box::new(MlmCollator::new(tokenizer, unit.mask_probability)?))
        }
        "pos" => {
            let unit = curriculum
                .units()
                .get("pos")
                .ok_or_else(|| Error::UnsupportedObjective { name: name.to_string() })?;
            Ok(Box::new(WholeWordMaskCollator::new(tokenizer, unit.clone(), step)?))
        }
        other => Err(Error::UnsupportedObjective { name: other.to_string() }),
    }
}
