//! Objective unit configuration.

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loss::{masked_cross_entropy, Loss, Reduction};

/// Named configuration record for one masking objective.
///
/// `name` and `mask_probability` drive the plain masked-LM collator; the
/// remaining knobs parameterize whole-word masking. Immutable once loaded;
/// owned by the [`Curriculum`](super::Curriculum).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveUnit {
    /// Objective name, e.g. `"mlm"` or `"pos"`.
    pub name: String,
    /// Fraction of eligible positions selected for masking.
    pub mask_probability: f64,
    /// Number of precomputed mask layouts to choose between per example.
    #[serde(default = "default_num_mask_patterns")]
    pub num_mask_patterns: usize,
    /// Tokens masked per selected word start.
    #[serde(default = "default_mask_pattern_size")]
    pub mask_pattern_size: usize,
    /// Sample word starts independently instead of masking a fixed count.
    /// Under this mode an example can come out with no masks at all.
    #[serde(default = "default_probabilistic_masking")]
    pub probabilistic_masking: bool,
    /// Probability that a selected token is left unmasked, at step 0.
    #[serde(default = "default_leave_unmasked_prob")]
    pub leave_unmasked_prob_start: f64,
    /// Probability that a selected token is left unmasked, steady state.
    #[serde(default = "default_leave_unmasked_prob")]
    pub leave_unmasked_prob: f64,
    /// Probability that a selected token is replaced by a random vocabulary
    /// token.
    #[serde(default = "default_random_token_prob")]
    pub random_token_prob: f64,
    /// Force masked word starts to form one contiguous run.
    #[serde(default)]
    pub consecutive_masking: bool,
}

fn default_num_mask_patterns() -> usize {
    1
}

fn default_mask_pattern_size() -> usize {
    1
}

fn default_probabilistic_masking() -> bool {
    true
}

// The standard 80/10/10 split.
fn default_leave_unmasked_prob() -> f64 {
    0.1
}

fn default_random_token_prob() -> f64 {
    0.1
}

impl ObjectiveUnit {
    /// A plain masked-LM unit with the given mask probability and the
    /// standard 80/10/10 substitution split.
    pub fn mlm(mask_probability: f64) -> Self {
        Self {
            name: super::MLM_UNIT.to_string(),
            mask_probability,
            num_mask_patterns: default_num_mask_patterns(),
            mask_pattern_size: default_mask_pattern_size(),
            probabilistic_masking: default_probabilistic_masking(),
            leave_unmasked_prob_start: default_leave_unmasked_prob(),
            leave_unmasked_prob: default_leave_unmasked_prob(),
            random_token_prob: default_random_token_prob(),
            consecutive_masking: false,
        }
    }

    /// Cross-entropy loss of this objective over per-position vocabulary
    /// logits.
    ///
    /// The perplexity estimator borrows this routine from the `"mlm"` unit
    /// with [`Reduction::None`], which is why `"mlm"` must always be present
    /// in the curriculum.
    ///
    /// # Errors
    /// Propagates shape errors from the underlying loss.
    pub fn compute_loss(
        &self,
        hidden_states: &Array3<f32>,
        labels: &Array2<i64>,
        reduction: Reduction,
    ) -> Result<Loss> {
        masked_cross_entropy(hidden_states, labels, reduction)
    }
}
