//! Masked cross-entropy over per-position vocabulary logits.

use ndarray::{Array2, Array3, ArrayView1};

use crate::batch::IGNORE_INDEX;
use crate::error::{Error, Result};

/// How a loss tensor is reduced before being returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// Mean over positions that carry a label.
    #[default]
    Mean,
    /// No reduction: one loss value per position, zero where ignored.
    None,
}

/// Output of a loss computation.
#[derive(Debug, Clone)]
pub enum Loss {
    /// Reduced scalar loss.
    Scalar(f32),
    /// Per-position losses, `(batch_size, seq_len)`, zero at ignored
    /// positions.
    PerToken(Array2<f32>),
}

impl Loss {
    /// Extract the scalar value, if this loss was reduced.
    pub fn scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::PerToken(_) => None,
        }
    }
}

/// Numerically stable log-softmax of one logit row.
fn log_softmax_at(row: ArrayView1<'_, f32>, index: usize) -> f32 {
    let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let log_sum: f32 = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln();
    row[index] - max - log_sum
}

/// Cross-entropy between `logits` `(batch, seq, vocab)` and integer `labels`
/// `(batch, seq)`, skipping positions labeled [`IGNORE_INDEX`].
///
/// With [`Reduction::Mean`] and no labeled positions the result is NaN
/// rather than a silent zero.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] when label and logit dims disagree or a
/// label falls outside the vocabulary.
pub fn masked_cross_entropy(
    logits: &Array3<f32>,
    labels: &Array2<i64>,
    reduction: Reduction,
) -> Result<Loss> {
    let (batch, seq, vocab) = logits.dim();
    if labels.dim() != (batch, seq) {
        return Err(Error::ShapeMismatch {
            expected: vec![batch, seq],
            actual: vec![labels.nrows(), labels.ncols()],
        });
    }

    let mut per_token = Array2::<f32>::zeros((batch, seq));
    let mut labeled = 0usize;
    for b in 0..batch {
        for t in 0..seq {
            let label = labels[[b, t]];
            if label == IGNORE_INDEX {
                continue;
            }
            if label < 0 || label as usize >= vocab {
                return Err(Error::ShapeMismatch {
                    expected: vec![vocab],
                    actual: vec![label.unsigned_abs() as usize],
                });
            }
            let row = logits.slice(ndarray::s![b, t, ..]);
            per_token[[b, t]] = -log_softmax_at(row, label as usize);
            labeled += 1;
        }
    }

    match reduction {
        Reduction::None => Ok(Loss::PerToken(per_token)),
        Reduction::Mean => {
            if labeled == 0 {
                return Ok(Loss::Scalar(f32::NAN));
            }
            Ok(Loss::Scalar(per_token.sum() / labeled as f32))
        }
    }
}
