//! Objective curriculum: step-indexed schedule of masking objectives.
//!
//! A [`Curriculum`] owns the `step -> unit name` schedule and the
//! `unit name -> ObjectiveUnit` definitions. It is built once from
//! configuration before training starts and is read-only afterwards, so
//! concurrent readers need no locking.

mod schedule;
mod unit;

pub use schedule::{Curriculum, CurriculumConfig, MLM_UNIT};
pub use unit::ObjectiveUnit;
