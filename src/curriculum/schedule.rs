//! Step-indexed objective schedule.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::ObjectiveUnit;
use crate::error::{Error, Result};

/// Name of the fallback objective unit. Always present in a valid
/// curriculum: it is the answer for unscheduled steps and it owns the loss
/// routine perplexity scoring relies on.
pub const MLM_UNIT: &str = "mlm";

/// Curriculum definition as handed over by the external configuration
/// loader: transition steps and unit definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumConfig {
    /// Training steps at which an objective becomes active.
    pub steps: BTreeMap<u64, String>,
    /// Objective definitions by unit name.
    pub units: HashMap<String, ObjectiveUnit>,
}

/// Validated, read-only objective curriculum.
///
/// # Example
///
/// ```
/// use enmascarar::curriculum::{Curriculum, CurriculumConfig, ObjectiveUnit};
///
/// let config = CurriculumConfig {
///     steps: [(0, "mlm".to_string())].into(),
///     units: [("mlm".to_string(), ObjectiveUnit::mlm(0.15))].into(),
/// };
/// let curriculum = Curriculum::new(config)?;
///
/// assert_eq!(curriculum.active_unit_name(0), "mlm");
/// assert_eq!(curriculum.active_unit_name(999), "mlm");
/// # Ok::<(), enmascarar::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Curriculum {
    steps: BTreeMap<u64, String>,
    units: HashMap<String, ObjectiveUnit>,
}

impl Curriculum {
    /// Validate a configuration into a curriculum.
    ///
    /// # Errors
    /// Returns [`Error::MissingMlmUnit`] when `"mlm"` is not defined and
    /// [`Error::UnsupportedObjective`] when a scheduled step names an
    /// undefined unit.
    pub fn new(config: CurriculumConfig) -> Result<Self> {
        if !config.units.contains_key(MLM_UNIT) {
            return Err(Error::MissingMlmUnit);
        }
        for name in config.steps.values() {
            if !config.units.contains_key(name) {
                return Err(Error::UnsupportedObjective { name: name.clone() });
            }
        }
        Ok(Self { steps: config.steps, units: config.units })
    }

    /// Name of the objective active at `step`.
    ///
    /// The schedule records transition steps only; a step with no exact
    /// entry resolves to [`MLM_UNIT`]. This lookup never fails and mutates
    /// nothing.
    pub fn active_unit_name(&self, step: u64) -> &str {
        self.steps.get(&step).map_or(MLM_UNIT, String::as_str)
    }

    /// Objective definitions by name.
    pub fn units(&self) -> &HashMap<String, ObjectiveUnit> {
        &self.units
    }

    /// The unit active at `step`.
    ///
    /// Infallible for a validated curriculum: the schedule only references
    /// defined units and `"mlm"` is always defined.
    pub fn active_unit(&self, step: u64) -> &ObjectiveUnit {
        let name = self.active_unit_name(step);
        self.units.get(name).unwrap_or_else(|| &self.units[MLM_UNIT])
    }

    /// The `"mlm"` unit.
    pub fn mlm_unit(&self) -> &ObjectiveUnit {
        &self.units[MLM_UNIT]
    }

    /// Scheduled transition steps.
    pub fn steps(&self) -> &BTreeMap<u64, String> {
        &self.steps
    }
}
