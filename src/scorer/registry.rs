//! Scorer registry and factory.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use super::{DifficultyScorer, ModelPerplexityScorer, NGramPerplexityScorer, ScorerKwargs};
use crate::error::{Error, Result};
use crate::model::Trainer;

/// Constructor signature registered per scorer name.
pub type ScorerCtor = fn(&ScorerKwargs) -> Result<Box<dyn DifficultyScorer>>;

/// Static `name -> constructor` table. Built once at startup through an
/// explicit registration list and read-only thereafter.
pub struct DifficultyScorerRegistry {
    entries: HashMap<&'static str, ScorerCtor>,
}

impl DifficultyScorerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Registry containing every built-in scorer.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(NGramPerplexityScorer::NAME, |kwargs| {
            Ok(Box::new(NGramPerplexityScorer::from_kwargs(kwargs)?))
        });
        registry.register(ModelPerplexityScorer::NAME, |kwargs| {
            Ok(Box::new(ModelPerplexityScorer::from_kwargs(kwargs)?))
        });
        registry
    }

    /// Register a constructor under a name.
    pub fn register(&mut self, name: &'static str, ctor: ScorerCtor) {
        self.entries.insert(name, ctor);
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Construct a scorer and inject its declared dependencies.
    ///
    /// The scorer is built from `kwargs`, then wired: a declared trainer
    /// dependency receives a non-owning handle to `trainer`, a declared
    /// tokenizer dependency receives the trainer's tokenizer. The returned
    /// scorer needs no further setup.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedScorer`] for unknown names; constructor
    /// errors propagate.
    pub fn build(
        &self,
        name: &str,
        kwargs: &ScorerKwargs,
        trainer: &Arc<dyn Trainer>,
    ) -> Result<Box<dyn DifficultyScorer>> {
        let ctor = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnsupportedScorer { name: name.to_string() })?;
        let mut scorer = ctor(kwargs)?;

        if scorer.uses_trainer() {
            scorer.bind_trainer(Arc::downgrade(trainer));
        }
        if scorer.uses_tokenizer() {
            let tokenizer = trainer.tokenizer();
            // Tokenizer compatibility is validated before the trainer is
            // built; by this point incompatibility is an internal bug.
            assert!(
                tokenizer.supports_offsets(),
                "scorer '{name}' requires an offset-capable tokenizer"
            );
            scorer.bind_tokenizer(tokenizer);
        }
        Ok(scorer)
    }
}

impl Default for DifficultyScorerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Process-wide registry of built-in scorers.
pub static DIFFICULTY_SCORER_REGISTRY: LazyLock<DifficultyScorerRegistry> =
    LazyLock::new(DifficultyScorerRegistry::with_builtins);

/// Build a fully wired difficulty scorer from the process-wide registry.
///
/// # Errors
/// Returns [`Error::UnsupportedScorer`] if `name` is not registered.
pub fn get_difficulty_scorer(
    name: &str,
    kwargs: &ScorerKwargs,
    trainer: &Arc<dyn Trainer>,
) -> Result<Box<dyn DifficultyScorer>> {
    DIFFICULTY_SCORER_REGISTRY.build(name, kwargs, trainer)
}
