//! End-to-end test: curriculum resolution, collator dispatch, and
//! difficulty scoring against a stub trainer.

use std::sync::Arc;

use ndarray::{Array3, ArrayView2};

use enmascarar::{
    compute_perplexity, get_difficulty_scorer, load_collator, Batch, Curriculum,
    CurriculumConfig, Error, FixedVocabTokenizer, MaskedLanguageModel, MaskingTokenizer,
    ScorerKwargs, Trainer, IGNORE_INDEX,
};

const CURRICULUM_YAML: &str = r#"
steps:
  0: mlm
  100: pos
units:
  mlm:
    name: mlm
    mask_probability: 0.15
  pos:
    name: pos
    mask_probability: 0.3
    num_mask_patterns: 2
    mask_pattern_size: 2
    probabilistic_masking: false
"#;

fn curriculum() -> Curriculum {
    let config: CurriculumConfig = serde_yaml::from_str(CURRICULUM_YAML).unwrap();
    Curriculum::new(config).unwrap()
}

/// Prefers low token ids: logit of token id `v` is `-(v as f32) * 0.1`, the
/// same for every position, so perplexities are deterministic and
/// hand-checkable.
struct SlopedModel {
    vocab: usize,
}

impl MaskedLanguageModel for SlopedModel {
    fn forward(&self, input_ids: ArrayView2<'_, u32>) -> Array3<f32> {
        let (rows, cols) = input_ids.dim();
        let mut logits = Array3::zeros((rows, cols, self.vocab));
        for r in 0..rows {
            for c in 0..cols {
                for v in 0..self.vocab {
                    logits[[r, c, v]] = -(v as f32) * 0.1;
                }
            }
        }
        logits
    }
}

struct StubTrainer {
    model: SlopedModel,
    tokenizer: Arc<FixedVocabTokenizer>,
    curriculum: Curriculum,
}

impl StubTrainer {
    fn new() -> Arc<Self> {
        let tokenizer = Arc::new(FixedVocabTokenizer::for_tests());
        Arc::new(Self {
            model: SlopedModel { vocab: tokenizer.vocab_size() },
            tokenizer,
            curriculum: curriculum(),
        })
    }
}

impl Trainer for StubTrainer {
    fn model(&self) -> &dyn MaskedLanguageModel {
        &self.model
    }

    fn tokenizer(&self) -> Arc<dyn MaskingTokenizer> {
        self.tokenizer.clone()
    }

    fn objective_curriculum(&self) -> &Curriculum {
        &self.curriculum
    }
}

#[test]
fn schedule_scenario_from_configuration() {
    let curriculum = curriculum();
    assert_eq!(curriculum.active_unit_name(0), "mlm");
    assert_eq!(curriculum.active_unit_name(50), "mlm");
    assert_eq!(curriculum.active_unit_name(100), "pos");
    assert_eq!(curriculum.active_unit_name(150), "mlm");
}

#[test]
fn dispatch_follows_schedule_and_masks_batches() {
    let curriculum = curriculum();
    let tokenizer = Arc::new(FixedVocabTokenizer::for_tests());
    let batch = Batch::from_rows(
        &[vec![2, 10, 11, 12, 13, 3], vec![2, 14, 15, 16, 3]],
        &*tokenizer,
    )
    .unwrap();

    for (step, expected) in [(0, "mlm"), (50, "mlm"), (100, "pos")] {
        let mut collator = load_collator(&curriculum, tokenizer.clone(), step).unwrap();
        assert_eq!(collator.name(), expected, "step {step}");

        let masked = collator.collate(&batch).unwrap();
        assert_eq!(masked.input_ids.dim(), batch.input_ids.dim());
        for b in 0..batch.batch_size() {
            for t in 0..batch.seq_len() {
                if batch.special_tokens_mask[[b, t]] == 1 {
                    assert_eq!(masked.labels[[b, t]], IGNORE_INDEX);
                }
            }
        }
    }
}

#[test]
fn dispatch_rejects_unknown_objective() {
    let yaml = CURRICULUM_YAML.replace("  100: pos", "  100: span")
        + "  span:\n    name: span\n    mask_probability: 0.1\n";
    let config: CurriculumConfig = serde_yaml::from_str(&yaml).unwrap();
    let curriculum = Curriculum::new(config).unwrap();
    let tokenizer = Arc::new(FixedVocabTokenizer::for_tests());

    assert!(matches!(
        load_collator(&curriculum, tokenizer, 100),
        Err(Error::UnsupportedObjective { .. })
    ));
}

#[test]
fn factory_builds_wired_scorers() {
    let trainer: Arc<dyn Trainer> = StubTrainer::new();
    let dataset = vec![
        vec![10, 10, 10, 10, 10, 10],
        vec![10, 17, 23, 5, 29, 12],
        vec![2, 11, 12, 3],
    ];

    let mut ngram =
        get_difficulty_scorer("ngram_perplexity", &ScorerKwargs::default(), &trainer).unwrap();
    let bound = ngram.bound_tokenizer().unwrap();
    assert!(Arc::ptr_eq(&bound, &trainer.tokenizer()));
    let scores = ngram.score_difficulty(&dataset, &[0, 1, 2], 0).unwrap();
    assert_eq!(scores.len(), 3);
    assert!(scores[0] < scores[1]);

    let kwargs = ScorerKwargs { scoring_batch_size: Some(2), ..ScorerKwargs::default() };
    let mut model_scorer = get_difficulty_scorer("model_perplexity", &kwargs, &trainer).unwrap();
    let scores = model_scorer.score_difficulty(&dataset, &[0, 1, 2], 500).unwrap();
    assert_eq!(scores.len(), 3);
    assert!(scores.iter().all(|s| s.is_finite()));
}

#[test]
fn model_prefers_low_ids_so_low_id_examples_are_easier() {
    let trainer = StubTrainer::new();
    let tokenizer = trainer.tokenizer();
    // Token 4 is far more likely than token 30 under the sloped model.
    let easy = Batch::from_rows(&[vec![4, 4, 4]], &*tokenizer).unwrap();
    let hard = Batch::from_rows(&[vec![30, 30, 30]], &*tokenizer).unwrap();

    let easy_ppl = compute_perplexity(&easy, &*tokenizer, &*trainer).unwrap()[0];
    let hard_ppl = compute_perplexity(&hard, &*tokenizer, &*trainer).unwrap()[0];
    assert!(easy_ppl < hard_ppl, "easy {easy_ppl} vs hard {hard_ppl}");
}

#[test]
fn perplexity_matches_hand_computation() {
    let trainer = StubTrainer::new();
    let tokenizer = trainer.tokenizer();
    let vocab = tokenizer.vocab_size();
    let batch = Batch::from_rows(&[vec![5, 9]], &*tokenizer).unwrap();

    // log-softmax of token v under the sloped model, identical per position.
    let log_z: f64 = (0..vocab).map(|v| (-(v as f64) * 0.1).exp()).sum::<f64>().ln();
    let loss_of = |v: u32| -(-(f64::from(v)) * 0.1 - log_z);
    let expected = ((loss_of(5) + loss_of(9)) / 2.0).exp() as f32;

    let ppl = compute_perplexity(&batch, &*tokenizer, &*trainer).unwrap()[0];
    assert!((ppl - expected).abs() / expected < 1e-3, "{ppl} vs {expected}");
}
