/// Plays a few synthetic scenes with the scripted generator and oracle and the
/// (untrained) baseline neural guesser, then prints the transcript.
///
/// Usage: self_play_demo [sample] [seed]
use burn::backend::NdArray;
use burn::tensor::{Bool, Int, Tensor, TensorData};
use guesswhat_self_play::answer::{AnswerLabel, AnswerVocab};
use guesswhat_self_play::evaluation::{Detokenizer, EvalConfig, Evaluator, LabelledBatch, QuestionSource};
use guesswhat_self_play::neural::{DialogGuesser, GuesserConfig};
use guesswhat_self_play::scripted::{ScriptedGenerator, ScriptedOracle};
use guesswhat_self_play::self_play::{SelfPlay, SelfPlayConfig};
use guesswhat_self_play::utils::{Game, SceneBatch, SpecialTokens, TokenId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::env;

type Backend = NdArray;

const CATEGORIES: [&str; 6] = ["person", "cup", "dog", "chair", "car", "book"];
const FIRST_WORD: TokenId = 7;
const BATCH: usize = 4;
const OBJECTS: usize = 5;
const BOX_DIM: usize = 8;
const FEAT_DIM: usize = 16;

struct DemoVocab;

impl Detokenizer for DemoVocab {
    fn decode(&self, tokens: &[TokenId]) -> String {
        tokens
            .iter()
            .map(|&t| match t {
                0 => "<pad>".to_string(),
                1 => "<start>".to_string(),
                2 => "?".to_string(),
                3 => "<stop>".to_string(),
                4 => "yes".to_string(),
                5 => "no".to_string(),
                6 => "n/a".to_string(),
                w => CATEGORIES
                    .get((w - FIRST_WORD) as usize)
                    .map(|c| format!("is it a {c}"))
                    .unwrap_or_else(|| format!("<{w}>")),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn random_batch(rng: &mut StdRng, first_id: u64) -> LabelledBatch<Backend> {
    let device = Default::default();
    let mut categories = Vec::with_capacity(BATCH * OBJECTS);
    let mut mask = Vec::with_capacity(BATCH * OBJECTS);
    let mut labels = Vec::with_capacity(BATCH);
    let bboxes: Vec<f32> = (0..BATCH * OBJECTS * BOX_DIM).map(|_| rng.random::<f32>()).collect();
    for _ in 0..BATCH {
        let valid = rng.random_range(2..=OBJECTS);
        for o in 0..OBJECTS {
            categories.push(rng.random_range(0..CATEGORIES.len()) as TokenId);
            mask.push(o < valid);
        }
        labels.push(rng.random_range(0..valid));
    }
    let target_category: Vec<TokenId> = labels.iter().enumerate().map(|(b, &l)| categories[b * OBJECTS + l]).collect();
    let target_bbox: Vec<f32> = labels
        .iter()
        .enumerate()
        .flat_map(|(b, &l)| bboxes[(b * OBJECTS + l) * BOX_DIM..(b * OBJECTS + l + 1) * BOX_DIM].to_vec())
        .collect();
    let features = |n: usize, rng: &mut StdRng| -> Vec<f32> { (0..n).map(|_| rng.random::<f32>()).collect() };

    let scene = SceneBatch {
        games: (0..BATCH as u64).map(|i| Game { id: first_id + i }).collect(),
        object_features: Tensor::from_data(TensorData::new(features(BATCH * OBJECTS * FEAT_DIM, rng), [BATCH, OBJECTS, FEAT_DIM]), &device),
        target_category: Tensor::<Backend, 1, Int>::from_data(TensorData::new(target_category, [BATCH]), &device),
        target_bbox: Tensor::from_data(TensorData::new(target_bbox, [BATCH, BOX_DIM]), &device),
        target_image_feature: Tensor::from_data(TensorData::new(features(BATCH * FEAT_DIM, rng), [BATCH, FEAT_DIM]), &device),
        categories: Tensor::<Backend, 2, Int>::from_data(TensorData::new(categories, [BATCH, OBJECTS]), &device),
        bboxes: Tensor::from_data(TensorData::new(bboxes, [BATCH, OBJECTS, BOX_DIM]), &device),
        bbox_mask: Tensor::<Backend, 2, Bool>::from_data(TensorData::new(mask, [BATCH, OBJECTS]), &device),
    };
    LabelledBatch { scene, labels, questions: None }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let greedy = !(args.len() > 1 && args[1] == "sample");
    let seed = args.get(2).and_then(|s| s.parse::<u64>().ok()).unwrap_or(42);

    let mut rng = StdRng::seed_from_u64(seed);
    let device = Default::default();
    let tokens = SpecialTokens::default();
    let vocab = match AnswerVocab::new(
        [(AnswerLabel::Yes, 0), (AnswerLabel::No, 1), (AnswerLabel::NotApplicable, 2)],
        [(AnswerLabel::Yes, 4), (AnswerLabel::No, 5), (AnswerLabel::NotApplicable, 6)],
    ) {
        Ok(vocab) => vocab,
        Err(e) => {
            eprintln!("bad answer vocabulary: {e}");
            std::process::exit(1);
        }
    };

    let words: Vec<TokenId> = (0..CATEGORIES.len() as TokenId).map(|c| FIRST_WORD + c).collect();
    let stop_after: Vec<Option<usize>> = (0..BATCH).map(|_| rng.random_bool(0.7).then(|| rng.random_range(1..=4))).collect();
    let qgen = ScriptedGenerator::new(words, stop_after).with_seed(seed);
    let oracle = ScriptedOracle::category_match(FIRST_WORD, 0, 1, 2);
    let guesser_config = GuesserConfig {
        num_words: FIRST_WORD as usize + CATEGORIES.len(),
        num_categories: CATEGORIES.len(),
        bbox_dim: BOX_DIM,
        hidden_size: 32,
    };
    let guesser = DialogGuesser::<Backend>::new(&guesser_config, &device);
    let mut players: SelfPlay<Backend, _, _, _> = SelfPlay::new(qgen, oracle, guesser, vocab, tokens);

    let batches: Vec<_> = (0..3).map(|i| random_batch(&mut rng, 1000 + i * BATCH as u64)).collect();
    let config = EvalConfig {
        play: SelfPlayConfig { max_turns: 5, max_question_len: 20, greedy },
        source: QuestionSource::SelfPlay,
    };
    println!("=== Self-play demo ({} decoding, seed {}) ===", if greedy { "greedy" } else { "sampled" }, seed);
    let mut evaluator = Evaluator::new(config, std::io::stdout());
    match evaluator.run(&mut players, batches, &DemoVocab) {
        Ok(report) => println!("Accuracy: {:.3} over {} games ({} batches hit the turn cap)", report.accuracy(), report.total, report.capped_batches),
        Err(e) => {
            eprintln!("self-play failed: {e}");
            std::process::exit(1);
        }
    }
}
