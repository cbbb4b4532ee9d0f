//! # Scripted Players
//!
//! Deterministic stand-ins for the three neural players, kept as support for the
//! demo binary and the test suite. They follow a fixed script and remember every
//! call they receive.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use crate::utils::*;

// ---------- Question generator ---------- //
/// Opaque state of the scripted generator: just the turn it produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedState {
    pub turn: usize,
}

/// What the generator was shown on one call
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorCall {
    pub turn: usize,
    pub ended: Vec<bool>,
    pub last_word: Vec<TokenId>,
    pub belief: Vec<f32>,
    pub had_state: bool,
    pub greedy: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshCall {
    pub last_word: Vec<TokenId>,
    pub input_is_token: bool,
}

/// Asks `[word, eoq]` every turn, or a bare `[eoq]` when it has no words.
/// Example `b` reports ended-after on turn `stop_after[b]` (1-based)
pub struct ScriptedGenerator {
    words: Vec<TokenId>,
    stop_after: Vec<Option<usize>>,
    empty: Vec<(usize, usize)>,
    rng: StdRng,
    pub calls: Vec<GeneratorCall>,
    pub refreshes: Vec<RefreshCall>,
}

impl ScriptedGenerator {
    pub fn new(words: Vec<TokenId>, stop_after: Vec<Option<usize>>) -> Self {
        Self {
            words,
            stop_after,
            empty: vec![],
            rng: StdRng::seed_from_u64(0),
            calls: vec![],
            refreshes: vec![],
        }
    }

    /// Example `example` produces a zero-length question on `turn` (0-based)
    pub fn with_empty_question(mut self, example: usize, turn: usize) -> Self {
        self.empty.push((example, turn));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn pick_word(&mut self, turn: usize, example: usize, greedy: bool) -> Option<TokenId> {
        if self.words.is_empty() {
            None
        } else if greedy {
            Some(self.words[(turn + example) % self.words.len()])
        } else {
            Some(self.words[self.rng.random_range(0..self.words.len())])
        }
    }
}

impl<B: Backend> QuestionGenerator<B> for ScriptedGenerator {
    type State = ScriptedState;

    fn generate_sentence(&mut self, request: GenerateRequest<'_, B, ScriptedState>) -> GeneratedQuestions<B, ScriptedState> {
        let device = request.object_features.device();
        let batch = request.ended.len();
        let turn = request.prev_state.map_or(0, |s| s.turn + 1);
        self.calls.push(GeneratorCall {
            turn,
            ended: request.ended.to_vec(),
            last_word: to_tokens(request.last_word),
            belief: to_floats(request.belief),
            had_state: request.prev_state.is_some(),
            greedy: request.greedy,
        });

        let mut tokens = Vec::with_capacity(batch);
        let mut lengths = Vec::with_capacity(batch);
        let mut ended_after = Vec::with_capacity(batch);
        for b in 0..batch {
            let mut question: Segment = self.pick_word(turn, b, request.greedy).into_iter().collect();
            question.push(request.eoq_token);
            question.truncate(request.max_len.max(1));
            let length = if self.empty.contains(&(b, turn)) { 0 } else { question.len() };
            tokens.push(int_tensor::<B>(question, &device));
            lengths.push(length);
            let stops = self.stop_after.get(b).copied().flatten().is_some_and(|k| turn + 1 >= k);
            ended_after.push(request.ended[b] || stops);
        }

        GeneratedQuestions {
            tokens,
            lengths,
            state: ScriptedState { turn },
            state_slice: Tensor::zeros([batch, 4], &device),
            object_repr: request.object_features.clone(),
            ended_after,
        }
    }

    /// Doubles the mass on object `answer % objects` and renormalises
    fn refresh_belief(
        &mut self,
        belief: Tensor<B, 2>,
        last_word: Tensor<B, 1, Int>,
        _state_slice: Tensor<B, 2>,
        _object_repr: Tensor<B, 3>,
        input_is_token: bool,
    ) -> Tensor<B, 2> {
        let device = belief.device();
        let [batch, objects] = belief.dims();
        let answers = to_tokens(last_word);
        self.refreshes.push(RefreshCall { last_word: answers.clone(), input_is_token });

        let mut values = to_floats(belief);
        for (row, &answer) in values.chunks_mut(objects).zip(&answers) {
            row[answer.rem_euclid(objects as TokenId) as usize] *= 2.0;
            let total: f32 = row.iter().sum();
            row.iter_mut().for_each(|p| *p /= total);
        }
        Tensor::from_data(TensorData::new(values, [batch, objects]), &device)
    }
}

// ---------- Oracle ---------- //
/// One example's slice of an oracle call
pub struct OracleView<'a> {
    pub example: usize,
    pub question: &'a [TokenId],
    pub target_category: TokenId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleCall {
    pub width: usize,
    pub lengths: Vec<usize>,
}

/// Answers with the class index `rule` picks, as a confident one-hot logit row
pub struct ScriptedOracle {
    rule: Box<dyn FnMut(&OracleView) -> usize>,
    pub calls: Vec<OracleCall>,
}

impl ScriptedOracle {
    pub fn new(rule: impl FnMut(&OracleView) -> usize + 'static) -> Self {
        Self { rule: Box::new(rule), calls: vec![] }
    }

    pub fn constant(class: usize) -> Self {
        Self::new(move |_| class)
    }

    /// `yes` when the question word minus `first_word` names the target category,
    /// `na` for an empty question, `no` otherwise
    pub fn category_match(first_word: TokenId, yes: usize, no: usize, na: usize) -> Self {
        Self::new(move |view| match view.question.first() {
            None => na,
            Some(&word) if word - first_word == view.target_category => yes,
            Some(_) => no,
        })
    }
}

impl<B: Backend> Oracle<B> for ScriptedOracle {
    fn answer(&mut self, query: OracleQuery<B>) -> Tensor<B, 2> {
        let device = query.target_bbox.device();
        let [batch, width] = query.question.dims();
        let questions = to_tokens(query.question);
        let lengths: Vec<usize> = to_tokens(query.question_lengths).into_iter().map(|l| l as usize).collect();
        let categories = to_tokens(query.target_category);
        self.calls.push(OracleCall { width, lengths: lengths.clone() });

        let mut logits = vec![0.0f32; batch * 3];
        for b in 0..batch {
            let row = &questions[b * width..(b + 1) * width];
            let view = OracleView {
                example: b,
                question: &row[..lengths[b].min(width)],
                target_category: categories[b],
            };
            let class = (self.rule)(&view).min(2);
            logits[b * 3 + class] = 4.0;
        }
        Tensor::from_data(TensorData::new(logits, [batch, 3]), &device)
    }
}

// ---------- Guesser ---------- //
#[derive(Debug, Clone, PartialEq)]
pub struct GuessCall {
    pub dialogs: Vec<Segment>,
    pub lengths: Vec<usize>,
    pub width: usize,
}

/// Uniform over the valid candidates
#[derive(Default)]
pub struct ScriptedGuesser {
    pub calls: Vec<GuessCall>,
}

impl<B: Backend> Guesser<B> for ScriptedGuesser {
    fn guess(&mut self, query: GuessQuery<B>) -> Tensor<B, 2> {
        let device = query.bboxes.device();
        let [batch, width] = query.dialog.dims();
        let [_, objects] = query.bbox_mask.dims();
        let tokens = to_tokens(query.dialog);
        let lengths: Vec<usize> = to_tokens(query.dialog_lengths).into_iter().map(|l| l as usize).collect();
        let dialogs = (0..batch)
            .map(|b| tokens[b * width..b * width + lengths[b]].to_vec())
            .collect();
        self.calls.push(GuessCall { dialogs, lengths, width });

        let valid: Vec<bool> = query.bbox_mask.into_data().iter::<bool>().collect();
        let mut probs = vec![0.0f32; batch * objects];
        for (row, mask) in probs.chunks_mut(objects).zip(valid.chunks(objects)) {
            let count = mask.iter().filter(|&&v| v).count().max(1) as f32;
            for (p, &v) in row.iter_mut().zip(mask) {
                if v { *p = 1.0 / count; }
            }
        }
        Tensor::from_data(TensorData::new(probs, [batch, objects]), &device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_generator_without_words_asks_bare_eoq() {
        let device = Default::default();
        let mut qgen = ScriptedGenerator::new(vec![], vec![None, Some(1)]);
        let features = Tensor::<TB, 3>::zeros([2, 3, 4], &device);
        let out = QuestionGenerator::<TB>::generate_sentence(&mut qgen, GenerateRequest {
            last_word: int_tensor::<TB>(vec![1, 1], &device),
            object_features: &features,
            eoq_token: 2,
            eod_token: 3,
            ended: &[false, false],
            max_len: 20,
            belief: uniform_belief::<TB>(2, 3, &device),
            prev_state: None,
            greedy: true,
        });
        let questions: Vec<Segment> = out.tokens.into_iter().map(to_tokens).collect();
        assert_eq!(questions, vec![vec![2], vec![2]]);
        assert_eq!(out.lengths, vec![1, 1]);
        assert_eq!(out.ended_after, vec![false, true]);
    }
}
