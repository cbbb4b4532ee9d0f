//! # Self-Play Controller
//!
//! Owns the turn loop for one batch of games: question generator and oracle talk
//! until every dialog has ended or the turn cap is hit, then the guesser reads the
//! padded dialogs once.

use std::marker::PhantomData;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use log::{debug, info, warn};
use crate::answer::AnswerVocab;
use crate::belief::propagate;
use crate::dialog::{dialogs, DialogLog};
use crate::error::{AgentRole, SelfPlayError};
use crate::turn::{ask_oracle, run_turn, TurnInput};
use crate::utils::*;

/// Per-run knobs supplied by the caller
#[derive(Debug, Clone)]
pub struct SelfPlayConfig {
    /// Hard cap on turns, even for dialogs that never end themselves
    pub max_turns: usize,
    pub max_question_len: usize,
    pub greedy: bool,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            max_question_len: 20,
            greedy: true,
        }
    }
}

/// Result of one episode
#[derive(Debug, Clone)]
pub struct SelfPlayOutcome<B: Backend> {
    /// [batch, objects]
    pub guess: Tensor<B, 2>,
    pub logs: Vec<DialogLog>,
    pub turns_played: usize,
    /// False when the turn cap cut the episode short
    pub self_terminated: bool,
}

impl<B: Backend> SelfPlayOutcome<B> {
    /// Arg-max object per example
    pub fn predictions(&self) -> Vec<usize> {
        let objects = self.guess.dims()[1];
        argmax_rows(&to_floats(self.guess.clone()), objects)
    }

    pub fn dialog_lengths(&self) -> Vec<usize> {
        self.logs.iter().map(DialogLog::len).collect()
    }
}

/// The three players plus the fixed vocabulary they share
pub struct SelfPlay<B: Backend, Q, O, G> {
    pub qgen: Q,
    pub oracle: O,
    pub guesser: G,
    vocab: AnswerVocab,
    tokens: SpecialTokens,
    _backend: PhantomData<B>,
}

impl<B, Q, O, G> SelfPlay<B, Q, O, G>
where
    B: Backend,
    Q: QuestionGenerator<B>,
    O: Oracle<B>,
    G: Guesser<B>,
{
    pub fn new(qgen: Q, oracle: O, guesser: G, vocab: AnswerVocab, tokens: SpecialTokens) -> Self {
        Self { qgen, oracle, guesser, vocab, tokens, _backend: PhantomData }
    }

    pub fn vocab(&self) -> &AnswerVocab {
        &self.vocab
    }

    pub fn tokens(&self) -> &SpecialTokens {
        &self.tokens
    }

    /// Play one episode for the batch
    pub fn play(&mut self, scene: &SceneBatch<B>, config: &SelfPlayConfig) -> Result<SelfPlayOutcome<B>, SelfPlayError> {
        scene.validate()?;
        let batch = scene.batch_size();
        let device = scene.device();

        // INIT
        let mut logs = vec![DialogLog::new(); batch];
        let mut last_word = int_tensor::<B>(vec![self.tokens.sos; batch], &device);
        let mut belief = uniform_belief::<B>(batch, scene.num_objects(), &device);
        let mut last_state: Option<Q::State> = None;
        let mut turns_played = 0;
        let mut self_terminated = false;

        // TURN
        while turns_played < config.max_turns {
            let turn = run_turn(
                &mut self.qgen,
                &mut self.oracle,
                scene,
                TurnInput {
                    last_word,
                    belief: belief.clone(),
                    prev_state: last_state.take(),
                    max_question_len: config.max_question_len,
                    greedy: config.greedy,
                },
                &mut logs,
                &self.vocab,
                &self.tokens,
            )?;
            turns_played += 1;
            let active = turn.ended_after.iter().filter(|&&e| !e).count();
            debug!("turn {} done, {}/{} dialogs still active", turns_played, active, batch);

            for (log, &ended) in logs.iter_mut().zip(&turn.ended_after) {
                if ended { log.mark_ended(); }
            }
            if turn.all_ended() {
                self_terminated = true;
                break;
            }
            let next = propagate(&mut self.qgen, belief, turn, &device)?;
            last_word = next.last_word;
            belief = next.belief;
            last_state = Some(next.state);
        }
        if !self_terminated {
            let active = logs.iter().filter(|l| !l.is_ended()).count();
            warn!("turn cap {} reached with {} dialogs still active", config.max_turns, active);
        }

        // FINALIZE
        let guess = self.finalize(scene, &logs)?;
        info!("episode finished after {} turns (self-terminated: {})", turns_played, self_terminated);
        Ok(SelfPlayOutcome { guess, logs, turns_played, self_terminated })
    }

    /// Let the oracle answer supplied human questions turn by turn, then guess.
    /// `questions[b]` lists example b's questions in order; shorter lists drop out early
    pub fn play_with_questions(&mut self, scene: &SceneBatch<B>, questions: &[Vec<Segment>]) -> Result<SelfPlayOutcome<B>, SelfPlayError> {
        scene.validate()?;
        let batch = scene.batch_size();
        let device = scene.device();
        check_dim(AgentRole::DataLayer, "question lists", batch, questions.len())?;

        let mut logs = vec![DialogLog::new(); batch];
        let turns = questions.iter().map(Vec::len).max().unwrap_or(0);
        for turn in 0..turns {
            let asked: Vec<Segment> = questions
                .iter()
                .map(|qs| qs.get(turn).cloned().unwrap_or_default())
                .collect();
            let lengths: Vec<usize> = asked.iter().map(Vec::len).collect();
            let padded = pad_segments::<B>(&asked, self.tokens.pad, 1, &device);
            let reply = ask_oracle(&mut self.oracle, scene, padded, &lengths, &self.vocab)?;
            for (b, log) in logs.iter_mut().enumerate() {
                if turn < questions[b].len() {
                    log.push_question(&asked[b]);
                    log.push_answer(reply.tokens[b], reply.confidences[b]);
                }
            }
            debug!("ground-truth turn {} answered", turn + 1);
        }
        for log in logs.iter_mut() {
            log.mark_ended();
        }

        let guess = self.finalize(scene, &logs)?;
        Ok(SelfPlayOutcome { guess, logs, turns_played: turns, self_terminated: true })
    }

    fn finalize(&mut self, scene: &SceneBatch<B>, logs: &[DialogLog]) -> Result<Tensor<B, 2>, SelfPlayError> {
        let device = scene.device();
        let lengths: Vec<usize> = logs.iter().map(DialogLog::len).collect();
        let dialog = pad_segments::<B>(&dialogs(logs), self.tokens.pad, 1, &device);
        let guess = self.guesser.guess(GuessQuery {
            dialog,
            dialog_lengths: lengths_tensor(&lengths, &device),
            categories: scene.categories.clone(),
            bboxes: scene.bboxes.clone(),
            bbox_mask: scene.bbox_mask.clone(),
        });
        let [rows, objects] = guess.dims();
        check_dim(AgentRole::Guesser, "guess batch", scene.batch_size(), rows)?;
        check_dim(AgentRole::Guesser, "guess objects", scene.num_objects(), objects)?;
        Ok(guess)
    }
}
