//! # Evaluation
//!
//! Drives self-play over labelled batches, scores the guesser and writes a
//! human-readable transcript of every dialog.

use std::fmt;
use std::io::Write;
use burn::tensor::backend::Backend;
use log::info;
use crate::error::{AgentRole, SelfPlayError};
use crate::self_play::{SelfPlay, SelfPlayConfig, SelfPlayOutcome};
use crate::utils::*;

/// Turns token ids back into text for transcripts
pub trait Detokenizer {
    fn decode(&self, tokens: &[TokenId]) -> String;
}

/// Where the questions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    /// The question generator plays
    SelfPlay,
    /// Human questions shipped with the batch
    GroundTruth,
}

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub play: SelfPlayConfig,
    pub source: QuestionSource,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            play: SelfPlayConfig::default(),
            source: QuestionSource::SelfPlay,
        }
    }
}

/// A scene batch with the index of each example's target object
pub struct LabelledBatch<B: Backend> {
    pub scene: SceneBatch<B>,
    pub labels: Vec<usize>,
    /// Required for `QuestionSource::GroundTruth`
    pub questions: Option<Vec<Vec<Segment>>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalReport {
    pub hits: usize,
    pub total: usize,
    pub batches: usize,
    /// Batches the turn cap had to stop
    pub capped_batches: usize,
}

impl EvalReport {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 { return 0.0; }
        self.hits as f64 / self.total as f64
    }
}

#[derive(Debug)]
pub enum EvalError {
    Play(SelfPlayError),
    Io(std::io::Error),
    /// Ground-truth evaluation got a batch without questions
    MissingQuestions { batch: usize },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Play(e) => write!(f, "self-play failed: {e}"),
            EvalError::Io(e) => write!(f, "IO error: {e}"),
            EvalError::MissingQuestions { batch } => write!(f, "batch {batch} has no ground-truth questions"),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<SelfPlayError> for EvalError {
    fn from(e: SelfPlayError) -> Self {
        EvalError::Play(e)
    }
}

impl From<std::io::Error> for EvalError {
    fn from(e: std::io::Error) -> Self {
        EvalError::Io(e)
    }
}

/// Writes transcript rows to `out` while accumulating accuracy
pub struct Evaluator<W: Write> {
    config: EvalConfig,
    out: W,
}

impl<W: Write> Evaluator<W> {
    pub fn new(config: EvalConfig, out: W) -> Self {
        Self { config, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn run<B, Q, O, G, D>(
        &mut self,
        players: &mut SelfPlay<B, Q, O, G>,
        batches: impl IntoIterator<Item = LabelledBatch<B>>,
        detok: &D,
    ) -> Result<EvalReport, EvalError>
    where
        B: Backend,
        Q: QuestionGenerator<B>,
        O: Oracle<B>,
        G: Guesser<B>,
        D: Detokenizer,
    {
        let mut report = EvalReport::default();
        if self.config.source == QuestionSource::SelfPlay {
            writeln!(self.out, "game_id|pred_obj|answer_obj|turn_id|question|answer")?;
        }

        for (idx, batch) in batches.into_iter().enumerate() {
            check_dim(AgentRole::DataLayer, "labels", batch.scene.batch_size(), batch.labels.len())?;
            let outcome = match self.config.source {
                QuestionSource::SelfPlay => players.play(&batch.scene, &self.config.play)?,
                QuestionSource::GroundTruth => {
                    let questions = batch.questions.as_ref().ok_or(EvalError::MissingQuestions { batch: idx })?;
                    players.play_with_questions(&batch.scene, questions)?
                }
            };
            let predictions = outcome.predictions();
            self.write_transcript(&batch, &outcome, &predictions, detok)?;

            report.hits += predictions.iter().zip(&batch.labels).filter(|(p, l)| p == l).count();
            report.total += predictions.len();
            report.batches += 1;
            if !outcome.self_terminated {
                report.capped_batches += 1;
            }
            info!("Dev stat. | batch {} | Acc. - {:.3}", idx + 1, report.accuracy());
        }

        self.out.flush()?;
        info!("Val stat. | {} games | Acc. - {:.3}", report.total, report.accuracy());
        Ok(report)
    }

    /// The answer column stays empty only for a question that was never answered, so a
    /// dialog cut by the turn cap still shows the answer to its last question
    fn write_transcript<B: Backend, D: Detokenizer>(
        &mut self,
        batch: &LabelledBatch<B>,
        outcome: &SelfPlayOutcome<B>,
        predictions: &[usize],
        detok: &D,
    ) -> std::io::Result<()> {
        for (b, log) in outcome.logs.iter().enumerate() {
            let game = &batch.scene.games[b];
            match self.config.source {
                QuestionSource::GroundTruth => {
                    writeln!(self.out, "{}-{}/{} | {}", game.id, predictions[b], batch.labels[b], detok.decode(&log.dialog))?;
                }
                QuestionSource::SelfPlay => {
                    let prefix = format!("{}|{}|{}", game.id, predictions[b], batch.labels[b]);
                    for (turn, question) in log.questions.iter().enumerate() {
                        let answer = log.answered(turn).map(|a| detok.decode(&[a])).unwrap_or_default();
                        writeln!(self.out, "{}|{}|{}|{}", prefix, turn, detok.decode(question), answer)?;
                    }
                }
            }
        }
        Ok(())
    }
}
