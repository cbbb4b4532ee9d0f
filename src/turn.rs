//! # Turn Executor
//!
//! One round of the dialog game for the whole batch: generate questions, pad them,
//! let the oracle answer, translate the answers to generator tokens, and log what
//! each still-active example said.

use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use crate::answer::AnswerVocab;
use crate::dialog::{ended_flags, DialogLog};
use crate::error::{AgentRole, SelfPlayError};
use crate::utils::*;

/// What the previous turn leaves for this one
pub struct TurnInput<B: Backend, S> {
    pub last_word: Tensor<B, 1, Int>,
    pub belief: Tensor<B, 2>,
    pub prev_state: Option<S>,
    pub max_question_len: usize,
    pub greedy: bool,
}

pub struct TurnOutput<B: Backend, S> {
    pub questions: Tensor<B, 2, Int>,
    /// True lengths, before the oracle clamp
    pub lengths: Vec<usize>,
    pub state: S,
    pub state_slice: Tensor<B, 2>,
    pub object_repr: Tensor<B, 3>,
    /// Ended-after flags, already folded with ended-before
    pub ended_after: Vec<bool>,
    pub answer_tokens: Vec<TokenId>,
    pub confidences: Vec<Confidence>,
}

impl<B: Backend, S> TurnOutput<B, S> {
    pub fn all_ended(&self) -> bool {
        self.ended_after.iter().all(|&e| e)
    }
}

/// Answers plus the confidence of the chosen class
pub struct OracleReply {
    pub classes: Vec<i64>,
    pub tokens: Vec<TokenId>,
    pub confidences: Vec<Confidence>,
}

/// Run the oracle on a padded question batch.
/// Zero lengths are raised to one for the oracle only; recurrent encoders cannot run on empty input
pub fn ask_oracle<B: Backend, O: Oracle<B>>(
    oracle: &mut O,
    scene: &SceneBatch<B>,
    questions: Tensor<B, 2, Int>,
    lengths: &[usize],
    vocab: &AnswerVocab,
) -> Result<OracleReply, SelfPlayError> {
    let batch = scene.batch_size();
    let device = scene.device();
    let clamped: Vec<usize> = lengths.iter().map(|&l| l.max(1)).collect();

    let logits = oracle.answer(OracleQuery {
        question: questions,
        target_category: scene.target_category.clone(),
        target_bbox: scene.target_bbox.clone(),
        target_image_feature: scene.target_image_feature.clone(),
        question_lengths: lengths_tensor(&clamped, &device),
    });
    let [rows, num_classes] = logits.dims();
    check_dim(AgentRole::Oracle, "answer logits batch", batch, rows)?;
    check_dim(AgentRole::Oracle, "answer classes", 3, num_classes)?;

    let chosen = logits.clone().argmax(1);
    let confidence = softmax(logits, 1).gather(1, chosen.clone());
    let classes = to_tokens(chosen);
    let tokens = vocab.classes_to_tokens(&classes)?;
    Ok(OracleReply { classes, tokens, confidences: to_floats(confidence) })
}

/// Execute one turn. Only examples still active get anything appended to their log:
/// a question when not ended before the turn, an answer when not ended after it
pub fn run_turn<B, Q, O>(
    qgen: &mut Q,
    oracle: &mut O,
    scene: &SceneBatch<B>,
    input: TurnInput<B, Q::State>,
    logs: &mut [DialogLog],
    vocab: &AnswerVocab,
    tokens: &SpecialTokens,
) -> Result<TurnOutput<B, Q::State>, SelfPlayError>
where
    B: Backend,
    Q: QuestionGenerator<B>,
    O: Oracle<B>,
{
    let batch = scene.batch_size();
    let device = scene.device();
    let ended_before = ended_flags(logs);
    let qgen_role = AgentRole::QuestionGenerator;

    let generated = qgen.generate_sentence(GenerateRequest {
        last_word: input.last_word,
        object_features: &scene.object_features,
        eoq_token: tokens.eoq,
        eod_token: tokens.eod,
        ended: &ended_before,
        max_len: input.max_question_len,
        belief: input.belief,
        prev_state: input.prev_state,
        greedy: input.greedy,
    });
    check_dim(qgen_role, "questions", batch, generated.tokens.len())?;
    check_dim(qgen_role, "question lengths", batch, generated.lengths.len())?;
    check_dim(qgen_role, "ended flags", batch, generated.ended_after.len())?;
    check_dim(qgen_role, "state slice", batch, generated.state_slice.dims()[0])?;
    check_dim(qgen_role, "object representation", batch, generated.object_repr.dims()[0])?;

    // Full sequences go to the oracle, the true-length prefix goes to the logs
    let full: Vec<Segment> = generated.tokens.into_iter().map(to_tokens).collect();
    for (seq, &len) in full.iter().zip(&generated.lengths) {
        if len > seq.len() {
            return Err(SelfPlayError::ShapeMismatch { agent: qgen_role, what: "question length", expected: seq.len(), actual: len });
        }
    }
    let questions = pad_segments::<B>(&full, tokens.pad, 1, &device);
    let reply = ask_oracle(oracle, scene, questions.clone(), &generated.lengths, vocab)?;

    let ended_after: Vec<bool> = generated
        .ended_after
        .iter()
        .zip(&ended_before)
        .map(|(&after, &before)| after || before)
        .collect();

    for (b, log) in logs.iter_mut().enumerate() {
        if !ended_before[b] {
            log.push_question(&full[b][..generated.lengths[b]]);
        }
        if !ended_after[b] {
            log.push_answer(reply.tokens[b], reply.confidences[b]);
        }
    }
    log::trace!("turn answers {:?} for classes {:?}", reply.tokens, reply.classes);

    Ok(TurnOutput {
        questions,
        lengths: generated.lengths,
        state: generated.state,
        state_slice: generated.state_slice,
        object_repr: generated.object_repr,
        ended_after,
        answer_tokens: reply.tokens,
        confidences: reply.confidences,
    })
}
