//! # Dialog Accumulator
//!
//! Per-example record of one episode: the concatenated dialog tokens plus the
//! question/answer/confidence logs used for transcripts. Append-only.

use crate::utils::{Confidence, Segment, TokenId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogLog {
    /// Question and answer segments concatenated in turn order
    pub dialog: Segment,
    pub questions: Vec<Segment>,
    pub answers: Vec<TokenId>,
    pub confidences: Vec<Confidence>,
    ended: bool,
}

impl DialogLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ended-before flag for the next turn
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Once ended, always ended
    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    pub fn len(&self) -> usize {
        self.dialog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialog.is_empty()
    }

    pub fn push_question(&mut self, question: &[TokenId]) {
        debug_assert!(!self.ended, "question logged after the dialog ended");
        self.dialog.extend_from_slice(question);
        self.questions.push(question.to_vec());
    }

    pub fn push_answer(&mut self, answer: TokenId, confidence: Confidence) {
        debug_assert!(!self.ended, "answer logged after the dialog ended");
        self.dialog.push(answer);
        self.answers.push(answer);
        self.confidences.push(confidence);
    }

    /// Whether the question asked at `turn` (index into `questions`) got an answer
    pub fn answered(&self, turn: usize) -> Option<TokenId> {
        self.answers.get(turn).copied()
    }
}

/// Snapshot of every example's ended flag, the batch view handed to the generator
pub fn ended_flags(logs: &[DialogLog]) -> Vec<bool> {
    logs.iter().map(DialogLog::is_ended).collect()
}

pub fn dialogs(logs: &[DialogLog]) -> Vec<Segment> {
    logs.iter().map(|log| log.dialog.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_alternate_in_dialog() {
        let mut log = DialogLog::new();
        log.push_question(&[7, 8, 2]);
        log.push_answer(100, 0.9);
        log.push_question(&[9, 2]);
        assert_eq!(log.dialog, vec![7, 8, 2, 100, 9, 2]);
        assert_eq!(log.questions, vec![vec![7, 8, 2], vec![9, 2]]);
        assert_eq!(log.answered(0), Some(100));
        assert_eq!(log.answered(1), None);
    }

    #[test]
    fn test_empty_question_adds_nothing_to_dialog() {
        let mut log = DialogLog::new();
        log.push_question(&[]);
        assert!(log.is_empty());
        assert_eq!(log.questions.len(), 1);
    }

    #[test]
    fn test_ended_flags_snapshot() {
        let mut logs = vec![DialogLog::new(), DialogLog::new()];
        logs[1].mark_ended();
        assert_eq!(ended_flags(&logs), vec![false, true]);
    }
}
