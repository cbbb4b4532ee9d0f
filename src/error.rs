//! # Errors
//!
//! Failures the self-play core reports. Agent-internal failures are not wrapped here,
//! they unwind through the loop untouched.

use std::fmt;

/// Who produced the tensor that failed a shape check
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AgentRole {
    DataLayer,
    QuestionGenerator,
    Oracle,
    Guesser,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::DataLayer => write!(f, "data layer"),
            AgentRole::QuestionGenerator => write!(f, "question generator"),
            AgentRole::Oracle => write!(f, "oracle"),
            AgentRole::Guesser => write!(f, "guesser"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelfPlayError {
    /// An agent broke batch alignment. Fatal for the whole batch
    ShapeMismatch {
        agent: AgentRole,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Oracle picked a class outside {Yes, No, N/A}
    InvalidAnswerClass(i64),

    /// Answer maps could not be built
    Vocab(VocabError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VocabError {
    MissingLabel { map: &'static str, label: &'static str },
    DuplicateId { map: &'static str, id: i64 },
}

impl fmt::Display for VocabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabError::MissingLabel { map, label } => write!(f, "{map} has no entry for '{label}'"),
            VocabError::DuplicateId { map, id } => write!(f, "{map} maps two answers to id {id}"),
        }
    }
}

impl fmt::Display for SelfPlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfPlayError::ShapeMismatch { agent, what, expected, actual } => {
                write!(f, "{agent} returned {what} with size {actual}, expected {expected}")
            }
            SelfPlayError::InvalidAnswerClass(class) => write!(f, "oracle class {class} is not Yes/No/N/A"),
            SelfPlayError::Vocab(e) => write!(f, "answer vocabulary: {e}"),
        }
    }
}

impl std::error::Error for VocabError {}
impl std::error::Error for SelfPlayError {}

impl From<VocabError> for SelfPlayError {
    fn from(e: VocabError) -> Self {
        SelfPlayError::Vocab(e)
    }
}
