//! # Answer Codec
//!
//! The oracle speaks in class indices, the question generator reads vocabulary tokens.
//! `AnswerVocab` holds both fixed maps and translates between them.

use std::collections::HashMap;
use crate::error::{SelfPlayError, VocabError};
use crate::utils::TokenId;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AnswerLabel { Yes, No, NotApplicable }

impl AnswerLabel {
    pub const ALL: [AnswerLabel; 3] = [AnswerLabel::Yes, AnswerLabel::No, AnswerLabel::NotApplicable];

    /// Key used by the dataset's answer maps
    pub fn key(self) -> &'static str {
        match self {
            AnswerLabel::Yes => "Yes",
            AnswerLabel::No => "No",
            AnswerLabel::NotApplicable => "N/A",
        }
    }

    #[inline]
    fn slot(self) -> usize {
        match self { AnswerLabel::Yes => 0, AnswerLabel::No => 1, AnswerLabel::NotApplicable => 2 }
    }
}

/// label <-> oracle class id, label <-> generator token id. Immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerVocab {
    class_ids: [i64; 3],
    tokens: [TokenId; 3],
}

impl AnswerVocab {
    pub fn new(class_ids: [(AnswerLabel, i64); 3], tokens: [(AnswerLabel, TokenId); 3]) -> Result<Self, VocabError> {
        let class_ids = Self::resolve("answer2id", class_ids.iter().map(|&(l, v)| (l.key(), v)).collect())?;
        let tokens = Self::resolve("answer2token", tokens.iter().map(|&(l, v)| (l.key(), v)).collect())?;
        Ok(Self { class_ids, tokens })
    }

    /// Build from the string keyed maps the data layer loads ("Yes", "No", "N/A")
    pub fn from_maps(answer2id: &HashMap<String, i64>, answer2token: &HashMap<String, TokenId>) -> Result<Self, VocabError> {
        let class_ids = Self::resolve("answer2id", answer2id.iter().map(|(k, &v)| (k.as_str(), v)).collect())?;
        let tokens = Self::resolve("answer2token", answer2token.iter().map(|(k, &v)| (k.as_str(), v)).collect())?;
        Ok(Self { class_ids, tokens })
    }

    fn resolve(map: &'static str, entries: HashMap<&str, i64>) -> Result<[i64; 3], VocabError> {
        let mut out = [0; 3];
        for label in AnswerLabel::ALL {
            out[label.slot()] = *entries
                .get(label.key())
                .ok_or(VocabError::MissingLabel { map, label: label.key() })?;
        }
        for i in 0..3 {
            if out[i + 1..].contains(&out[i]) {
                return Err(VocabError::DuplicateId { map, id: out[i] });
            }
        }
        Ok(out)
    }

    pub fn class_id(&self, label: AnswerLabel) -> i64 {
        self.class_ids[label.slot()]
    }

    pub fn token(&self, label: AnswerLabel) -> TokenId {
        self.tokens[label.slot()]
    }

    pub fn label_of_class(&self, class: i64) -> Option<AnswerLabel> {
        AnswerLabel::ALL.into_iter().find(|l| self.class_id(*l) == class)
    }

    pub fn label_of_token(&self, token: TokenId) -> Option<AnswerLabel> {
        AnswerLabel::ALL.into_iter().find(|l| self.token(*l) == token)
    }

    /// Oracle classes -> generator tokens. Every lookup reads the original class,
    /// so overlapping id ranges between the two maps cannot chain substitutions
    pub fn classes_to_tokens(&self, classes: &[i64]) -> Result<Vec<TokenId>, SelfPlayError> {
        classes
            .iter()
            .map(|&class| {
                self.label_of_class(class)
                    .map(|label| self.token(label))
                    .ok_or(SelfPlayError::InvalidAnswerClass(class))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::AnswerLabel::*;

    fn maps(ids: [i64; 3], tokens: [i64; 3]) -> (HashMap<String, i64>, HashMap<String, i64>) {
        let keys = ["Yes", "No", "N/A"];
        (
            keys.iter().zip(ids).map(|(k, v)| (k.to_string(), v)).collect(),
            keys.iter().zip(tokens).map(|(k, v)| (k.to_string(), v)).collect(),
        )
    }

    #[test]
    fn test_round_trip_and_distinct_tokens() {
        let (ids, tokens) = maps([0, 1, 2], [10, 11, 12]);
        let vocab = AnswerVocab::from_maps(&ids, &tokens).unwrap();
        let mut seen = vec![];
        for label in AnswerLabel::ALL {
            let token = vocab.classes_to_tokens(&[vocab.class_id(label)]).unwrap()[0];
            assert_eq!(token, vocab.token(label));
            assert_eq!(vocab.label_of_token(token), Some(label));
            assert!(!seen.contains(&token));
            seen.push(token);
        }
    }

    #[test]
    fn test_overlapping_ranges_do_not_chain() {
        // Yes: class 0 -> token 1, No: class 1 -> token 2, N/A: class 2 -> token 0
        let vocab = AnswerVocab::new([(Yes, 0), (No, 1), (NotApplicable, 2)], [(Yes, 1), (No, 2), (NotApplicable, 0)]).unwrap();
        let tokens = vocab.classes_to_tokens(&[0, 1, 2, 0]).unwrap();
        assert_eq!(tokens, vec![1, 2, 0, 1]);
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let vocab = AnswerVocab::new([(Yes, 0), (No, 1), (NotApplicable, 2)], [(Yes, 5), (No, 6), (NotApplicable, 7)]).unwrap();
        assert_eq!(vocab.classes_to_tokens(&[1, 3]), Err(SelfPlayError::InvalidAnswerClass(3)));
    }

    #[test]
    fn test_missing_label() {
        let (mut ids, tokens) = maps([0, 1, 2], [10, 11, 12]);
        ids.remove("N/A");
        let err = AnswerVocab::from_maps(&ids, &tokens).unwrap_err();
        assert_eq!(err, VocabError::MissingLabel { map: "answer2id", label: "N/A" });
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let (ids, tokens) = maps([0, 1, 2], [10, 10, 12]);
        let err = AnswerVocab::from_maps(&ids, &tokens).unwrap_err();
        assert_eq!(err, VocabError::DuplicateId { map: "answer2token", id: 10 });
    }
}
