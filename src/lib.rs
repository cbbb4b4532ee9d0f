//! # Guess-What Self-Play
//!
//! Batched, variable-length self-play for the three-player dialog game: a question
//! generator asks yes/no/n.a. questions about a scene, an oracle that knows the
//! target answers them, and a guesser picks the target from the finished dialog.

pub mod utils;
pub mod error;
pub mod answer;
pub mod dialog;
pub mod turn;
pub mod belief;
pub mod self_play;
pub mod evaluation;
pub mod neural;
pub mod scripted;
