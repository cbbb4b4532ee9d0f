//! # Belief / State Propagation
//!
//! Carries the turn's answer back into the question generator: the decoded answer
//! token becomes the next last word and refreshes the belief over candidate objects.
//! This is the only channel from answers to future questions.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use crate::error::{AgentRole, SelfPlayError};
use crate::turn::TurnOutput;
use crate::utils::*;

/// Inputs for the next turn's question generation
pub struct Propagated<B: Backend, S> {
    pub last_word: Tensor<B, 1, Int>,
    pub belief: Tensor<B, 2>,
    pub state: S,
}

/// Refresh the belief once with the decoded answer tokens and hand the state forward
pub fn propagate<B, Q>(
    qgen: &mut Q,
    belief: Tensor<B, 2>,
    turn: TurnOutput<B, Q::State>,
    device: &B::Device,
) -> Result<Propagated<B, Q::State>, SelfPlayError>
where
    B: Backend,
    Q: QuestionGenerator<B>,
{
    let dims = belief.dims();
    let last_word = int_tensor::<B>(turn.answer_tokens, device);
    let refreshed = qgen.refresh_belief(belief, last_word.clone(), turn.state_slice, turn.object_repr, true);
    let [rows, objects] = refreshed.dims();
    check_dim(AgentRole::QuestionGenerator, "belief batch", dims[0], rows)?;
    check_dim(AgentRole::QuestionGenerator, "belief objects", dims[1], objects)?;
    Ok(Propagated { last_word, belief: refreshed, state: turn.state })
}
