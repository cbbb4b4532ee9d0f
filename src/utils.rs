use burn::tensor::backend::Backend;
use burn::tensor::{Bool, Int, Tensor, TensorData};
use crate::error::{AgentRole, SelfPlayError};

// ---------- Basic types (renamed for pretty) ---------- //
pub type TokenId = i64;  // NdArray int element, so host ids round-trip without casts
pub type Confidence = f32;
pub type Segment = Vec<TokenId>;

/// Vocabulary ids the loop itself needs to know about. Everything else is opaque.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SpecialTokens {
    pub pad: TokenId,
    pub sos: TokenId,
    pub eoq: TokenId,
    pub eod: TokenId,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self { pad: 0, sos: 1, eoq: 2, eod: 3 }
    }
}

/// One scene/target pairing. The id is only carried for output correlation.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Game {
    pub id: u64,
}

/// Everything the data layer hands over for one batch of games
#[derive(Debug, Clone)]
pub struct SceneBatch<B: Backend> {
    pub games: Vec<Game>,
    pub object_features: Tensor<B, 3>,       // [batch, objects, feat]
    pub target_category: Tensor<B, 1, Int>,  // [batch]
    pub target_bbox: Tensor<B, 2>,           // [batch, box]
    pub target_image_feature: Tensor<B, 2>,  // [batch, feat]
    pub categories: Tensor<B, 2, Int>,       // [batch, objects]
    pub bboxes: Tensor<B, 3>,                // [batch, objects, box]
    pub bbox_mask: Tensor<B, 2, Bool>,       // [batch, objects]
}

impl<B: Backend> SceneBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.object_features.dims()[0]
    }

    pub fn num_objects(&self) -> usize {
        self.object_features.dims()[1]
    }

    pub fn device(&self) -> B::Device {
        self.object_features.device()
    }

    /// Every tensor must agree on the batch dimension, and the candidate tensors on the object count
    pub fn validate(&self) -> Result<(), SelfPlayError> {
        let batch = self.batch_size();
        let objects = self.num_objects();
        let data = AgentRole::DataLayer;
        check_dim(data, "games", batch, self.games.len())?;
        check_dim(data, "target_category", batch, self.target_category.dims()[0])?;
        check_dim(data, "target_bbox", batch, self.target_bbox.dims()[0])?;
        check_dim(data, "target_image_feature", batch, self.target_image_feature.dims()[0])?;
        check_dim(data, "categories", batch, self.categories.dims()[0])?;
        check_dim(data, "bboxes", batch, self.bboxes.dims()[0])?;
        check_dim(data, "bbox_mask", batch, self.bbox_mask.dims()[0])?;
        check_dim(data, "categories objects", objects, self.categories.dims()[1])?;
        check_dim(data, "bboxes objects", objects, self.bboxes.dims()[1])?;
        check_dim(data, "bbox_mask objects", objects, self.bbox_mask.dims()[1])?;
        Ok(())
    }
}

#[inline]
pub fn check_dim(agent: AgentRole, what: &'static str, expected: usize, actual: usize) -> Result<(), SelfPlayError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SelfPlayError::ShapeMismatch { agent, what, expected, actual })
    }
}

// ---------- Traits the agents must provide ----------
/// Batch view handed to the question generator for one turn
pub struct GenerateRequest<'a, B: Backend, S> {
    pub last_word: Tensor<B, 1, Int>,
    pub object_features: &'a Tensor<B, 3>,
    pub eoq_token: TokenId,
    pub eod_token: TokenId,
    /// Ended-before flags. Ended examples are still generated for, their output is discarded
    pub ended: &'a [bool],
    pub max_len: usize,
    pub belief: Tensor<B, 2>,
    pub prev_state: Option<S>,
    pub greedy: bool,
}

/// What the question generator hands back for one turn
pub struct GeneratedQuestions<B: Backend, S> {
    /// One token tensor per example, at least `lengths[i]` long
    pub tokens: Vec<Tensor<B, 1, Int>>,
    pub lengths: Vec<usize>,
    pub state: S,
    /// The part of `state` belief refresh reads. Returned separately so the loop never opens `state`
    pub state_slice: Tensor<B, 2>,
    pub object_repr: Tensor<B, 3>,
    /// Ended-after flags
    pub ended_after: Vec<bool>,
}

pub trait QuestionGenerator<B: Backend> {
    /// Opaque recurrent state, threaded between turns untouched
    type State;

    fn generate_sentence(&mut self, request: GenerateRequest<'_, B, Self::State>) -> GeneratedQuestions<B, Self::State>;

    /// Next turn's belief over the candidate objects. `last_word` is the decoded answer token when `input_is_token`
    fn refresh_belief(
        &mut self,
        belief: Tensor<B, 2>,
        last_word: Tensor<B, 1, Int>,
        state_slice: Tensor<B, 2>,
        object_repr: Tensor<B, 3>,
        input_is_token: bool,
    ) -> Tensor<B, 2>;
}

/// Padded question batch plus the target the oracle knows about
pub struct OracleQuery<B: Backend> {
    pub question: Tensor<B, 2, Int>,
    pub target_category: Tensor<B, 1, Int>,
    pub target_bbox: Tensor<B, 2>,
    pub target_image_feature: Tensor<B, 2>,
    pub question_lengths: Tensor<B, 1, Int>,
}

pub trait Oracle<B: Backend> {
    /// Class logits over the answer vocabulary, [batch, 3]
    fn answer(&mut self, query: OracleQuery<B>) -> Tensor<B, 2>;
}

pub struct GuessQuery<B: Backend> {
    pub dialog: Tensor<B, 2, Int>,
    pub dialog_lengths: Tensor<B, 1, Int>,
    pub categories: Tensor<B, 2, Int>,
    pub bboxes: Tensor<B, 3>,
    pub bbox_mask: Tensor<B, 2, Bool>,
}

pub trait Guesser<B: Backend> {
    /// Distribution over candidate objects, [batch, objects]
    fn guess(&mut self, query: GuessQuery<B>) -> Tensor<B, 2>;
}

// ---------- Host <-> tensor helpers ---------- //
pub fn int_tensor<B: Backend>(values: Vec<TokenId>, device: &B::Device) -> Tensor<B, 1, Int> {
    let n = values.len();
    Tensor::from_data(TensorData::new(values, [n]), device)
}

pub fn lengths_tensor<B: Backend>(lengths: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    int_tensor(lengths.iter().map(|&l| l as TokenId).collect(), device)
}

pub fn to_tokens<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Vec<TokenId> {
    tensor.into_data().iter::<TokenId>().collect()
}

pub fn to_floats<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}

/// Right-pad variable length segments into a [batch, width] tensor.
/// Width never drops below `min_width` so a clamped length always points inside the row
pub fn pad_segments<B: Backend>(segments: &[Segment], pad: TokenId, min_width: usize, device: &B::Device) -> Tensor<B, 2, Int> {
    let width = segments.iter().map(|s| s.len()).max().unwrap_or(0).max(min_width);
    let mut flat = Vec::with_capacity(segments.len() * width);
    for segment in segments {
        flat.extend_from_slice(segment);
        flat.extend(std::iter::repeat(pad).take(width - segment.len()));
    }
    log::trace!("padded {} segments to width {}", segments.len(), width);
    Tensor::from_data(TensorData::new(flat, [segments.len(), width]), device)
}

/// Uniform belief over `objects` candidates for every example
pub fn uniform_belief<B: Backend>(batch: usize, objects: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 2>::ones([batch, objects], device).div_scalar(objects as f32)
}

/// Arg-max per row
pub fn argmax_rows(values: &[f32], row_len: usize) -> Vec<usize> {
    values
        .chunks(row_len.max(1))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_pad_segments_right_pads() {
        let device = Default::default();
        let segments = vec![vec![5, 6, 7], vec![8], vec![]];
        let padded = pad_segments::<TestBackend>(&segments, 0, 1, &device);
        assert_eq!(padded.dims(), [3, 3]);
        assert_eq!(to_tokens(padded), vec![5, 6, 7, 8, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_pad_segments_keeps_min_width() {
        let device = Default::default();
        let segments = vec![vec![], vec![]];
        let padded = pad_segments::<TestBackend>(&segments, 9, 1, &device);
        assert_eq!(padded.dims(), [2, 1]);
        assert_eq!(to_tokens(padded), vec![9, 9]);
    }

    #[test]
    fn test_uniform_belief_rows_sum_to_one() {
        let device = Default::default();
        let belief = uniform_belief::<TestBackend>(2, 4, &device);
        let values = to_floats(belief);
        assert_eq!(values.len(), 8);
        for row in values.chunks(4) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_argmax_rows() {
        assert_eq!(argmax_rows(&[0.1, 0.7, 0.2, 0.9, 0.05, 0.05], 3), vec![1, 0]);
    }
}
