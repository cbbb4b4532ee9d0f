use burn::prelude::*;
use burn::nn::{Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::tensor::activation::{relu, softmax};
use crate::utils::{to_tokens, GuessQuery, Guesser};


/// Baseline guesser network
/// Mean-pools the dialog's word embeddings and scores every candidate object against it
#[derive(Module, Debug)]
pub struct DialogGuesser<B: Backend> {
    words: Embedding<B>,
    categories: Embedding<B>,
    bbox: Linear<B>,
    candidate: Linear<B>,
}

/// Configuration for the baseline guesser
#[derive(Debug, Clone)]
pub struct GuesserConfig {
    pub num_words: usize,
    pub num_categories: usize,
    pub bbox_dim: usize,
    pub hidden_size: usize,
}

impl Default for GuesserConfig {
    fn default() -> Self {
        Self {
            num_words: 100,
            num_categories: 91,  // COCO category ids
            bbox_dim: 8,
            hidden_size: 64,
        }
    }
}

impl<B: Backend> DialogGuesser<B> {
    pub fn new(config: &GuesserConfig, device: &B::Device) -> Self {
        Self {
            words: EmbeddingConfig::new(config.num_words, config.hidden_size).init(device),
            categories: EmbeddingConfig::new(config.num_categories, config.hidden_size).init(device),
            bbox: LinearConfig::new(config.bbox_dim, config.hidden_size).init(device),
            candidate: LinearConfig::new(config.hidden_size, config.hidden_size).init(device),
        }
    }

    /// Forward pass returning a distribution over candidates, [batch, objects]
    pub fn forward(
        &self,
        dialog: Tensor<B, 2, Int>,
        lengths: &[usize],
        categories: Tensor<B, 2, Int>,
        bboxes: Tensor<B, 3>,
        bbox_mask: Tensor<B, 2, Bool>,
    ) -> Tensor<B, 2> {
        let device = bboxes.device();
        let [batch, width] = dialog.dims();
        let [_, objects] = categories.dims();

        // Averaging weights over the true length; an empty dialog pools to zero
        let weights: Vec<f32> = lengths
            .iter()
            .flat_map(|&len| (0..width).map(move |i| if i < len { 1.0 / len as f32 } else { 0.0 }))
            .collect();
        let weights = Tensor::<B, 3>::from_data(TensorData::new(weights, [batch, 1, width]), &device);
        let pooled = weights.matmul(self.words.forward(dialog));  // [batch, 1, hidden]

        let candidates = self.categories.forward(categories).add(self.bbox.forward(bboxes));
        let candidates = relu(self.candidate.forward(candidates));  // [batch, objects, hidden]

        let scores = candidates.matmul(pooled.swap_dims(1, 2)).reshape([batch, objects]);
        let scores = scores.mask_fill(bbox_mask.bool_not(), -1.0e9);
        softmax(scores, 1)
    }
}

impl<B: Backend> Guesser<B> for DialogGuesser<B> {
    fn guess(&mut self, query: GuessQuery<B>) -> Tensor<B, 2> {
        let lengths: Vec<usize> = to_tokens(query.dialog_lengths).into_iter().map(|l| l as usize).collect();
        self.forward(query.dialog, &lengths, query.categories, query.bboxes, query.bbox_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::utils::{int_tensor, lengths_tensor, pad_segments, to_floats};

    type TestBackend = NdArray;

    #[test]
    fn test_guesser_creation() {
        let device = Default::default();
        let config = GuesserConfig { num_words: 20, num_categories: 5, bbox_dim: 8, hidden_size: 16 };
        let mut guesser = DialogGuesser::<TestBackend>::new(&config, &device);

        let dialog = pad_segments::<TestBackend>(&[vec![4, 5, 2, 7], vec![]], 0, 1, &device);
        let categories = Tensor::<TestBackend, 2, Int>::from_data(TensorData::new(vec![1i64, 2, 3, 1, 4, 0], [2, 3]), &device);
        let bboxes = Tensor::<TestBackend, 3>::zeros([2, 3, 8], &device);
        let mask = Tensor::<TestBackend, 2, Bool>::from_data(TensorData::new(vec![true, true, false, true, true, true], [2, 3]), &device);

        let guess = guesser.guess(GuessQuery {
            dialog,
            dialog_lengths: lengths_tensor(&[4, 0], &device),
            categories,
            bboxes,
            bbox_mask: mask,
        });
        assert_eq!(guess.dims(), [2, 3]);

        let probs = to_floats(guess);
        for row in probs.chunks(3) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        }
        // masked candidate gets nothing
        assert!(probs[2] < 1e-6);
    }

    #[test]
    fn test_empty_dialog_is_uniform_over_candidates() {
        let device = Default::default();
        let config = GuesserConfig { num_words: 10, num_categories: 3, bbox_dim: 4, hidden_size: 8 };
        let guesser = DialogGuesser::<TestBackend>::new(&config, &device);

        let dialog = pad_segments::<TestBackend>(&[vec![]], 0, 1, &device);
        let categories = int_tensor::<TestBackend>(vec![0, 1], &device).reshape([1, 2]);
        let bboxes = Tensor::<TestBackend, 3>::zeros([1, 2, 4], &device);
        let mask = Tensor::<TestBackend, 2, Bool>::from_data(TensorData::new(vec![true, true], [1, 2]), &device);

        let probs = to_floats(guesser.forward(dialog, &[0], categories, bboxes, mask));
        assert!((probs[0] - 0.5).abs() < 1e-5);
        assert!((probs[1] - 0.5).abs() < 1e-5);
    }
}
