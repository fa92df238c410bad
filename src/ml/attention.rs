// ============================================================
// Self-Attention Block
// ============================================================
// Non-local attention over a convolutional feature map. Query and
// key live in a C/8-channel space, the value in C/2, and the
// attended result is projected back to C channels before being
// blended into the residual stream through a learned scalar gate.
//
// The gate starts at zero, so a freshly built block is an exact
// identity: training decides how much attention to mix in, and the
// gate value itself is a useful signal to log.
//
// Reference: Zhang et al. (2019) Self-Attention GANs

use burn::{
    module::{Module, Param},
    nn::conv::Conv2d,
    prelude::*,
    tensor::activation::softmax,
};

use crate::ml::layers::conv1x1;

#[derive(Config, Debug)]
pub struct SelfAttentionConfig {
    /// Channel count of the feature map this block attends over.
    /// Must be divisible by 8 (query/key projections use C/8).
    pub channels: usize,
}

#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    query: Conv2d<B>,
    key:   Conv2d<B>,
    value: Conv2d<B>,
    out:   Conv2d<B>,
    gamma: Param<Tensor<B, 1>>,
}

impl SelfAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SelfAttention<B> {
        assert!(
            self.channels % 8 == 0 && self.channels >= 8,
            "self-attention channels must be divisible by 8, got {}",
            self.channels
        );
        let reduced = self.channels / 8;
        let half = self.channels / 2;

        SelfAttention {
            query: conv1x1([self.channels, reduced], device),
            key:   conv1x1([self.channels, reduced], device),
            value: conv1x1([self.channels, half], device),
            out:   conv1x1([half, self.channels], device),
            gamma: Param::from_tensor(Tensor::zeros([1], device)),
        }
    }
}

impl<B: Backend> SelfAttention<B> {
    /// `[B, C, H, W]` in, `[B, C, H, W]` out.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, height, width] = input.dims();
        let n = height * width;
        let reduced = channels / 8;
        let half = channels / 2;

        // Project and flatten the spatial grid to N = H*W positions.
        let query = self
            .query
            .forward(input.clone())
            .reshape([batch, reduced, n])
            .swap_dims(1, 2); // [B, N, C/8]
        let key = self.key.forward(input.clone()).reshape([batch, reduced, n]);
        let value = self.value.forward(input.clone()).reshape([batch, half, n]);

        // Attention over positions: softmax along the key axis.
        let logits = query.matmul(key); // [B, N, N]
        let attention = softmax(logits, 2).swap_dims(1, 2);

        let attended = value
            .matmul(attention)
            .reshape([batch, half, height, width]);
        let attended = self.out.forward(attended);

        attended.mul(self.gamma.val().unsqueeze::<4>()) + input
    }

    /// Current gate value, for metric logging.
    pub fn gamma(&self) -> f32 {
        self.gamma.val().into_scalar().elem()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn output_shape_matches_input_shape() {
        let device = <TestBackend as Backend>::Device::default();
        let attn = SelfAttentionConfig::new(16).init::<TestBackend>(&device);

        let input = Tensor::random([2, 16, 5, 7], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(attn.forward(input.clone()).dims(), input.dims());
    }

    #[test]
    fn zero_gate_makes_the_block_an_identity() {
        let device = <TestBackend as Backend>::Device::default();
        let attn = SelfAttentionConfig::new(8).init::<TestBackend>(&device);
        assert_eq!(attn.gamma(), 0.0);

        let input =
            Tensor::<TestBackend, 4>::random([3, 8, 4, 4], Distribution::Normal(0.0, 1.0), &device);
        let output = attn.forward(input.clone());

        let input: Vec<f32> = input.into_data().to_vec().unwrap();
        let output: Vec<f32> = output.into_data().to_vec().unwrap();
        assert_eq!(input, output);
    }

    #[test]
    #[should_panic(expected = "divisible by 8")]
    fn rejects_channel_counts_not_divisible_by_eight() {
        let device = <TestBackend as Backend>::Device::default();
        let _ = SelfAttentionConfig::new(12).init::<TestBackend>(&device);
    }
}
