// ============================================================
// Generator
// ============================================================
// DCGAN-style transposed-convolution ladder with self-attention
// at the two highest-resolution feature maps:
//
//   z [B, nz] -> [B, nz, 1, 1]
//     -> deconv 4x4 s1        -> ngf*8 @ 4x4
//     -> deconv 4x4 s2 p1     -> ngf*4 @ 8x8
//     -> deconv 4x4 s2 p1     -> ngf*2 @ 16x16  -> attention
//     -> deconv 4x4 s2 p1     -> ngf   @ 32x32  -> attention
//     -> deconv 4x4 s2 p1     -> 3     @ 64x64  -> tanh
//
// Every deconvolution is spectrally normalized; the inner blocks
// add BatchNorm + ReLU. Output pixels land in [-1, 1].

use burn::{
    nn::{BatchNorm, BatchNormConfig},
    prelude::*,
    tensor::activation::{relu, tanh},
};

use crate::ml::attention::{SelfAttention, SelfAttentionConfig};
use crate::ml::layers::{SpectralConvTranspose2d, SpectralConvTranspose2dConfig};

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Output image side length. The ladder above is built for 64.
    pub imsize: usize,
    /// Latent dimension.
    pub nz: usize,
    /// Base channel width; the stem starts at `ngf * 8`.
    pub ngf: usize,
}

/// Spectral deconvolution + BatchNorm + ReLU upsampling block.
#[derive(Module, Debug)]
pub struct GenBlock<B: Backend> {
    deconv: SpectralConvTranspose2d<B>,
    norm:   BatchNorm<B, 2>,
}

impl<B: Backend> GenBlock<B> {
    fn new(
        channels_in: usize,
        channels_out: usize,
        stride: usize,
        padding: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            deconv: SpectralConvTranspose2dConfig::new(channels_in, channels_out, 4)
                .with_stride(stride)
                .with_padding(padding)
                .init(device),
            norm: BatchNormConfig::new(channels_out).init(device),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.norm.forward(self.deconv.forward(input)))
    }

    fn refresh(mut self) -> Self {
        self.deconv = self.deconv.refresh();
        self
    }
}

#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    stem:   GenBlock<B>,
    up1:    GenBlock<B>,
    up2:    GenBlock<B>,
    attn1:  SelfAttention<B>,
    up3:    GenBlock<B>,
    attn2:  SelfAttention<B>,
    to_rgb: SpectralConvTranspose2d<B>,
    nz:     usize,
}

impl GeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        assert_eq!(
            self.imsize, 64,
            "the generator ladder produces 64x64 images, got imsize {}",
            self.imsize
        );
        let ngf = self.ngf;

        Generator {
            stem:   GenBlock::new(self.nz, ngf * 8, 1, 0, device),
            up1:    GenBlock::new(ngf * 8, ngf * 4, 2, 1, device),
            up2:    GenBlock::new(ngf * 4, ngf * 2, 2, 1, device),
            attn1:  SelfAttentionConfig::new(ngf * 2).init(device),
            up3:    GenBlock::new(ngf * 2, ngf, 2, 1, device),
            attn2:  SelfAttentionConfig::new(ngf).init(device),
            to_rgb: SpectralConvTranspose2dConfig::new(ngf, 3, 4)
                .with_stride(2)
                .with_padding(1)
                .init(device),
            nz: self.nz,
        }
    }
}

impl<B: Backend> Generator<B> {
    /// Latent `[B, nz]` -> image batch `[B, 3, 64, 64]` in [-1, 1].
    pub fn forward(&self, z: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch, nz] = z.dims();
        assert_eq!(nz, self.nz, "latent dimension mismatch: {nz} vs {}", self.nz);

        let x = z.reshape([batch, nz, 1, 1]);
        let x = self.stem.forward(x);
        let x = self.up1.forward(x);
        let x = self.up2.forward(x);
        let x = self.attn1.forward(x);
        let x = self.up3.forward(x);
        let x = self.attn2.forward(x);
        tanh(self.to_rgb.forward(x))
    }

    pub fn attn1_gamma(&self) -> f32 {
        self.attn1.gamma()
    }

    pub fn attn2_gamma(&self) -> f32 {
        self.attn2.gamma()
    }

    /// Advance every spectral layer's power iterate. Called once per
    /// optimizer step.
    pub fn refresh(mut self) -> Self {
        self.stem = self.stem.refresh();
        self.up1 = self.up1.refresh();
        self.up2 = self.up2.refresh();
        self.up3 = self.up3.refresh();
        self.to_rgb = self.to_rgb.refresh();
        self
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
    fn produces_images_of_the_configured_size_in_range() {
        let device = <TestBackend as Backend>::Device::default();
        let generator = GeneratorConfig::new(64, 16, 8).init::<TestBackend>(&device);

        let z = Tensor::random([2, 16], Distribution::Normal(0.0, 1.0), &device);
        let images = generator.forward(z);
        assert_eq!(images.dims(), [2, 3, 64, 64]);

        let pixels: Vec<f32> = images.into_data().to_vec().unwrap();
        assert!(pixels.iter().all(|p| (-1.0..=1.0).contains(p)));
    }

    #[test]
    fn attention_gates_start_at_zero() {
        let device = <TestBackend as Backend>::Device::default();
        let generator = GeneratorConfig::new(64, 16, 8).init::<TestBackend>(&device);
        assert_eq!(generator.attn1_gamma(), 0.0);
        assert_eq!(generator.attn2_gamma(), 0.0);
    }
}
