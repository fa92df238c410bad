// ============================================================
// Discriminator
// ============================================================
// Mirror of the generator ladder: spectrally normalized strided
// convolutions with LeakyReLU, self-attention on the two deepest
// feature maps, and a final 4x4 convolution collapsing to one
// score per image. No BatchNorm; spectral normalization is the
// only conditioning on this side.
//
//   [B, 3, 64, 64]
//     -> conv 4x4 s2 p1 -> ndf   @ 32x32
//     -> conv 4x4 s2 p1 -> ndf*2 @ 16x16
//     -> conv 4x4 s2 p1 -> ndf*4 @ 8x8   -> attention
//     -> conv 4x4 s2 p1 -> ndf*8 @ 4x4   -> attention
//     -> conv 4x4 s1    -> 1     @ 1x1   -> [B]

use burn::{
    nn::{LeakyRelu, LeakyReluConfig},
    prelude::*,
};

use crate::ml::attention::{SelfAttention, SelfAttentionConfig};
use crate::ml::layers::{SpectralConv2d, SpectralConv2dConfig};

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    /// Input image side length. The ladder above is built for 64.
    pub imsize: usize,
    /// Base channel width; doubles at every downsampling step.
    pub ndf: usize,
}

/// Spectral convolution + LeakyReLU downsampling block.
#[derive(Module, Debug)]
pub struct DiscBlock<B: Backend> {
    conv: SpectralConv2d<B>,
    act:  LeakyRelu,
}

impl<B: Backend> DiscBlock<B> {
    fn new(channels_in: usize, channels_out: usize, device: &B::Device) -> Self {
        Self {
            conv: SpectralConv2dConfig::new(channels_in, channels_out, 4)
                .with_stride(2)
                .with_padding(1)
                .init(device),
            act: LeakyReluConfig::new().with_negative_slope(0.1).init(),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.act.forward(self.conv.forward(input))
    }

    fn refresh(mut self) -> Self {
        self.conv = self.conv.refresh();
        self
    }
}

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    from_rgb: DiscBlock<B>,
    down1:    DiscBlock<B>,
    down2:    DiscBlock<B>,
    attn1:    SelfAttention<B>,
    down3:    DiscBlock<B>,
    attn2:    SelfAttention<B>,
    head:     SpectralConv2d<B>,
}

impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        assert_eq!(
            self.imsize, 64,
            "the discriminator ladder consumes 64x64 images, got imsize {}",
            self.imsize
        );
        let ndf = self.ndf;

        Discriminator {
            from_rgb: DiscBlock::new(3, ndf, device),
            down1:    DiscBlock::new(ndf, ndf * 2, device),
            down2:    DiscBlock::new(ndf * 2, ndf * 4, device),
            attn1:    SelfAttentionConfig::new(ndf * 4).init(device),
            down3:    DiscBlock::new(ndf * 4, ndf * 8, device),
            attn2:    SelfAttentionConfig::new(ndf * 8).init(device),
            head:     SpectralConv2dConfig::new(ndf * 8, 1, 4).init(device),
        }
    }
}

impl<B: Backend> Discriminator<B> {
    /// Image batch `[B, 3, 64, 64]` -> unbounded realness scores `[B]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 1> {
        let [batch, _, _, _] = images.dims();

        let x = self.from_rgb.forward(images);
        let x = self.down1.forward(x);
        let x = self.down2.forward(x);
        let x = self.attn1.forward(x);
        let x = self.down3.forward(x);
        let x = self.attn2.forward(x);
        self.head.forward(x).reshape([batch])
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
        self.from_rgb = self.from_rgb.refresh();
        self.down1 = self.down1.refresh();
        self.down2 = self.down2.refresh();
        self.down3 = self.down3.refresh();
        self.head = self.head.refresh();
        self
    }
}
