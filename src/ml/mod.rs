// ============================================================
// ML / Model Layer (Burn)
// ============================================================
// All Burn-specific code lives here:
//
//   layers.rs        — spectrally normalized (de)convolutions and
//                      the 1x1 projection used by attention
//   attention.rs     — the gated self-attention block
//   generator.rs     — latent -> 64x64 RGB deconvolution ladder
//   discriminator.rs — image -> realness score convolution ladder
//   losses.rs        — hinge objectives for both players
//   trainer.rs       — the alternating-update training session
//
// Reference: Zhang et al. (2019) Self-Attention GANs
//            Miyato et al. (2018) Spectral Normalization

/// Spectrally normalized convolution primitives
pub mod layers;

/// Gated self-attention over convolutional feature maps
pub mod attention;

/// The generator network
pub mod generator;

/// The discriminator network
pub mod discriminator;

/// Hinge losses
pub mod losses;

/// Training session and instance-noise schedule
pub mod trainer;
