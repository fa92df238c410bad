// ============================================================
// Hinge Losses
// ============================================================
// The geometric GAN objectives: the discriminator is pushed to
// score reals above +1 and fakes below -1, the generator is pushed
// to raise the discriminator's score on fakes. Pure functions of
// their inputs; each returns a scalar tensor that participates in
// the autodiff graph.
//
// Reference: Lim & Ye (2017) Geometric GAN

use burn::prelude::*;
use burn::tensor::activation::relu;

/// `mean(relu(1 - d_real))`: penalizes real scores below the +1 margin.
pub fn d_hinge_real<B: Backend>(d_real: Tensor<B, 1>) -> Tensor<B, 1> {
    relu(d_real.neg().add_scalar(1.0)).mean()
}

/// `mean(relu(1 + d_fake))`: penalizes fake scores above the -1 margin.
pub fn d_hinge_fake<B: Backend>(d_fake: Tensor<B, 1>) -> Tensor<B, 1> {
    relu(d_fake.add_scalar(1.0)).mean()
}

/// `-mean(d_fake)`: the generator maximizes the fake score.
pub fn g_hinge<B: Backend>(d_fake: Tensor<B, 1>) -> Tensor<B, 1> {
    d_fake.mean().neg()
}
