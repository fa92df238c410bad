// ============================================================
// Layer Primitives
// ============================================================
// Spectrally normalized (de)convolutions shared by the generator
// and discriminator, plus the 1x1 convolution used inside the
// self-attention block.
//
// Spectral normalization divides a layer's weight by an estimate
// of its largest singular value, keeping the layer roughly
// 1-Lipschitz. The estimate comes from power iteration: a
// persisted left-singular-vector `u` is refined by one iteration
// per forward pass against the current weight. `u` is a buffer,
// not a trainable parameter: it carries no gradient and is only
// advanced through the explicit `refresh` call the trainer makes
// after each optimizer step.
//
// Reference: Miyato et al. (2018) Spectral Normalization for GANs

use burn::{
    module::{Module, Param},
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::{
        module::{conv2d, conv_transpose2d},
        ops::{ConvOptions, ConvTransposeOptions},
        Distribution,
    },
};

/// Plain 1x1 convolution (stride 1, no padding, with bias): the
/// projection used by the self-attention block.
pub fn conv1x1<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [1, 1]).init(device)
}

/// L2-normalize a vector, guarding against a zero norm.
fn l2_normalize<B: Backend>(x: Tensor<B, 1>) -> Tensor<B, 1> {
    let norm = x.clone().powf_scalar(2.0).sum().sqrt().clamp_min(1e-12);
    x.div(norm)
}

/// Xavier-uniform weight tensor for a (de)convolution kernel.
fn xavier_uniform<B: Backend>(
    shape: [usize; 4],
    fan_in: usize,
    fan_out: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Tensor::random(shape, Distribution::Uniform(-limit, limit), device)
}

/// Fresh power-iteration buffer: a random unit vector of length `dim`.
/// Stored as a `Param` so checkpoints carry it, but always read
/// detached; no gradient ever reaches it and the optimizer skips it.
fn init_iterate<B: Backend>(dim: usize, device: &B::Device) -> Param<Tensor<B, 1>> {
    let u = Tensor::random([dim], Distribution::Normal(0.0, 1.0), device);
    Param::from_tensor(l2_normalize(u))
}

/// One power-iteration refinement of `u` against the weight matrix,
/// returning the refined pair `(u, v)`.
fn power_iteration<B: Backend>(
    w_mat: Tensor<B, 2>,
    u: Tensor<B, 1>,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let v = l2_normalize(
        w_mat
            .clone()
            .transpose()
            .matmul(u.unsqueeze_dim(1))
            .squeeze(1),
    );
    let u = l2_normalize(w_mat.matmul(v.clone().unsqueeze_dim(1)).squeeze(1));
    (u, v)
}

/// Spectral norm `u^T W v`. The iterates are detached; the weight is
/// not, so gradients flow through the normalization.
fn spectral_sigma<B: Backend>(
    w_mat: Tensor<B, 2>,
    u: Tensor<B, 1>,
    v: Tensor<B, 1>,
) -> Tensor<B, 1> {
    w_mat
        .matmul(v.unsqueeze_dim(1))
        .squeeze::<1>(1)
        .mul(u)
        .sum()
        .clamp_min(1e-12)
}

// ─── SpectralConv2d ───────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct SpectralConv2dConfig {
    pub channels_in:  usize,
    pub channels_out: usize,
    pub kernel_size:  usize,
    #[config(default = 1)]
    pub stride:  usize,
    #[config(default = 0)]
    pub padding: usize,
}

/// Convolution whose weight is divided by its largest singular value.
/// Weight layout `[out, in, k, k]`; the power iteration sees it as an
/// `[out, in*k*k]` matrix.
#[derive(Module, Debug)]
pub struct SpectralConv2d<B: Backend> {
    weight: Param<Tensor<B, 4>>,
    bias:   Param<Tensor<B, 1>>,
    u:      Param<Tensor<B, 1>>,
    stride:  usize,
    padding: usize,
}

impl SpectralConv2dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpectralConv2d<B> {
        let k = self.kernel_size;
        let fan_in = self.channels_in * k * k;
        let fan_out = self.channels_out * k * k;
        SpectralConv2d {
            weight: Param::from_tensor(xavier_uniform(
                [self.channels_out, self.channels_in, k, k],
                fan_in,
                fan_out,
                device,
            )),
            bias: Param::from_tensor(Tensor::zeros([self.channels_out], device)),
            u: init_iterate(self.channels_out, device),
            stride: self.stride,
            padding: self.padding,
        }
    }
}

impl<B: Backend> SpectralConv2d<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let weight = self.weight.val();
        let [out_c, in_c, kh, kw] = weight.dims();
        let w_mat = weight.clone().reshape([out_c, in_c * kh * kw]);

        let (u, v) = power_iteration(w_mat.clone().detach(), self.u.val().detach());
        let sigma = spectral_sigma(w_mat, u, v);
        let weight = weight.div(sigma.unsqueeze::<4>());

        conv2d(
            input,
            weight,
            Some(self.bias.val()),
            ConvOptions::new([self.stride; 2], [self.padding; 2], [1, 1], 1),
        )
    }

    /// Advance the persisted power iterate against the current weight.
    /// Called once per optimizer step.
    pub fn refresh(mut self) -> Self {
        let weight = self.weight.val().detach();
        let [out_c, in_c, kh, kw] = weight.dims();
        let w_mat = weight.reshape([out_c, in_c * kh * kw]);
        let (u, _) = power_iteration(w_mat, self.u.val().detach());
        self.u = Param::from_tensor(u);
        self
    }
}

// ─── SpectralConvTranspose2d ──────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct SpectralConvTranspose2dConfig {
    pub channels_in:  usize,
    pub channels_out: usize,
    pub kernel_size:  usize,
    #[config(default = 1)]
    pub stride:  usize,
    #[config(default = 0)]
    pub padding: usize,
}

/// Transposed convolution with the same spectral treatment.
/// Weight layout `[in, out, k, k]`; the power iteration sees an
/// `[in, out*k*k]` matrix, matching the transposed kernel layout.
#[derive(Module, Debug)]
pub struct SpectralConvTranspose2d<B: Backend> {
    weight: Param<Tensor<B, 4>>,
    bias:   Param<Tensor<B, 1>>,
    u:      Param<Tensor<B, 1>>,
    stride:  usize,
    padding: usize,
}

impl SpectralConvTranspose2dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SpectralConvTranspose2d<B> {
        let k = self.kernel_size;
        let fan_in = self.channels_in * k * k;
        let fan_out = self.channels_out * k * k;
        SpectralConvTranspose2d {
            weight: Param::from_tensor(xavier_uniform(
                [self.channels_in, self.channels_out, k, k],
                fan_in,
                fan_out,
                device,
            )),
            bias: Param::from_tensor(Tensor::zeros([self.channels_out], device)),
            u: init_iterate(self.channels_in, device),
            stride: self.stride,
            padding: self.padding,
        }
    }
}

impl<B: Backend> SpectralConvTranspose2d<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let weight = self.weight.val();
        let [in_c, out_c, kh, kw] = weight.dims();
        let w_mat = weight.clone().reshape([in_c, out_c * kh * kw]);

        let (u, v) = power_iteration(w_mat.clone().detach(), self.u.val().detach());
        let sigma = spectral_sigma(w_mat, u, v);
        let weight = weight.div(sigma.unsqueeze::<4>());

        conv_transpose2d(
            input,
            weight,
            Some(self.bias.val()),
            ConvTransposeOptions::new([self.stride; 2], [self.padding; 2], [0; 2], [1; 2], 1),
        )
    }

    /// Advance the persisted power iterate against the current weight.
    pub fn refresh(mut self) -> Self {
        let weight = self.weight.val().detach();
        let [in_c, out_c, kh, kw] = weight.dims();
        let w_mat = weight.reshape([in_c, out_c * kh * kw]);
        let (u, _) = power_iteration(w_mat, self.u.val().detach());
        self.u = Param::from_tensor(u);
        self
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn spectral_conv_preserves_expected_shape() {
        let device = <TestBackend as Backend>::Device::default();
        let conv = SpectralConv2dConfig::new(3, 8, 4)
            .with_stride(2)
            .with_padding(1)
            .init::<TestBackend>(&device);

        let input = Tensor::random([2, 3, 16, 16], Distribution::Normal(0.0, 1.0), &device);
        let output = conv.forward(input);
        assert_eq!(output.dims(), [2, 8, 8, 8]);

        let values: Vec<f32> = output.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn spectral_deconv_doubles_spatial_size() {
        let device = <TestBackend as Backend>::Device::default();
        let deconv = SpectralConvTranspose2dConfig::new(8, 4, 4)
            .with_stride(2)
            .with_padding(1)
            .init::<TestBackend>(&device);

        let input = Tensor::random([2, 8, 8, 8], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(deconv.forward(input).dims(), [2, 4, 16, 16]);
    }

    #[test]
    fn normalized_weight_has_unit_spectral_norm_estimate() {
        let device = <TestBackend as Backend>::Device::default();
        let conv = SpectralConv2dConfig::new(4, 4, 3)
            .with_padding(1)
            .init::<TestBackend>(&device);

        // After several refresh rounds the iterate converges and the
        // sigma estimate of W / sigma(W) should sit close to one.
        let conv = conv.refresh().refresh().refresh().refresh();

        let weight = conv.weight.val();
        let [out_c, in_c, kh, kw] = weight.dims();
        let w_mat = weight.reshape([out_c, in_c * kh * kw]);
        let (u, v) = power_iteration(w_mat.clone(), conv.u.val());
        let sigma: f32 = spectral_sigma(w_mat.clone(), u.clone(), v.clone())
            .into_scalar()
            .elem();

        let normalized = w_mat.div_scalar(sigma);
        let (u, v) = power_iteration(normalized.clone(), u);
        let sigma_after: f32 = spectral_sigma(normalized, u, v).into_scalar().elem();
        assert!((sigma_after - 1.0).abs() < 0.05, "sigma = {sigma_after}");
    }
}
