// ============================================================
// CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` runs the adversarial loop, `sample`
// renders a grid from a saved checkpoint. clap's derive macros
// generate the flag parsing and help text.

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the SAGAN on a folder of images
    Train(TrainArgs),

    /// Generate a sample grid from a saved checkpoint
    Sample(SampleArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory of training images (png/jpg/jpeg/bmp)
    #[arg(long, default_value = "data/images")]
    pub data_dir: String,

    /// Directory for checkpoints, the config sidecar, and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Directory for per-epoch sample grids
    #[arg(long, default_value = "samples")]
    pub sample_dir: String,

    /// Total optimizer steps across the whole run
    #[arg(long, default_value_t = 100_000)]
    pub total_steps: usize,

    /// Discriminator updates per step
    #[arg(long, default_value_t = 1)]
    pub d_iters: usize,

    /// Generator updates per step
    #[arg(long, default_value_t = 1)]
    pub g_iters: usize,

    /// Images per batch
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Image side length; the network ladders are built for 64
    #[arg(long, default_value_t = 64)]
    pub imsize: usize,

    /// Latent vector dimension
    #[arg(long, default_value_t = 128)]
    pub nz: usize,

    /// Generator base channel width (multiple of 8)
    #[arg(long, default_value_t = 64)]
    pub ngf: usize,

    /// Discriminator base channel width (even)
    #[arg(long, default_value_t = 64)]
    pub ndf: usize,

    /// Generator learning rate (TTUR: slower than the discriminator)
    #[arg(long, default_value_t = 1e-4)]
    pub g_lr: f64,

    /// Discriminator learning rate
    #[arg(long, default_value_t = 4e-4)]
    pub d_lr: f64,

    /// Adam beta1
    #[arg(long, default_value_t = 0.0)]
    pub beta1: f64,

    /// Adam beta2
    #[arg(long, default_value_t = 0.9)]
    pub beta2: f64,

    /// Initial instance-noise std shown to the discriminator
    #[arg(long, default_value_t = 0.5)]
    pub inst_noise_sigma: f64,

    /// Steps over which the instance noise decays to zero
    #[arg(long, default_value_t = 2_000)]
    pub inst_noise_sigma_iters: usize,

    /// Record metrics every this many steps
    #[arg(long, default_value_t = 10)]
    pub log_step: usize,

    /// Save a checkpoint every this many epochs
    #[arg(long, default_value_t = 5)]
    pub save_epoch: usize,

    /// Shuffle/sampling seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Resume from this saved epoch's checkpoint
    #[arg(long)]
    pub pretrained_epoch: Option<usize>,
}

/// Convert CLI args into the application-layer config; the
/// application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            sample_dir:     a.sample_dir,
            total_steps:    a.total_steps,
            d_iters:        a.d_iters,
            g_iters:        a.g_iters,
            batch_size:     a.batch_size,
            imsize:         a.imsize,
            nz:             a.nz,
            ngf:            a.ngf,
            ndf:            a.ndf,
            g_lr:           a.g_lr,
            d_lr:           a.d_lr,
            beta1:          a.beta1,
            beta2:          a.beta2,
            inst_noise_sigma:       a.inst_noise_sigma,
            inst_noise_sigma_iters: a.inst_noise_sigma_iters,
            log_step:   a.log_step,
            save_epoch: a.save_epoch,
            seed:       a.seed,
            pretrained_epoch: a.pretrained_epoch,
        }
    }
}

/// All arguments for the `sample` command.
#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Epoch number of the checkpoint to sample from
    #[arg(long)]
    pub epoch: usize,

    /// How many images to generate
    #[arg(long, default_value_t = 64)]
    pub count: usize,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}
