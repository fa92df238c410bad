// ============================================================
// Train Use Case
// ============================================================
// Orchestrates a training run:
//
//   Step 1: Decode the image folder        (data)
//   Step 2: Build the dataset              (data)
//   Step 3: Validate the configuration
//   Step 4: Run the training session       (ml)
//
// The session itself persists the config, metrics, samples, and
// checkpoints through the infra layer.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{dataset::ImageDataset, loader::ImageFolderLoader};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Serialized to train_config.json next to the
// checkpoints so `sample` can rebuild the same architecture later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       String,
    pub checkpoint_dir: String,
    pub sample_dir:     String,

    pub total_steps: usize,
    pub d_iters:     usize,
    pub g_iters:     usize,
    pub batch_size:  usize,

    pub imsize: usize,
    pub nz:     usize,
    pub ngf:    usize,
    pub ndf:    usize,

    pub g_lr:  f64,
    pub d_lr:  f64,
    pub beta1: f64,
    pub beta2: f64,

    pub inst_noise_sigma:       f64,
    pub inst_noise_sigma_iters: usize,

    pub log_step:   usize,
    pub save_epoch: usize,
    pub seed:       u64,

    /// Resume from this previously saved epoch.
    pub pretrained_epoch: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data/images".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            sample_dir:     "samples".to_string(),
            total_steps:    100_000,
            d_iters:        1,
            g_iters:        1,
            batch_size:     64,
            imsize:         64,
            nz:             128,
            ngf:            64,
            ndf:            64,
            g_lr:           1e-4,
            d_lr:           4e-4,
            beta1:          0.0,
            beta2:          0.9,
            inst_noise_sigma:       0.5,
            inst_noise_sigma_iters: 2_000,
            log_step:   10,
            save_epoch: 5,
            seed:       42,
            pretrained_epoch: None,
        }
    }
}

impl TrainConfig {
    /// Reject configurations the network ladders cannot realize.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.imsize == 64, "only imsize 64 is supported, got {}", self.imsize);
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.total_steps > 0, "total_steps must be positive");
        ensure!(self.nz > 0, "latent dimension nz must be positive");
        ensure!(self.d_iters > 0 && self.g_iters > 0, "d_iters and g_iters must be positive");
        ensure!(self.log_step > 0, "log_step must be positive");
        ensure!(self.save_epoch > 0, "save_epoch must be positive");
        ensure!(
            self.ngf % 8 == 0 && self.ngf > 0,
            "ngf must be a positive multiple of 8 for the attention projections, got {}",
            self.ngf
        );
        ensure!(
            self.ndf % 2 == 0 && self.ndf > 0,
            "ndf must be a positive even number for the attention projections, got {}",
            self.ndf
        );
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;

        tracing::info!("Loading training images from '{}'", cfg.data_dir);
        let loader = ImageFolderLoader::new(&cfg.data_dir, cfg.imsize);
        let samples = loader.load_all()?;
        ensure!(
            samples.len() >= cfg.batch_size,
            "need at least one full batch ({} images), found {} in '{}'",
            cfg.batch_size,
            samples.len(),
            cfg.data_dir
        );

        let dataset = ImageDataset::new(samples);
        run_training(cfg, dataset)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn unsupported_image_size_is_rejected() {
        let cfg = TrainConfig {
            imsize: 128,
            ..TrainConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn attention_incompatible_widths_are_rejected() {
        let cfg = TrainConfig {
            ngf: 12,
            ..TrainConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = TrainConfig {
            ndf: 7,
            ..TrainConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
