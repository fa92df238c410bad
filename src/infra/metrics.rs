// ============================================================
// Metrics Sink
// ============================================================
// Epoch-level training metrics, three ways:
//
//   StepMetrics      — one training step's instantaneous values
//   EpochAccumulator — collects step values on the logging cadence
//                      and averages them at epoch end
//   MetricHistory    — the eight append-only per-epoch series the
//                      checkpoint bundle persists
//   MetricsLogger    — appends each epoch row to metrics.csv under
//                      the checkpoint directory
//
// The eight series are the same scalars the original run charted:
// discriminator loss/real/fake and both attention gates, generator
// loss and both attention gates.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// Instantaneous values from a single training step.
#[derive(Debug, Clone, Copy)]
pub struct StepMetrics {
    pub d_loss: f32,
    pub d_real: f32,
    pub d_fake: f32,
    pub g_loss: f32,
    pub g_gamma1: f32,
    pub g_gamma2: f32,
    pub d_gamma1: f32,
    pub d_gamma2: f32,
}

impl StepMetrics {
    pub fn to_epoch(self, epoch: usize) -> EpochMetrics {
        EpochMetrics {
            epoch,
            d_loss: self.d_loss,
            d_real: self.d_real,
            d_fake: self.d_fake,
            g_loss: self.g_loss,
            g_gamma1: self.g_gamma1,
            g_gamma2: self.g_gamma2,
            d_gamma1: self.d_gamma1,
            d_gamma2: self.d_gamma2,
        }
    }
}

/// One averaged row of metrics for a finished epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub d_loss: f32,
    pub d_real: f32,
    pub d_fake: f32,
    pub g_loss: f32,
    pub g_gamma1: f32,
    pub g_gamma2: f32,
    pub d_gamma1: f32,
    pub d_gamma2: f32,
}

// ─── EpochAccumulator ─────────────────────────────────────────────────────────

/// Collects step metrics over one epoch and averages them.
#[derive(Debug, Default)]
pub struct EpochAccumulator {
    rows: Vec<StepMetrics>,
}

impl EpochAccumulator {
    pub fn record(&mut self, step: &StepMetrics) {
        self.rows.push(*step);
    }

    /// Mean over everything recorded this epoch, or `None` if the
    /// logging cadence never fired.
    pub fn mean(&self, epoch: usize) -> Option<EpochMetrics> {
        if self.rows.is_empty() {
            return None;
        }
        let n = self.rows.len() as f32;
        let sum = |f: fn(&StepMetrics) -> f32| self.rows.iter().map(f).sum::<f32>() / n;

        Some(EpochMetrics {
            epoch,
            d_loss: sum(|m| m.d_loss),
            d_real: sum(|m| m.d_real),
            d_fake: sum(|m| m.d_fake),
            g_loss: sum(|m| m.g_loss),
            g_gamma1: sum(|m| m.g_gamma1),
            g_gamma2: sum(|m| m.g_gamma2),
            d_gamma1: sum(|m| m.d_gamma1),
            d_gamma2: sum(|m| m.d_gamma2),
        })
    }
}

// ─── MetricHistory ────────────────────────────────────────────────────────────

/// The per-epoch series carried across the whole run and persisted
/// inside every checkpoint. Append-only; one entry per logged epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricHistory {
    pub d_losses: Vec<f32>,
    pub d_losses_real: Vec<f32>,
    pub d_losses_fake: Vec<f32>,
    pub d_gamma1: Vec<f32>,
    pub d_gamma2: Vec<f32>,
    pub g_losses: Vec<f32>,
    pub g_gamma1: Vec<f32>,
    pub g_gamma2: Vec<f32>,
}

impl MetricHistory {
    pub fn push(&mut self, m: &EpochMetrics) {
        self.d_losses.push(m.d_loss);
        self.d_losses_real.push(m.d_real);
        self.d_losses_fake.push(m.d_fake);
        self.d_gamma1.push(m.d_gamma1);
        self.d_gamma2.push(m.d_gamma2);
        self.g_losses.push(m.g_loss);
        self.g_gamma1.push(m.g_gamma1);
        self.g_gamma2.push(m.g_gamma2);
    }

    pub fn epochs(&self) -> usize {
        self.d_losses.len()
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────

/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the CSV header if the file is new
    /// so a resumed run keeps appending to the same log.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(
                f,
                "epoch,d_loss,d_real,d_fake,g_loss,g_gamma1,g_gamma2,d_gamma1,d_gamma2"
            )?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.d_loss,
            m.d_real,
            m.d_fake,
            m.g_loss,
            m.g_gamma1,
            m.g_gamma2,
            m.d_gamma1,
            m.d_gamma2,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
