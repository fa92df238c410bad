// ============================================================
// Checkpoint Manager
// ============================================================
// One checkpoint per saved epoch, a single `<epoch>_sagan.mpk`
// bundle holding everything a resume needs: both networks' weight
// records, both optimizers' Adam moments, and the full metric
// history. The bundle is an explicit record type with named fields
// and a schema version, so drift fails at load time instead of at
// first field access.
//
// Full-precision MessagePack is used on purpose: a save/load round
// trip must hand back bit-identical tensors.
//
// The training config is written alongside as `train_config.json`
// so the `sample` command can rebuild the exact architecture before
// loading weights into it.

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, PrecisionSettings, Record, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::infra::metrics::MetricHistory;
use crate::ml::discriminator::DiscriminatorRecord;
use crate::ml::generator::GeneratorRecord;

/// Bumped whenever the bundle layout changes.
pub const CHECKPOINT_VERSION: u32 = 1;

type BundleRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

// ─── Checkpoint bundle ────────────────────────────────────────────────────────

/// Everything persisted for one epoch. `RG`/`RD` are the records of
/// the generator and discriminator optimizers; the trainer pins them
/// through type inference so this module never names the optimizer.
pub struct TrainCheckpoint<B, RG, RD>
where
    B: Backend,
    RG: Record<B>,
    RD: Record<B>,
{
    pub version: u32,
    pub epoch: usize,
    pub generator: GeneratorRecord<B>,
    pub discriminator: DiscriminatorRecord<B>,
    pub g_optimizer: RG,
    pub d_optimizer: RD,
    pub history: MetricHistory,
}

/// Serialized form of the bundle. Field names are the on-disk schema.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TrainCheckpointItem<B, RG, RD, S>
where
    B: Backend,
    RG: Record<B>,
    RD: Record<B>,
    S: PrecisionSettings,
{
    version: u32,
    epoch: usize,
    generator: <GeneratorRecord<B> as Record<B>>::Item<S>,
    discriminator: <DiscriminatorRecord<B> as Record<B>>::Item<S>,
    g_optimizer: RG::Item<S>,
    d_optimizer: RD::Item<S>,
    history: MetricHistory,
}

impl<B, RG, RD> Record<B> for TrainCheckpoint<B, RG, RD>
where
    B: Backend,
    RG: Record<B>,
    RD: Record<B>,
{
    type Item<S: PrecisionSettings> = TrainCheckpointItem<B, RG, RD, S>;

    fn into_item<S: PrecisionSettings>(self) -> Self::Item<S> {
        TrainCheckpointItem {
            version: self.version,
            epoch: self.epoch,
            generator: self.generator.into_item(),
            discriminator: self.discriminator.into_item(),
            g_optimizer: self.g_optimizer.into_item(),
            d_optimizer: self.d_optimizer.into_item(),
            history: self.history,
        }
    }

    fn from_item<S: PrecisionSettings>(item: Self::Item<S>, device: &B::Device) -> Self {
        Self {
            version: item.version,
            epoch: item.epoch,
            generator: GeneratorRecord::from_item(item.generator, device),
            discriminator: DiscriminatorRecord::from_item(item.discriminator, device),
            g_optimizer: RG::from_item(item.g_optimizer, device),
            d_optimizer: RD::from_item(item.d_optimizer, device),
            history: item.history,
        }
    }
}

// ─── CheckpointManager ────────────────────────────────────────────────────────

/// Saves and restores checkpoint bundles under one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager, creating the directory if needed.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Base path for one epoch's bundle; the recorder adds `.mpk`.
    fn bundle_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{epoch}_sagan"))
    }

    pub fn save<B, RG, RD>(&self, checkpoint: TrainCheckpoint<B, RG, RD>) -> Result<()>
    where
        B: Backend,
        RG: Record<B>,
        RD: Record<B>,
    {
        let path = self.bundle_path(checkpoint.epoch);
        BundleRecorder::new()
            .record(checkpoint, path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load<B, RG, RD>(
        &self,
        epoch: usize,
        device: &B::Device,
    ) -> Result<TrainCheckpoint<B, RG, RD>>
    where
        B: Backend,
        RG: Record<B>,
        RD: Record<B>,
    {
        let path = self.bundle_path(epoch);
        let checkpoint: TrainCheckpoint<B, RG, RD> = BundleRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Has epoch {} been saved?",
                    path.display(),
                    epoch
                )
            })?;

        if checkpoint.version != CHECKPOINT_VERSION {
            bail!(
                "Checkpoint '{}' has schema version {} but this build expects {}",
                path.display(),
                checkpoint.version,
                CHECKPOINT_VERSION
            );
        }
        if checkpoint.epoch != epoch {
            bail!(
                "Checkpoint '{}' claims epoch {} but was requested for epoch {}",
                path.display(),
                checkpoint.epoch,
                epoch
            );
        }
        Ok(checkpoint)
    }

    /// Persist the training configuration so `sample` can rebuild the
    /// exact architecture later.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure a training run saved it first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
