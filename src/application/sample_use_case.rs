// ============================================================
// Sample Use Case
// ============================================================
// Loads a trained checkpoint and writes one grid of fresh
// generator samples, without touching the training data. The
// architecture comes from the train_config.json the training run
// saved; the requested epoch's bundle supplies the weights.

use anyhow::Result;
use std::path::PathBuf;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::TrainSession;

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub struct SampleUseCase {
    checkpoint_dir: String,
}

impl SampleUseCase {
    pub fn new(checkpoint_dir: impl Into<String>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    /// Generate `count` images from the checkpoint saved at `epoch`
    /// and write them as one grid PNG. Returns the path written.
    pub fn execute(&self, epoch: usize, count: usize) -> Result<PathBuf> {
        let manager = CheckpointManager::new(&self.checkpoint_dir);
        let mut config = manager.load_config()?;
        config.pretrained_epoch = Some(epoch);

        let device = burn::backend::wgpu::WgpuDevice::default();
        let session = TrainSession::<MyBackend>::new(config, device)?;

        let path = session.sample_grid(count, &format!("sample_epoch_{epoch}.png"))?;
        tracing::info!("Wrote {} samples to '{}'", count, path.display());
        Ok(path)
    }
}
