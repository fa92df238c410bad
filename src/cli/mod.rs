// ============================================================
// CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction; routes to the use cases
// and never computes anything itself.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, SampleArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "sagan",
    version,
    about = "Train a self-attention GAN on an image folder, then sample from checkpoints."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => Self::run_train(args),
            Commands::Sample(args) => Self::run_sample(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on images in: {}", args.data_dir);
        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoints saved.");
        Ok(())
    }

    fn run_sample(args: SampleArgs) -> Result<()> {
        use crate::application::sample_use_case::SampleUseCase;

        let use_case = SampleUseCase::new(args.checkpoint_dir.clone());
        let path = use_case.execute(args.epoch, args.count)?;

        println!("Wrote sample grid: {}", path.display());
        Ok(())
    }
}
