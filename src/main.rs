#![recursion_limit = "256"]

mod application;
mod cli;
mod data;
mod infra;
mod ml;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sagan=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
