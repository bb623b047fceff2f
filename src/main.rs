use std::path::PathBuf;

use anyhow::Result;
use log::info;

use watertable::config::RunConfig;
use watertable::pipeline::{run, PipelineContext};

fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("watertable.toml"));

    let config = RunConfig::load(&config_path)?;
    info!("starting run from {}", config_path.display());

    let ctx = PipelineContext::prepare(config)?;
    let summary = run(&ctx)?;

    print!("{summary}");
    Ok(())
}
