use anyhow::{Context, Result};
use autotrain::config::Config;
use autotrain::dispatcher::Dispatcher;
use tracing_subscriber::EnvFilter;

/// Manual entry point: runs the workflow for one labelling job by ARN (or
/// bare job name), with debug overlays written to the scratch dir.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let job_arn = std::env::args()
        .nth(1)
        .context("usage: handle_job <labelling-job-arn>")?;

    let config = Config::from_env()?;
    let dump_dir = config.scratch_dir.join("debug");
    std::fs::create_dir_all(&dump_dir)
        .with_context(|| format!("creating debug dump dir {}", dump_dir.display()))?;

    let dispatcher = Dispatcher::from_config(&config, Some(dump_dir));
    let outcome = dispatcher.handle_job(&job_arn)?;
    println!("{:?}", outcome);
    Ok(())
}
