use anyhow::{Context, Result};
use autotrain::config::Config;
use autotrain::dispatcher::{Dispatcher, JobStateEvent};
use std::io::Read;
use tracing_subscriber::EnvFilter;

/// Reads one labelling-job state change event as JSON from stdin and runs
/// the augmentation-and-training workflow for it.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("reading event from stdin")?;
    let event: JobStateEvent =
        serde_json::from_str(&raw).context("malformed job state event")?;

    let config = Config::from_env()?;
    let dispatcher = Dispatcher::from_config(&config, None);
    let outcome = dispatcher.handle_event(&event)?;
    println!("{:?}", outcome);
    Ok(())
}
