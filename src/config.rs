use anyhow::{Context, Result};
use std::path::PathBuf;

/// Process configuration, read from the environment once at startup and
/// passed into the component constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared asset bucket training outputs are written to.
    pub asset_bucket: String,
    pub storage_endpoint: String,
    pub labelling_endpoint: String,
    pub training_endpoint: String,
    /// Bearer token attached to every service call, when set.
    pub api_token: Option<String>,
    pub augmentations_per_image: u32,
    pub scratch_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Ok(Config {
            asset_bucket: require("STORAGE_BUCKET")?,
            storage_endpoint: require("STORAGE_ENDPOINT")?,
            labelling_endpoint: require("LABELLING_ENDPOINT")?,
            training_endpoint: require("TRAINING_ENDPOINT")?,
            api_token: std::env::var("SERVICE_API_TOKEN").ok(),
            augmentations_per_image: match std::env::var("AUGMENTATIONS_PER_IMAGE") {
                Ok(raw) => raw
                    .parse()
                    .context("AUGMENTATIONS_PER_IMAGE must be an integer")?,
                Err(_) => crate::augment::DEFAULT_AUGMENTATIONS_PER_IMAGE,
            },
            scratch_dir: std::env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp")),
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}
