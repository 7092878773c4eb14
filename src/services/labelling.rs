use anyhow::{anyhow, ensure, Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Description of a labelling job as reported by the managed service.
#[derive(Debug, Clone, Deserialize)]
pub struct LabellingJobDescription {
    pub name: String,
    pub output_config: OutputConfig,
}

/// Where the labelling service wrote the job's outputs.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Base storage URI for the job's outputs.
    pub output_path: String,
}

/// Queries the managed labelling service.
pub trait LabellingService {
    /// Looks a job up by name. `None` means the service does not know it.
    fn describe_job(&self, job_name: &str) -> Result<Option<LabellingJobDescription>>;
}

pub struct HttpLabellingService {
    endpoint: String,
    token: Option<String>,
}

impl HttpLabellingService {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> HttpLabellingService {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        HttpLabellingService { endpoint, token }
    }
}

impl LabellingService for HttpLabellingService {
    fn describe_job(&self, job_name: &str) -> Result<Option<LabellingJobDescription>> {
        let url = format!("{}/jobs/{}", self.endpoint, job_name);
        debug!("GET {}", url);
        async_std::task::block_on(async {
            let mut req = surf::get(&url);
            if let Some(token) = &self.token {
                req = req.set_header("Authorization", format!("Bearer {}", token));
            }
            let mut res = req.await.map_err(|e| anyhow!("GET {} failed: {}", url, e))?;
            if res.status() == 404 {
                return Ok(None);
            }
            ensure!(
                res.status().is_success(),
                "GET {} returned status {}",
                url,
                res.status()
            );
            let body = res
                .body_bytes()
                .await
                .map_err(|e| anyhow!("reading body of {} failed: {}", url, e))?;
            let description: LabellingJobDescription =
                serde_json::from_slice(&body).context("malformed labelling job description")?;
            Ok(Some(description))
        })
        .with_context(|| format!("describing labelling job {}", job_name))
    }
}
