use crate::storage::StorageUri;
use anyhow::{anyhow, ensure, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Submission of one training run against an existing project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateProjectVersionRequest {
    pub project_arn: String,
    pub version_name: String,
    /// Bucket the run writes its outputs to.
    pub output_bucket: String,
    /// Prefix inside the output bucket, named after the version.
    pub output_prefix: String,
    /// Augmented manifest used as training data.
    pub training_manifest_bucket: String,
    pub training_manifest_key: String,
    /// Ask the service to derive the test split from the training data.
    pub auto_create_test_split: bool,
}

#[derive(Debug, Deserialize)]
struct ArnResponse {
    arn: String,
}

/// Drives the managed vision-training service.
pub trait TrainingService {
    fn create_project(&self, name: &str) -> Result<String>;
    fn create_project_version(&self, request: &CreateProjectVersionRequest) -> Result<String>;
}

pub struct HttpTrainingService {
    endpoint: String,
    token: Option<String>,
}

impl HttpTrainingService {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> HttpTrainingService {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        HttpTrainingService { endpoint, token }
    }

    fn post_for_arn(&self, url: &str, body: &serde_json::Value) -> Result<String> {
        debug!("POST {}", url);
        async_std::task::block_on(async {
            let mut req = surf::post(url).body_json(body)?;
            if let Some(token) = &self.token {
                req = req.set_header("Authorization", format!("Bearer {}", token));
            }
            let mut res = req.await.map_err(|e| anyhow!("POST {} failed: {}", url, e))?;
            ensure!(
                res.status().is_success(),
                "POST {} returned status {}",
                url,
                res.status()
            );
            let body = res
                .body_bytes()
                .await
                .map_err(|e| anyhow!("reading body of {} failed: {}", url, e))?;
            let parsed: ArnResponse =
                serde_json::from_slice(&body).context("malformed training service response")?;
            Ok(parsed.arn)
        })
    }
}

impl TrainingService for HttpTrainingService {
    fn create_project(&self, name: &str) -> Result<String> {
        debug!("project name: {}", name);
        let url = format!("{}/projects", self.endpoint);
        let arn = self
            .post_for_arn(&url, &serde_json::json!({ "name": name }))
            .with_context(|| format!("creating training project {}", name))?;
        debug!("created training project {}", arn);
        Ok(arn)
    }

    fn create_project_version(&self, request: &CreateProjectVersionRequest) -> Result<String> {
        let url = format!("{}/projects/versions", self.endpoint);
        let body =
            serde_json::to_value(request).context("serializing project version request")?;
        let arn = self
            .post_for_arn(&url, &body)
            .with_context(|| format!("creating project version {}", request.version_name))?;
        debug!("created project version {}", arn);
        Ok(arn)
    }
}

/// Creates a training project and submits one training run over the
/// augmented manifest. Fire and forget: the service reports training
/// completion through its own events, not through this call. Returns the
/// project and version ARNs.
pub fn submit_training_run<T: TrainingService>(
    training: &T,
    asset_bucket: &str,
    manifest: &StorageUri,
) -> Result<(String, String)> {
    let project_name = format!("bb-{}", Utc::now().timestamp());
    let project_arn = training.create_project(&project_name)?;

    let version_name = format!("v{}", Utc::now().timestamp());
    let version_arn = training.create_project_version(&CreateProjectVersionRequest {
        project_arn: project_arn.clone(),
        version_name: version_name.clone(),
        output_bucket: asset_bucket.to_owned(),
        output_prefix: version_name,
        training_manifest_bucket: manifest.bucket.clone(),
        training_manifest_key: manifest.key.clone(),
        auto_create_test_split: true,
    })?;
    info!("created project version {}", version_arn);

    Ok((project_arn, version_arn))
}
