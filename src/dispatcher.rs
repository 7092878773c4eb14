use crate::augment::Augmenter;
use crate::config::Config;
use crate::manifest;
use crate::services::labelling::{HttpLabellingService, LabellingService};
use crate::services::training::{submit_training_run, HttpTrainingService, TrainingService};
use crate::storage::{HttpObjectStore, ObjectStore, StorageUri};
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const COMPLETED_STATUS: &str = "Completed";

/// Notification emitted by the event bus when a labelling job changes state.
/// Unknown envelope fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStateEvent {
    pub resources: Vec<String>,
    pub detail: JobStateDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStateDetail {
    #[serde(rename = "LabelingJobStatus")]
    pub labelling_job_status: String,
}

/// What a dispatched event amounted to.
#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Irrelevant event, deliberately skipped without side effects.
    Ignored,
    /// The labelling service does not know the job named by the event.
    JobNotFound,
    /// Training submitted over the augmented dataset.
    Submitted {
        project_arn: String,
        project_version_arn: String,
    },
}

/// Settings the dispatcher threads through the workflow components.
pub struct DispatcherConfig {
    pub asset_bucket: String,
    pub augmentations_per_image: u32,
    pub scratch_dir: PathBuf,
    pub debug_dump_dir: Option<PathBuf>,
}

/// Runs manifest read → augmentation → manifest write → training submission
/// for one completed-labelling-job event at a time. Always returns to idle:
/// errors propagate to the caller and fail that invocation only.
pub struct Dispatcher<S, L, T> {
    store: S,
    labelling: L,
    training: T,
    config: DispatcherConfig,
}

impl<S, L, T> Dispatcher<S, L, T>
where
    S: ObjectStore,
    L: LabellingService,
    T: TrainingService,
{
    pub fn new(store: S, labelling: L, training: T, config: DispatcherConfig) -> Dispatcher<S, L, T> {
        Dispatcher {
            store,
            labelling,
            training,
            config,
        }
    }

    pub fn handle_event(&self, event: &JobStateEvent) -> Result<DispatchOutcome> {
        debug!("labelling job state change event received");

        let job_arn = match event.resources.first() {
            Some(arn) => arn,
            None => {
                warn!("no labelling job specified, skipping event");
                return Ok(DispatchOutcome::Ignored);
            }
        };
        if event.detail.labelling_job_status != COMPLETED_STATUS {
            warn!(
                "job status is {:?}, not {:?}, skipping event",
                event.detail.labelling_job_status, COMPLETED_STATUS
            );
            return Ok(DispatchOutcome::Ignored);
        }

        self.handle_job(job_arn)
    }

    /// Runs the workflow for one completed job, identified by ARN.
    pub fn handle_job(&self, job_arn: &str) -> Result<DispatchOutcome> {
        let job_name = job_name_from_arn(job_arn);
        debug!("job name: {}", job_name);

        let job = match self.labelling.describe_job(job_name)? {
            Some(job) => job,
            None => {
                warn!("cannot find labelling job {}", job_name);
                return Ok(DispatchOutcome::JobNotFound);
            }
        };

        let manifest_uri = StorageUri::parse(&format!(
            "{}/{}/manifests/output/output.manifest",
            job.output_config.output_path.trim_end_matches('/'),
            job_name
        ))?;
        debug!("output manifest: {}", manifest_uri);

        let manifest = manifest::read_manifest(&self.store, &manifest_uri)?;

        let mut augmenter = Augmenter::new(&self.store, self.config.augmentations_per_image);
        if let Some(dir) = &self.config.debug_dump_dir {
            augmenter = augmenter.with_debug_dump_dir(dir.clone());
        }
        let records = augmenter.augment_records(&manifest.records)?;

        let new_manifest = manifest::write_augmented_manifest(
            &self.store,
            &self.config.scratch_dir,
            &manifest_uri,
            &records,
        )?;
        info!("augmented manifest at {}", new_manifest);

        let (project_arn, project_version_arn) =
            submit_training_run(&self.training, &self.config.asset_bucket, &new_manifest)?;
        info!("submitted training run {}", project_version_arn);

        Ok(DispatchOutcome::Submitted {
            project_arn,
            project_version_arn,
        })
    }
}

impl Dispatcher<HttpObjectStore, HttpLabellingService, HttpTrainingService> {
    /// Wires the HTTP-backed components from process configuration.
    pub fn from_config(
        config: &Config,
        debug_dump_dir: Option<PathBuf>,
    ) -> Dispatcher<HttpObjectStore, HttpLabellingService, HttpTrainingService> {
        Dispatcher::new(
            HttpObjectStore::new(config.storage_endpoint.clone(), config.api_token.clone()),
            HttpLabellingService::new(config.labelling_endpoint.clone(), config.api_token.clone()),
            HttpTrainingService::new(config.training_endpoint.clone(), config.api_token.clone()),
            DispatcherConfig {
                asset_bucket: config.asset_bucket.clone(),
                augmentations_per_image: config.augmentations_per_image,
                scratch_dir: config.scratch_dir.clone(),
                debug_dump_dir,
            },
        )
    }
}

/// The job name is the ARN suffix after the last `/`.
fn job_name_from_arn(arn: &str) -> &str {
    match arn.rfind('/') {
        Some(idx) => &arn[idx + 1..],
        None => arn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::labelling::{LabellingJobDescription, OutputConfig};
    use crate::services::training::CreateProjectVersionRequest;
    use crate::storage::mem::MemoryObjectStore;
    use std::cell::Cell;
    use std::cell::RefCell;

    const JOB_ARN: &str =
        "arn:aws:sagemaker:ap-southeast-2:123456789012:labeling-job/brand-compliance-1";

    const RECORD_LINE: &str = r#"{"source-ref":"s3://b/k/img.jpg","your-label-attribute":{"annotations":[{"class_id":1,"left":10,"top":10,"width":50,"height":50}],"image_size":[{"width":640,"height":480,"depth":3}]}}"#;

    /// Object store that fails the test if it is touched at all.
    struct UntouchableStore;

    impl ObjectStore for UntouchableStore {
        fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            panic!("unexpected get_object s3://{}/{}", bucket, key);
        }

        fn put_object(&self, bucket: &str, key: &str, _body: Vec<u8>) -> Result<()> {
            panic!("unexpected put_object s3://{}/{}", bucket, key);
        }
    }

    #[derive(Default)]
    struct StubLabelling {
        description: Option<LabellingJobDescription>,
        calls: Cell<u32>,
    }

    impl LabellingService for StubLabelling {
        fn describe_job(&self, _job_name: &str) -> Result<Option<LabellingJobDescription>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.description.clone())
        }
    }

    #[derive(Default)]
    struct StubTraining {
        versions: RefCell<Vec<CreateProjectVersionRequest>>,
        calls: Cell<u32>,
    }

    impl TrainingService for StubTraining {
        fn create_project(&self, name: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(format!("arn:project/{}", name))
        }

        fn create_project_version(
            &self,
            request: &CreateProjectVersionRequest,
        ) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.versions.borrow_mut().push(request.clone());
            Ok(format!("arn:version/{}", request.version_name))
        }
    }

    fn test_config(scratch_dir: PathBuf) -> DispatcherConfig {
        DispatcherConfig {
            asset_bucket: "assets".to_owned(),
            augmentations_per_image: 2,
            scratch_dir,
            debug_dump_dir: None,
        }
    }

    fn event(resources: Vec<&str>, status: &str) -> JobStateEvent {
        JobStateEvent {
            resources: resources.into_iter().map(str::to_owned).collect(),
            detail: JobStateDetail {
                labelling_job_status: status.to_owned(),
            },
        }
    }

    #[test]
    fn event_deserializes_from_the_bus_envelope() {
        let raw = format!(
            r#"{{"version":"0","id":"4cfc5cfb","detail-type":"Labeling Job State Change","source":"labelling","resources":["{}"],"detail":{{"LabelingJobStatus":"Completed"}}}}"#,
            JOB_ARN
        );
        let event: JobStateEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.resources.len(), 1);
        assert_eq!(event.detail.labelling_job_status, "Completed");
    }

    #[test]
    fn incomplete_job_event_is_ignored_without_side_effects() {
        let dispatcher = Dispatcher::new(
            UntouchableStore,
            StubLabelling::default(),
            StubTraining::default(),
            test_config(PathBuf::from("/tmp")),
        );

        let outcome = dispatcher
            .handle_event(&event(vec![JOB_ARN], "InProgress"))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(dispatcher.labelling.calls.get(), 0);
        assert_eq!(dispatcher.training.calls.get(), 0);
    }

    #[test]
    fn event_without_resources_is_ignored_without_side_effects() {
        let dispatcher = Dispatcher::new(
            UntouchableStore,
            StubLabelling::default(),
            StubTraining::default(),
            test_config(PathBuf::from("/tmp")),
        );

        let outcome = dispatcher.handle_event(&event(vec![], "Completed")).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(dispatcher.labelling.calls.get(), 0);
        assert_eq!(dispatcher.training.calls.get(), 0);
    }

    #[test]
    fn unknown_job_returns_early() {
        let dispatcher = Dispatcher::new(
            UntouchableStore,
            StubLabelling::default(),
            StubTraining::default(),
            test_config(PathBuf::from("/tmp")),
        );

        let outcome = dispatcher
            .handle_event(&event(vec![JOB_ARN], "Completed"))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::JobNotFound);
        assert_eq!(dispatcher.labelling.calls.get(), 1);
        assert_eq!(dispatcher.training.calls.get(), 0);
    }

    #[test]
    fn completed_job_runs_the_whole_workflow() {
        let store = MemoryObjectStore::new();
        store.insert(
            "b",
            "jobs-output/brand-compliance-1/manifests/output/output.manifest",
            RECORD_LINE.as_bytes().to_vec(),
        );
        let source = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 48, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 7])
        }));
        let mut png = Vec::new();
        source
            .write_to(&mut png, image::ImageOutputFormat::PNG)
            .unwrap();
        store.insert("b", "k/img.jpg", png);

        let labelling = StubLabelling {
            description: Some(LabellingJobDescription {
                name: "brand-compliance-1".to_owned(),
                output_config: OutputConfig {
                    output_path: "s3://b/jobs-output".to_owned(),
                },
            }),
            calls: Cell::new(0),
        };

        let scratch = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(
            store,
            labelling,
            StubTraining::default(),
            test_config(scratch.path().to_path_buf()),
        );

        let outcome = dispatcher
            .handle_event(&event(vec![JOB_ARN], "Completed"))
            .unwrap();

        match outcome {
            DispatchOutcome::Submitted {
                project_arn,
                project_version_arn,
            } => {
                assert!(project_arn.starts_with("arn:project/bb-"));
                assert!(project_version_arn.starts_with("arn:version/v"));
            }
            other => panic!("expected a training submission, got {:?}", other),
        }

        // Augmented manifest uploaded next to the job output manifest.
        let uploaded = dispatcher
            .store
            .get(
                "b",
                "jobs-output/brand-compliance-1/manifests/output/augmented/output.manifest",
            )
            .expect("augmented manifest not uploaded");
        let records =
            crate::manifest::parse_records(std::str::from_utf8(&uploaded).unwrap()).unwrap();
        assert_eq!(records.len(), 3);

        // The training submission references the uploaded manifest.
        let versions = dispatcher.training.versions.borrow();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].training_manifest_bucket, "b");
        assert_eq!(
            versions[0].training_manifest_key,
            "jobs-output/brand-compliance-1/manifests/output/augmented/output.manifest"
        );
        assert_eq!(versions[0].output_bucket, "assets");
        assert!(versions[0].auto_create_test_split);
    }

    #[test]
    fn job_name_is_the_arn_suffix() {
        assert_eq!(job_name_from_arn(JOB_ARN), "brand-compliance-1");
        assert_eq!(job_name_from_arn("plain-name"), "plain-name");
    }
}
