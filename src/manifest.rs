use crate::storage::{ObjectStore, StorageUri};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// One bounding box annotation, in absolute pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub class_id: u32,
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

/// Pixel dimensions of a labelled image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// The label attribute of a record. The labelling service stores
/// `image_size` as a single-element array; unknown sibling fields are kept
/// so they survive a parse/serialize round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAttribute {
    pub annotations: Vec<Annotation>,
    pub image_size: Vec<ImageSize>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One labelled sample, one line of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    #[serde(rename = "source-ref")]
    pub source_ref: String,
    #[serde(rename = "your-label-attribute")]
    pub label: LabelAttribute,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A parsed manifest and the storage location it was read from.
pub struct Manifest {
    pub records: Vec<ManifestRecord>,
    pub uri: StorageUri,
}

/// Fetches a newline-delimited JSON manifest and parses every line.
pub fn read_manifest<S: ObjectStore>(store: &S, uri: &StorageUri) -> Result<Manifest> {
    let bytes = store.get_object(&uri.bucket, &uri.key)?;
    let text =
        String::from_utf8(bytes).with_context(|| format!("manifest {} is not valid utf-8", uri))?;
    let records = parse_records(&text).with_context(|| format!("parsing manifest {}", uri))?;
    debug!("read {} manifest records from {}", records.len(), uri);
    Ok(Manifest {
        records,
        uri: uri.clone(),
    })
}

/// Decodes one JSON record per line. A malformed line fails the whole parse,
/// a blank line (such as a trailing newline) does not.
pub fn parse_records(text: &str) -> Result<Vec<ManifestRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: ManifestRecord = serde_json::from_str(line)
            .with_context(|| format!("malformed manifest line {}", line_no + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Serializes records back to newline-delimited JSON, one object per line.
pub fn to_ndjson(records: &[ManifestRecord]) -> Result<String> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(serde_json::to_string(record).context("serializing manifest record")?);
    }
    Ok(lines.join("\n"))
}

/// Writes the extended manifest to the scratch dir for inspection and uploads
/// the same bytes next to the source manifest, under
/// `<manifest-directory>/augmented/output.manifest`. Returns the upload
/// location.
pub fn write_augmented_manifest<S: ObjectStore>(
    store: &S,
    scratch_dir: &Path,
    manifest_uri: &StorageUri,
    records: &[ManifestRecord],
) -> Result<StorageUri> {
    let body = to_ndjson(records)?;

    let scratch_path = scratch_dir.join("augmented.manifest");
    std::fs::write(&scratch_path, &body)
        .with_context(|| format!("writing scratch manifest {}", scratch_path.display()))?;

    let new_key = augmented_manifest_key(manifest_uri);
    store.put_object(&manifest_uri.bucket, &new_key, body.into_bytes())?;
    debug!(
        "wrote augmented manifest with {} records to s3://{}/{}",
        records.len(),
        manifest_uri.bucket,
        new_key
    );
    Ok(StorageUri {
        bucket: manifest_uri.bucket.clone(),
        key: new_key,
    })
}

fn augmented_manifest_key(manifest_uri: &StorageUri) -> String {
    let dir = manifest_uri.directory();
    if dir.is_empty() {
        "augmented/output.manifest".to_owned()
    } else {
        format!("{}/augmented/output.manifest", dir)
    }
}
