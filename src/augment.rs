pub mod drawing;
pub mod pipeline;
pub mod transforms;

use crate::manifest::{ImageSize, LabelAttribute, ManifestRecord};
use crate::storage::{ObjectStore, StorageUri};
use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use pipeline::PipelineBox;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_AUGMENTATIONS_PER_IMAGE: u32 = 50;

/// Generates stored augmented variants for every record of a manifest.
pub struct Augmenter<'a, S: ObjectStore> {
    store: &'a S,
    augmentations_per_image: u32,
    debug_dump_dir: Option<PathBuf>,
}

impl<'a, S: ObjectStore> Augmenter<'a, S> {
    pub fn new(store: &'a S, augmentations_per_image: u32) -> Augmenter<'a, S> {
        Augmenter {
            store,
            augmentations_per_image,
            debug_dump_dir: None,
        }
    }

    /// Additionally writes every variant with its boxes drawn into `dir`.
    pub fn with_debug_dump_dir(mut self, dir: PathBuf) -> Augmenter<'a, S> {
        self.debug_dump_dir = Some(dir);
        self
    }

    /// Returns the input records followed by all variant records in
    /// generation order. Any fetch, decode, encode or upload failure aborts
    /// the whole run.
    pub fn augment_records(&self, records: &[ManifestRecord]) -> Result<Vec<ManifestRecord>> {
        let mut out: Vec<ManifestRecord> = records.to_vec();
        for record in records {
            out.extend(self.augment_record(record)?);
        }
        Ok(out)
    }

    fn augment_record(&self, record: &ManifestRecord) -> Result<Vec<ManifestRecord>> {
        let source = StorageUri::parse(&record.source_ref)?;
        info!("augmenting {}", source);

        let bytes = self.store.get_object(&source.bucket, &source.key)?;
        let img = image::load_from_memory(&bytes)
            .with_context(|| format!("decoding image {}", source))?;

        let boxes: Vec<PipelineBox> = record
            .label
            .annotations
            .iter()
            .map(PipelineBox::from_annotation)
            .collect();

        let filename = source.filename();
        let stem = match filename.rfind('.') {
            Some(idx) => &filename[..idx],
            None => filename,
        };
        let dir = source.directory();

        let mut variants = Vec::with_capacity(self.augmentations_per_image as usize);
        for index in 0..self.augmentations_per_image {
            let (transformed, out_boxes) = pipeline::apply(&img, &boxes);
            let key = variant_key(dir, stem, index);
            self.store
                .put_object(&source.bucket, &key, encode_png(&transformed)?)?;
            debug!("stored variant s3://{}/{}", source.bucket, key);

            if let Some(dump_dir) = &self.debug_dump_dir {
                dump_debug_overlay(dump_dir, stem, index, &transformed, &out_boxes)?;
            }

            variants.push(variant_record(
                record,
                &source.bucket,
                &key,
                &transformed,
                &out_boxes,
            ));
        }
        Ok(variants)
    }
}

fn variant_key(dir: &str, stem: &str, index: u32) -> String {
    if dir.is_empty() {
        format!("augmented/{}_transformed_{}.png", stem, index)
    } else {
        format!("{}/augmented/{}_transformed_{}.png", dir, stem, index)
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut buf, image::ImageOutputFormat::PNG)
        .context("encoding augmented image as png")?;
    Ok(buf)
}

/// Builds the record for one stored variant. Annotations and image_size are
/// replaced together; everything else carries over from the source record.
fn variant_record(
    source: &ManifestRecord,
    bucket: &str,
    key: &str,
    img: &DynamicImage,
    boxes: &[PipelineBox],
) -> ManifestRecord {
    ManifestRecord {
        source_ref: format!("s3://{}/{}", bucket, key),
        label: LabelAttribute {
            annotations: boxes.iter().map(PipelineBox::to_annotation).collect(),
            image_size: vec![ImageSize {
                width: img.width(),
                height: img.height(),
                depth: 3,
            }],
            extra: source.label.extra.clone(),
        },
        extra: source.extra.clone(),
    }
}

fn dump_debug_overlay(
    dir: &Path,
    stem: &str,
    index: u32,
    img: &DynamicImage,
    boxes: &[PipelineBox],
) -> Result<()> {
    let mut overlay = img.clone();
    for bb in boxes {
        drawing::draw_box_to_img(&mut overlay, bb);
    }
    let path = dir.join(format!("{}_transformed_{}.png", stem, index));
    overlay
        .save(&path)
        .with_context(|| format!("writing debug overlay {}", path.display()))?;
    Ok(())
}
