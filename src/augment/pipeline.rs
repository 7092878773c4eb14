use super::transforms;
use crate::manifest::Annotation;
use image::DynamicImage;
use rand::{thread_rng, Rng};

/// A bounding box as the pipeline sees it: absolute pixel coordinates plus
/// the class label.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label: u32,
}

impl PipelineBox {
    pub fn from_annotation(annotation: &Annotation) -> PipelineBox {
        PipelineBox {
            x: annotation.left as f32,
            y: annotation.top as f32,
            width: annotation.width as f32,
            height: annotation.height as f32,
            label: annotation.class_id,
        }
    }

    /// Rounds through the box edges rather than the extents, so a clipped
    /// box can never round past the frame boundary.
    pub fn to_annotation(&self) -> Annotation {
        let left = self.x.round() as i32;
        let top = self.y.round() as i32;
        let right = (self.x + self.width).round() as i32;
        let bottom = (self.y + self.height).round() as i32;
        Annotation {
            class_id: self.label,
            left,
            top,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        }
    }
}

/// Applies the randomized augmentation sequence to one image and its boxes.
/// Every call draws fresh random parameters. Boxes come back clipped to the
/// output frame; boxes left without visible area are dropped.
pub fn apply(img: &DynamicImage, boxes: &[PipelineBox]) -> (DynamicImage, Vec<PipelineBox>) {
    let (img, boxes) = transforms::random_quarter_rotate(img, boxes.to_vec());
    let img = transforms::random_channel_shuffle(&img);
    let img = transforms::random_color_jitter(&img);
    let img = transforms::to_sepia(&img);
    let (img, boxes) = transforms::random_safe_rotate(&img, boxes);
    let mut img = transforms::to_grayscale(&img);
    if thread_rng().gen_bool(0.5) {
        img = transforms::random_brightness_contrast(&img);
    }
    (img, boxes)
}

/// Clips boxes to a `width` x `height` frame, dropping any box left without
/// at least one visible pixel in each dimension.
pub fn clip_boxes(boxes: Vec<PipelineBox>, width: u32, height: u32) -> Vec<PipelineBox> {
    let (fw, fh) = (width as f32, height as f32);
    boxes
        .into_iter()
        .filter_map(|b| {
            let x0 = b.x.max(0.);
            let y0 = b.y.max(0.);
            let x1 = (b.x + b.width).min(fw);
            let y1 = (b.y + b.height).min(fh);
            if x1 - x0 >= 1. && y1 - y0 >= 1. {
                Some(PipelineBox {
                    x: x0,
                    y: y0,
                    width: x1 - x0,
                    height: y1 - y0,
                    label: b.label,
                })
            } else {
                None
            }
        })
        .collect()
}
