use super::pipeline::{clip_boxes, PipelineBox};
use image::{DynamicImage, GenericImageView, RgbImage};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

// Reasonable values are -30 and +30, max is 255, min is 0
pub fn random_change_brightness(img: &DynamicImage, min: i32, max: i32) -> DynamicImage {
    let value = thread_rng().gen_range(min, max);
    img.brighten(value)
}

// Reasonable values are -10 and +10
pub fn random_change_contrast(img: &DynamicImage, min: f32, max: f32) -> DynamicImage {
    let value = thread_rng().gen_range(min, max);
    img.adjust_contrast(value)
}

// Reasonable values are -30 and +30
pub fn random_hue_rotation(img: &DynamicImage, min: i32, max: i32) -> DynamicImage {
    let value = thread_rng().gen_range(min, max);
    img.huerotate(value)
}

/// Rotates by a random number of clockwise quarter turns, remapping boxes
/// with the frame.
pub fn random_quarter_rotate(
    img: &DynamicImage,
    boxes: Vec<PipelineBox>,
) -> (DynamicImage, Vec<PipelineBox>) {
    let turns: u32 = thread_rng().gen_range(0, 4);
    quarter_rotate(img, boxes, turns)
}

pub fn quarter_rotate(
    img: &DynamicImage,
    boxes: Vec<PipelineBox>,
    turns: u32,
) -> (DynamicImage, Vec<PipelineBox>) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    match turns % 4 {
        0 => (img.clone(), boxes),
        1 => (
            img.rotate90(),
            boxes
                .into_iter()
                .map(|b| PipelineBox {
                    x: h - b.y - b.height,
                    y: b.x,
                    width: b.height,
                    height: b.width,
                    label: b.label,
                })
                .collect(),
        ),
        2 => (
            img.rotate180(),
            boxes
                .into_iter()
                .map(|b| PipelineBox {
                    x: w - b.x - b.width,
                    y: h - b.y - b.height,
                    width: b.width,
                    height: b.height,
                    label: b.label,
                })
                .collect(),
        ),
        _ => (
            img.rotate270(),
            boxes
                .into_iter()
                .map(|b| PipelineBox {
                    x: b.y,
                    y: w - b.x - b.width,
                    width: b.height,
                    height: b.width,
                    label: b.label,
                })
                .collect(),
        ),
    }
}

/// Randomly permutes the RGB channel order. Boxes are unaffected.
pub fn random_channel_shuffle(img: &DynamicImage) -> DynamicImage {
    let mut order = [0usize, 1, 2];
    order.shuffle(&mut thread_rng());
    let rgb = img.to_rgb();
    let shuffled = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        image::Rgb([p.0[order[0]], p.0[order[1]], p.0[order[2]]])
    });
    DynamicImage::ImageRgb8(shuffled)
}

/// Brightness, contrast and hue jitter applied together.
pub fn random_color_jitter(img: &DynamicImage) -> DynamicImage {
    let bright = random_change_brightness(img, -30, 30);
    let contrast = random_change_contrast(&bright, -10., 10.);
    random_hue_rotation(&contrast, -30, 30)
}

/// Standard sepia tone mapping over the RGB channels.
pub fn to_sepia(img: &DynamicImage) -> DynamicImage {
    let rgb = img.to_rgb();
    let toned = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let (r, g, b) = (p.0[0] as f32, p.0[1] as f32, p.0[2] as f32);
        image::Rgb([
            tone(0.393 * r + 0.769 * g + 0.189 * b),
            tone(0.349 * r + 0.686 * g + 0.168 * b),
            tone(0.272 * r + 0.534 * g + 0.131 * b),
        ])
    });
    DynamicImage::ImageRgb8(toned)
}

fn tone(v: f32) -> u8 {
    v.min(255.) as u8
}

/// Rotates by a random bounded angle, keeping the whole content in frame.
pub fn random_safe_rotate(
    img: &DynamicImage,
    boxes: Vec<PipelineBox>,
) -> (DynamicImage, Vec<PipelineBox>) {
    let degrees: f32 = thread_rng().gen_range(-90., 90.);
    safe_rotate(img, boxes, degrees)
}

/// Rotation about the image center that scales the content down just enough
/// for none of it to leave the frame. Boxes are mapped through the same
/// transform, re-boxed axis-aligned and clipped.
pub fn safe_rotate(
    img: &DynamicImage,
    boxes: Vec<PipelineBox>,
    degrees: f32,
) -> (DynamicImage, Vec<PipelineBox>) {
    let rgb = img.to_rgb();
    let (w, h) = (rgb.width(), rgb.height());
    let (fw, fh) = (w as f32, h as f32);
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin(), theta.cos());
    let rotated_w = fw * cos.abs() + fh * sin.abs();
    let rotated_h = fw * sin.abs() + fh * cos.abs();
    let scale = (fw / rotated_w).min(fh / rotated_h);
    let (cx, cy) = (fw / 2., fh / 2.);

    // Inverse mapping: every output pixel samples the source pixel that lands
    // on it under rotate-then-scale about the center.
    let rotated = RgbImage::from_fn(w, h, |x, y| {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let sx = cx + (dx * cos + dy * sin) / scale;
        let sy = cy + (-dx * sin + dy * cos) / scale;
        if sx >= 0. && sx < fw && sy >= 0. && sy < fh {
            *rgb.get_pixel(sx as u32, sy as u32)
        } else {
            image::Rgb([0, 0, 0])
        }
    });

    let mapped = boxes
        .into_iter()
        .map(|b| {
            let corners = [
                (b.x, b.y),
                (b.x + b.width, b.y),
                (b.x, b.y + b.height),
                (b.x + b.width, b.y + b.height),
            ];
            let mut min_x = std::f32::MAX;
            let mut min_y = std::f32::MAX;
            let mut max_x = std::f32::MIN;
            let mut max_y = std::f32::MIN;
            for (px, py) in corners.iter() {
                let dx = px - cx;
                let dy = py - cy;
                let nx = cx + scale * (dx * cos - dy * sin);
                let ny = cy + scale * (dx * sin + dy * cos);
                min_x = min_x.min(nx);
                min_y = min_y.min(ny);
                max_x = max_x.max(nx);
                max_y = max_y.max(ny);
            }
            PipelineBox {
                x: min_x,
                y: min_y,
                width: max_x - min_x,
                height: max_y - min_y,
                label: b.label,
            }
        })
        .collect();
    (DynamicImage::ImageRgb8(rotated), clip_boxes(mapped, w, h))
}

/// Grayscale conversion, kept as a 3-channel image.
pub fn to_grayscale(img: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageRgb8(img.grayscale().to_rgb())
}

/// Joint brightness and contrast jitter.
pub fn random_brightness_contrast(img: &DynamicImage) -> DynamicImage {
    let bright = random_change_brightness(img, -40, 40);
    random_change_contrast(&bright, -15., 15.)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_img(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, 200])
        }))
    }

    fn bb(x: f32, y: f32, width: f32, height: f32) -> PipelineBox {
        PipelineBox {
            x,
            y,
            width,
            height,
            label: 1,
        }
    }

    #[test]
    fn one_quarter_turn_swaps_frame_and_remaps_the_box() {
        let img = test_img(640, 480);
        let (out, boxes) = quarter_rotate(&img, vec![bb(10., 20., 50., 30.)], 1);
        assert_eq!((out.width(), out.height()), (480, 640));
        assert_eq!(boxes[0], bb(480. - 20. - 30., 10., 30., 50.));
    }

    #[test]
    fn two_quarter_turns_mirror_both_axes() {
        let img = test_img(640, 480);
        let (out, boxes) = quarter_rotate(&img, vec![bb(10., 20., 50., 30.)], 2);
        assert_eq!((out.width(), out.height()), (640, 480));
        assert_eq!(boxes[0], bb(640. - 10. - 50., 480. - 20. - 30., 50., 30.));
    }

    #[test]
    fn four_quarter_turns_are_identity() {
        let img = test_img(64, 48);
        let input = vec![bb(3., 4., 10., 12.)];
        let (out, boxes) = quarter_rotate(&img, input.clone(), 4);
        assert_eq!((out.width(), out.height()), (64, 48));
        assert_eq!(boxes, input);
    }

    #[test]
    fn quarter_turn_box_stays_on_the_rotated_content() {
        // A box in the top-left corner must land in the top-right corner
        // after one clockwise turn.
        let img = test_img(100, 80);
        let (_, boxes) = quarter_rotate(&img, vec![bb(0., 0., 10., 10.)], 1);
        assert_eq!(boxes[0], bb(70., 0., 10., 10.));
    }

    #[test]
    fn channel_shuffle_keeps_dimensions_and_pixel_sets() {
        let img = test_img(32, 16);
        let out = random_channel_shuffle(&img);
        assert_eq!((out.width(), out.height()), (32, 16));
        // A permutation never invents channel values.
        let p_in = img.to_rgb();
        let p_out = out.to_rgb();
        let mut a = p_in.get_pixel(5, 7).0.to_vec();
        let mut b = p_out.get_pixel(5, 7).0.to_vec();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn sepia_and_grayscale_keep_dimensions() {
        let img = test_img(20, 10);
        assert_eq!(to_sepia(&img).dimensions(), (20, 10));
        assert_eq!(to_grayscale(&img).dimensions(), (20, 10));
    }

    #[test]
    fn grayscale_output_has_equal_channels() {
        let gray = to_grayscale(&test_img(16, 16)).to_rgb();
        for p in gray.pixels() {
            assert_eq!(p.0[0], p.0[1]);
            assert_eq!(p.0[1], p.0[2]);
        }
    }

    #[test]
    fn zero_degree_safe_rotate_is_identity_on_boxes() {
        let img = test_img(64, 48);
        let input = vec![bb(5., 6., 20., 10.)];
        let (out, boxes) = safe_rotate(&img, input.clone(), 0.);
        assert_eq!((out.width(), out.height()), (64, 48));
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].x - 5.).abs() < 1e-3);
        assert!((boxes[0].y - 6.).abs() < 1e-3);
        assert!((boxes[0].width - 20.).abs() < 1e-3);
        assert!((boxes[0].height - 10.).abs() < 1e-3);
    }

    #[test]
    fn safe_rotate_keeps_frame_size_and_boxes_in_frame() {
        let img = test_img(64, 48);
        let input = vec![bb(0., 0., 64., 48.)];
        for degrees in &[-90., -45., 10., 33., 90.] {
            let (out, boxes) = safe_rotate(&img, input.clone(), *degrees);
            assert_eq!((out.width(), out.height()), (64, 48));
            for b in &boxes {
                assert!(b.x >= 0. && b.y >= 0.);
                assert!(b.x + b.width <= 64.001);
                assert!(b.y + b.height <= 48.001);
            }
        }
    }
}
