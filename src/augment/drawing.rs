use super::pipeline::PipelineBox;
use image::DynamicImage;
use imageproc::drawing::Blend;

pub fn draw_box_to_img(img: &mut DynamicImage, bb: &PipelineBox) {
    draw_box_to_img_with_color(img, bb, [0, 212, 0, 90]);
}

pub fn draw_box_to_img_with_color(img: &mut DynamicImage, bb: &PipelineBox, rgba_color: [u8; 4]) {
    let mut img_blend = Blend(img.to_rgba());
    let rec = imageproc::rect::Rect::at(bb.x.round() as i32, bb.y.round() as i32).of_size(
        (bb.width.round() as u32).max(1),
        (bb.height.round() as u32).max(1),
    );

    let color = image::Rgba(rgba_color);

    imageproc::drawing::draw_hollow_rect_mut(&mut img_blend, rec, color);
    std::mem::swap(img, &mut DynamicImage::ImageRgba8(img_blend.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};

    #[test]
    fn drawing_keeps_dimensions() {
        let mut img = DynamicImage::ImageRgb8(RgbImage::new(32, 24));
        let bb = PipelineBox {
            x: 4.,
            y: 4.,
            width: 10.,
            height: 8.,
            label: 1,
        };
        draw_box_to_img(&mut img, &bb);
        assert_eq!(img.dimensions(), (32, 24));
    }
}
