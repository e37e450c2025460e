use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use std::io::Write;
use std::path::Path;

use crate::constants::*;
use crate::error::TagError;
use crate::exif_parser::apply_exif_orientation;

/// Placement of the scaled source inside the 16:9 canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub content_width: u32,
    pub content_height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
}

impl CanvasLayout {
    pub fn has_side_bars(&self) -> bool {
        self.content_width < self.canvas_width
    }

    pub fn has_top_bottom_bars(&self) -> bool {
        self.content_height < self.canvas_height
    }
}

/// Computes a 16:9 canvas no wider than `max_width` (or the source) and the
/// largest centered fit of the source inside it. Nothing is cropped.
pub fn letterbox_layout(src_width: u32, src_height: u32, max_width: u32) -> CanvasLayout {
    let (w, h) = (u64::from(src_width.max(1)), u64::from(src_height.max(1)));
    let (rw, rh) = (u64::from(TARGET_ASPECT_W), u64::from(TARGET_ASPECT_H));

    let canvas_width = w.min(u64::from(max_width.max(1)));
    let canvas_height = (canvas_width * rh / rw).max(1);

    let (content_width, content_height) = if w * rh > h * rw {
        // Wider than 16:9: fit to width, bars top and bottom
        (canvas_width, (canvas_width * h / w).clamp(1, canvas_height))
    } else {
        // Taller than (or exactly) 16:9: fit to height, bars left and right
        ((canvas_height * w / h).clamp(1, canvas_width), canvas_height)
    };

    CanvasLayout {
        canvas_width: canvas_width as u32,
        canvas_height: canvas_height as u32,
        content_width: content_width as u32,
        content_height: content_height as u32,
        x_offset: ((canvas_width - content_width) / 2) as u32,
        y_offset: ((canvas_height - content_height) / 2) as u32,
    }
}

/// Scales the image onto a black 16:9 canvas.
pub fn letterbox(img: &DynamicImage, max_width: u32) -> RgbImage {
    let layout = letterbox_layout(img.width(), img.height(), max_width);

    let source = img.to_rgb8();
    let scaled = if (layout.content_width, layout.content_height) == source.dimensions() {
        source
    } else {
        image::imageops::resize(
            &source,
            layout.content_width,
            layout.content_height,
            FilterType::Lanczos3,
        )
    };

    let mut canvas = RgbImage::from_pixel(layout.canvas_width, layout.canvas_height, Rgb([0, 0, 0]));
    image::imageops::overlay(
        &mut canvas,
        &scaled,
        i64::from(layout.x_offset),
        i64::from(layout.y_offset),
    );
    canvas
}

/// Decodes pixel data and applies the EXIF orientation.
pub fn load_image(path: &Path, orientation: u32) -> Result<DynamicImage, TagError> {
    let img = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| TagError::CompositionFailed(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| TagError::CompositionFailed(format!("cannot decode {}: {}", path.display(), e)))?;

    Ok(apply_exif_orientation(img, orientation))
}

pub fn write_png<W: Write>(canvas: &RgbImage, writer: W) -> Result<(), TagError> {
    canvas
        .write_with_encoder(PngEncoder::new(writer))
        .map_err(|e| TagError::CompositionFailed(format!("PNG encoding failed: {}", e)))
}

/// Creates an aspect-preserving JPEG thumbnail for the browsing UI.
pub fn create_thumbnail(source_path: &Path, size: u32) -> Result<Vec<u8>> {
    let size = size.clamp(16, MAX_THUMBNAIL_SIZE);
    let orientation = std::fs::File::open(source_path)
        .ok()
        .and_then(|file| {
            let mut reader = std::io::BufReader::new(file);
            exif::Reader::new().read_from_container(&mut reader).ok()
        })
        .map(|exif| crate::exif_parser::get_orientation(&exif))
        .unwrap_or(1);

    let img = load_image(source_path, orientation)
        .with_context(|| format!("Failed to open image: {:?}", source_path))?;

    // Triangle filter is sufficient for thumbnails
    let scaled = img.resize(size, size, FilterType::Triangle).to_rgb8();

    let mut jpeg_data = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_data, THUMBNAIL_JPEG_QUALITY)
        .encode_image(&scaled)
        .with_context(|| "Failed to encode thumbnail")?;

    Ok(jpeg_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_sixteen_by_nine_has_no_bars() {
        let layout = letterbox_layout(1920, 1080, MAX_OUTPUT_WIDTH);
        assert_eq!((layout.canvas_width, layout.canvas_height), (1920, 1080));
        assert!(!layout.has_side_bars());
        assert!(!layout.has_top_bottom_bars());

        let large = letterbox_layout(3840, 2160, MAX_OUTPUT_WIDTH);
        assert_eq!((large.content_width, large.content_height), (1920, 1080));
    }

    #[test]
    fn four_by_three_gets_side_bars() {
        let layout = letterbox_layout(4000, 3000, MAX_OUTPUT_WIDTH);
        assert_eq!((layout.canvas_width, layout.canvas_height), (1920, 1080));
        assert_eq!((layout.content_width, layout.content_height), (1440, 1080));
        assert_eq!((layout.x_offset, layout.y_offset), (240, 0));
        assert!(layout.has_side_bars());
        assert!(!layout.has_top_bottom_bars());
    }

    #[test]
    fn panorama_gets_top_and_bottom_bars() {
        let layout = letterbox_layout(3000, 1000, MAX_OUTPUT_WIDTH);
        assert_eq!((layout.canvas_width, layout.canvas_height), (1920, 1080));
        assert_eq!((layout.content_width, layout.content_height), (1920, 640));
        assert_eq!((layout.x_offset, layout.y_offset), (0, 220));
        assert!(layout.has_top_bottom_bars());
    }

    #[test]
    fn small_sources_are_not_upscaled_past_their_width() {
        let layout = letterbox_layout(800, 600, MAX_OUTPUT_WIDTH);
        assert_eq!((layout.canvas_width, layout.canvas_height), (800, 450));
        assert_eq!((layout.content_width, layout.content_height), (600, 450));
    }

    #[test]
    fn degenerate_sources_still_produce_a_canvas() {
        let layout = letterbox_layout(1, 1, MAX_OUTPUT_WIDTH);
        assert_eq!((layout.canvas_width, layout.canvas_height), (1, 1));
    }

    #[test]
    fn bars_are_black() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, Rgb([200, 50, 50])));
        let canvas = letterbox(&img, MAX_OUTPUT_WIDTH);
        assert_eq!(canvas.dimensions(), (400, 225));
        assert_eq!(canvas.get_pixel(0, 100), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(399, 100), &Rgb([0, 0, 0]));
        let center = canvas.get_pixel(200, 112);
        assert!(center[0] > 190 && center[1] < 60 && center[2] < 60);
    }
}
