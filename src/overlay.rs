use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::*;
use crate::geocoding::PlaceLabel;
use crate::image_processing::letterbox;

// Always available, used when no preferred font can be loaded
const DEFAULT_FONT_DATA: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

// Ordered preference list. Entries that do not exist on this platform are skipped.
const FONT_PREFERENCES: &[&str] = &[
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// The text stamped onto an image: a location line and/or a time line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayText {
    lines: Vec<String>,
}

impl OverlayText {
    pub fn compose(place: &PlaceLabel, captured_at: Option<NaiveDateTime>) -> Self {
        let mut lines = Vec::with_capacity(2);
        if let Some(name) = place.as_known() {
            lines.push(name.to_string());
        }
        if let Some(datetime) = captured_at {
            lines.push(format_timestamp(&datetime));
        }
        OverlayText { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for OverlayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

/// `Jun 1, 2024, 2:30 PM`
pub fn format_timestamp(datetime: &NaiveDateTime) -> String {
    datetime.format("%b %-d, %Y, %-I:%M %p").to_string()
}

pub fn font_size_for_width(width: u32) -> f32 {
    ((width / FONT_SIZE_DIVISOR) as f32).max(MIN_FONT_SIZE)
}

/// Returns the first loadable font from the preferred path and the platform
/// list, or the bundled default.
pub fn load_font(preferred: Option<&Path>) -> Result<FontArc> {
    let candidates = preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FONT_PREFERENCES.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(data) = std::fs::read(&path) else {
            continue;
        };
        match FontArc::try_from_vec(data) {
            Ok(font) => {
                debug!("Using font {}", path.display());
                return Ok(font);
            }
            Err(e) => debug!("Skipping font {}: {}", path.display(), e),
        }
    }

    debug!("Using bundled default font");
    FontArc::try_from_slice(DEFAULT_FONT_DATA).context("Bundled font is invalid")
}

/// Where one overlay line lands on the canvas. `height` is the line pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineBox {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

/// Letterboxes images and draws the overlay text in the bottom-right corner.
pub struct Compositor {
    font: FontArc,
    max_width: u32,
}

impl Compositor {
    pub fn new(preferred_font: Option<&Path>, max_width: u32) -> Result<Self> {
        Ok(Compositor {
            font: load_font(preferred_font)?,
            max_width,
        })
    }

    pub fn compose(&self, img: &DynamicImage, text: &OverlayText) -> RgbImage {
        let mut canvas = letterbox(img, self.max_width);
        if !text.is_empty() {
            self.draw_text(&mut canvas, text);
        }
        canvas
    }

    /// Right-aligns each line against the margin, stacking the block upwards
    /// from the bottom edge.
    fn layout(&self, width: u32, height: u32, text: &OverlayText) -> (PxScale, Vec<LineBox>) {
        let scale = PxScale::from(font_size_for_width(width));
        let scaled_font = self.font.as_scaled(scale);
        let line_height = (scaled_font.height() * LINE_SPACING).ceil() as i32;

        let line_count = text.lines().len() as i32;
        let block_height = line_height * (line_count - 1) + scaled_font.height().ceil() as i32;
        let top = height as i32 - TEXT_MARGIN as i32 - block_height;

        let boxes = text
            .lines()
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let (line_width, _) = text_size(scale, &self.font, line);
                LineBox {
                    x: width as i32 - TEXT_MARGIN as i32 - line_width as i32,
                    y: top + i as i32 * line_height,
                    width: line_width,
                    height: line_height as u32,
                }
            })
            .collect();
        (scale, boxes)
    }

    fn draw_text(&self, canvas: &mut RgbImage, text: &OverlayText) {
        let (width, height) = canvas.dimensions();
        let (scale, boxes) = self.layout(width, height, text);

        for (line, b) in text.lines().iter().zip(boxes) {
            draw_text_mut(
                canvas,
                Rgb([0, 0, 0]),
                b.x + SHADOW_OFFSET,
                b.y + SHADOW_OFFSET,
                scale,
                &self.font,
                line,
            );
            draw_text_mut(canvas, Rgb([255, 255, 255]), b.x, b.y, scale, &self.font, line);
        }
    }
}
