pub mod generic;

use chrono::NaiveDateTime;
use exif::{Rational, Tag};
use image::ImageFormat;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::TagError;

pub use generic::{apply_exif_orientation, get_datetime_from_exif, get_gps_axis, get_orientation};

/// One GPS axis as stored in EXIF: degree/minute/second rationals plus the
/// hemisphere letter.
#[derive(Debug, Clone)]
pub struct GpsAxis {
    pub components: Vec<Rational>,
    pub reference: String,
}

impl GpsAxis {
    pub fn new(degrees: (u32, u32), minutes: (u32, u32), seconds: (u32, u32), reference: &str) -> Self {
        let r = |(num, denom)| Rational { num, denom };
        GpsAxis {
            components: vec![r(degrees), r(minutes), r(seconds)],
            reference: reference.to_string(),
        }
    }
}

/// Everything the pipeline needs from a file's embedded tags.
#[derive(Debug, Clone)]
pub struct RawMetadata {
    pub latitude: Option<GpsAxis>,
    pub longitude: Option<GpsAxis>,
    pub captured_at: Option<NaiveDateTime>,
    pub orientation: u32,
}

impl Default for RawMetadata {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            captured_at: None,
            orientation: 1,
        }
    }
}

impl RawMetadata {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.captured_at.is_none()
    }
}

/// Formats the decoder can turn into pixels.
pub fn is_decodable(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Tiff | ImageFormat::WebP | ImageFormat::Bmp
    )
}

/// Sniffs the container format from the file's leading bytes.
pub fn detect_format(path: &Path) -> Result<ImageFormat, TagError> {
    let mut file = File::open(path).map_err(|e| TagError::unreadable(path, e))?;
    let mut header = Vec::with_capacity(64);
    (&mut file)
        .take(64)
        .read_to_end(&mut header)
        .map_err(|e| TagError::unreadable(path, e))?;

    let format = image::guess_format(&header)
        .map_err(|_| TagError::unreadable(path, "not a recognised image format"))?;

    if !is_decodable(format) {
        return Err(TagError::unreadable(
            path,
            format!("unsupported image format {:?}", format),
        ));
    }
    Ok(format)
}

/// Reads GPS, capture time and orientation from an image.
///
/// Missing or partially broken metadata yields empty fields. Only files that
/// cannot be opened or are not a supported image container fail.
pub fn extract_metadata(path: &Path) -> Result<RawMetadata, TagError> {
    detect_format(path)?;

    let file = File::open(path).map_err(|e| TagError::unreadable(path, e))?;
    let mut buf_reader = BufReader::new(file);

    let mut exif_reader = exif::Reader::new();
    exif_reader.continue_on_error(true); // Tolerate non-standard EXIF structures

    let exif = match exif_reader.read_from_container(&mut buf_reader) {
        Ok(exif) => exif,
        Err(exif::Error::PartialResult(partial)) => {
            let (exif, errors) = partial.into_inner();
            debug!("Partial EXIF in {}: {} error(s) ignored", path.display(), errors.len());
            exif
        }
        Err(exif::Error::NotFound(_)) => {
            debug!("No EXIF block in {}", path.display());
            return Ok(RawMetadata::default());
        }
        Err(e) => {
            warn!("Unreadable EXIF in {}: {}", path.display(), e);
            return Ok(RawMetadata::default());
        }
    };

    Ok(RawMetadata {
        latitude: get_gps_axis(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        longitude: get_gps_axis(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        captured_at: get_datetime_from_exif(&exif),
        orientation: get_orientation(&exif),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_axis_keeps_component_order() {
        let axis = GpsAxis::new((37, 1), (46, 1), (2964, 100), "N");
        let parts: Vec<(u32, u32)> = axis.components.iter().map(|r| (r.num, r.denom)).collect();
        assert_eq!(parts, vec![(37, 1), (46, 1), (2964, 100)]);
        assert_eq!(axis.reference, "N");

        let metadata = RawMetadata {
            latitude: Some(axis.clone()),
            ..Default::default()
        };
        assert!(!metadata.is_empty());
        assert_eq!(metadata.orientation, 1);
    }
}
