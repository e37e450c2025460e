use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Tag, Value};
use image::DynamicImage;
use tracing::debug;

use super::GpsAxis;

/// Reads one GPS axis (value + hemisphere reference).
///
/// An axis only counts as present when both tags exist. A value that is not
/// stored as rationals is kept with no components so the resolver can report
/// it as malformed instead of silently dropping the location.
pub fn get_gps_axis(exif: &Exif, coord_tag: Tag, ref_tag: Tag) -> Option<GpsAxis> {
    let coord_field = exif.get_field(coord_tag, In::PRIMARY)?;
    let ref_field = exif.get_field(ref_tag, In::PRIMARY)?;

    let components = match coord_field.value {
        Value::Rational(ref vec) => vec.clone(),
        _ => Vec::new(),
    };

    let reference = match ref_field.value {
        Value::Ascii(ref vec) => vec
            .first()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .map(|s| s.trim_matches(char::from(0)).trim().to_string())
            .unwrap_or_default(),
        _ => ref_field.display_value().to_string(),
    };

    Some(GpsAxis {
        components,
        reference,
    })
}

/// Capture time from `DateTimeOriginal`, falling back to `DateTime`.
pub fn get_datetime_from_exif(exif: &Exif) -> Option<NaiveDateTime> {
    let try_tags = [Tag::DateTimeOriginal, Tag::DateTime];

    for &tag in &try_tags {
        let Some(field) = exif.get_field(tag, In::PRIMARY) else {
            continue;
        };
        let Value::Ascii(ref vec) = field.value else {
            continue;
        };
        let Some(bytes) = vec.first() else {
            continue;
        };

        match parse_exif_datetime(bytes) {
            Some(datetime) => return Some(datetime),
            None => debug!(
                "Ignoring unparseable {} value {:?}",
                tag,
                String::from_utf8_lossy(bytes)
            ),
        }
    }

    None
}

/// Parses the EXIF `YYYY:MM:DD HH:MM:SS` layout.
pub fn parse_exif_datetime(bytes: &[u8]) -> Option<NaiveDateTime> {
    let dt = exif::DateTime::from_ascii(bytes).ok()?;
    NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(u32::from(dt.hour), u32::from(dt.minute), u32::from(dt.second))
}

pub fn get_orientation(exif: &Exif) -> u32 {
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Applies an EXIF orientation value to decoded pixels.
pub fn apply_exif_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn parses_standard_exif_timestamp() {
        let dt = parse_exif_datetime(b"2024:06:01 14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-06-01 14:30:00");
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(parse_exif_datetime(b"not a date").is_none());
        assert!(parse_exif_datetime(b"2024:13:45 99:00:00").is_none());
    }

    #[test]
    fn orientation_six_swaps_dimensions() {
        let img = DynamicImage::new_rgb8(40, 10);
        let rotated = apply_exif_orientation(img, 6);
        assert_eq!(rotated.dimensions(), (10, 40));
    }

    #[test]
    fn unknown_orientation_is_identity() {
        let img = DynamicImage::new_rgb8(40, 10);
        assert_eq!(apply_exif_orientation(img, 42).dimensions(), (40, 10));
    }
}
