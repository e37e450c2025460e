use std::fmt;

use crate::error::TagError;
use crate::exif_parser::{GpsAxis, RawMetadata};

/// Signed decimal degrees; south and west are negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    /// Returns whether the hemisphere letter negates the magnitude.
    fn is_negative(self, reference: char) -> Option<bool> {
        match (self, reference) {
            (Axis::Latitude, 'N') | (Axis::Longitude, 'E') => Some(false),
            (Axis::Latitude, 'S') | (Axis::Longitude, 'W') => Some(true),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => f.write_str("latitude"),
            Axis::Longitude => f.write_str("longitude"),
        }
    }
}

/// Converts the raw GPS tags into a coordinate.
///
/// Returns `Ok(None)` unless both axes are present. No rounding happens here.
pub fn resolve(metadata: &RawMetadata) -> Result<Option<Coordinate>, TagError> {
    let (Some(lat), Some(lon)) = (&metadata.latitude, &metadata.longitude) else {
        return Ok(None);
    };

    Ok(Some(Coordinate {
        latitude: to_decimal(lat, Axis::Latitude)?,
        longitude: to_decimal(lon, Axis::Longitude)?,
    }))
}

fn to_decimal(axis_value: &GpsAxis, axis: Axis) -> Result<f64, TagError> {
    let invalid = |msg: String| TagError::InvalidCoordinateData(format!("{axis}: {msg}"));

    if axis_value.components.len() != 3 {
        return Err(invalid(format!(
            "expected 3 rational components, found {}",
            axis_value.components.len()
        )));
    }

    let mut parts = [0.0f64; 3];
    for (slot, r) in parts.iter_mut().zip(&axis_value.components) {
        if r.denom == 0 {
            return Err(invalid(format!("zero denominator in {}/{}", r.num, r.denom)));
        }
        *slot = r.to_f64();
    }
    let [d, m, s] = parts;
    let magnitude = d + m / 60.0 + s / 3600.0;

    if !magnitude.is_finite() || magnitude > axis.limit() {
        return Err(invalid(format!("{magnitude} is out of range")));
    }

    let reference = axis_value
        .reference
        .trim()
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| invalid("missing hemisphere reference".to_string()))?;

    match axis.is_negative(reference) {
        Some(true) => Ok(-magnitude),
        Some(false) => Ok(magnitude),
        None => Err(invalid(format!("unknown hemisphere reference {reference:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(lat: GpsAxis, lon: GpsAxis) -> RawMetadata {
        RawMetadata {
            latitude: Some(lat),
            longitude: Some(lon),
            ..Default::default()
        }
    }

    #[test]
    fn san_francisco_resolves_to_negative_longitude() {
        // 37° 46' 29.64" N, 122° 25' 9.84" W
        let coord = resolve(&metadata(
            GpsAxis::new((37, 1), (46, 1), (2964, 100), "N"),
            GpsAxis::new((122, 1), (25, 1), (984, 100), "W"),
        ))
        .unwrap()
        .unwrap();

        assert!((coord.latitude - 37.7749).abs() < 1e-4);
        assert!((coord.longitude + 122.4194).abs() < 1e-4);
    }

    #[test]
    fn hemisphere_sign_matches_reference() {
        let cases = [("N", "E", 1.0, 1.0), ("S", "W", -1.0, -1.0), ("S", "E", -1.0, 1.0)];
        for (lat_ref, lon_ref, lat_sign, lon_sign) in cases {
            let coord = resolve(&metadata(
                GpsAxis::new((10, 1), (30, 1), (0, 1), lat_ref),
                GpsAxis::new((20, 1), (15, 1), (36, 1), lon_ref),
            ))
            .unwrap()
            .unwrap();
            assert_eq!(coord.latitude.signum(), lat_sign);
            assert_eq!(coord.longitude.signum(), lon_sign);
        }
    }

    #[test]
    fn zero_magnitude_in_southern_hemisphere_is_not_positive() {
        let coord = resolve(&metadata(
            GpsAxis::new((0, 1), (0, 1), (0, 1), "S"),
            GpsAxis::new((0, 1), (0, 1), (0, 1), "W"),
        ))
        .unwrap()
        .unwrap();
        assert!(coord.latitude <= 0.0);
        assert!(coord.longitude <= 0.0);
    }

    #[test]
    fn single_axis_is_not_a_coordinate() {
        let raw = RawMetadata {
            latitude: Some(GpsAxis::new((10, 1), (0, 1), (0, 1), "N")),
            ..Default::default()
        };
        assert_eq!(resolve(&raw).unwrap(), None);
        assert_eq!(resolve(&RawMetadata::default()).unwrap(), None);
    }

    #[test]
    fn zero_denominator_is_invalid() {
        let err = resolve(&metadata(
            GpsAxis::new((10, 0), (0, 1), (0, 1), "N"),
            GpsAxis::new((10, 1), (0, 1), (0, 1), "E"),
        ))
        .unwrap_err();
        assert!(matches!(err, TagError::InvalidCoordinateData(_)));
    }

    #[test]
    fn wrong_component_count_is_invalid() {
        let mut lat = GpsAxis::new((10, 1), (0, 1), (0, 1), "N");
        lat.components.truncate(2);
        let err = resolve(&metadata(lat, GpsAxis::new((10, 1), (0, 1), (0, 1), "E"))).unwrap_err();
        assert!(matches!(err, TagError::InvalidCoordinateData(_)));
    }

    #[test]
    fn latitude_reference_on_longitude_is_invalid() {
        let err = resolve(&metadata(
            GpsAxis::new((10, 1), (0, 1), (0, 1), "N"),
            GpsAxis::new((10, 1), (0, 1), (0, 1), "N"),
        ))
        .unwrap_err();
        assert!(matches!(err, TagError::InvalidCoordinateData(_)));
    }

    #[test]
    fn out_of_range_latitude_is_invalid() {
        let err = resolve(&metadata(
            GpsAxis::new((91, 1), (0, 1), (0, 1), "N"),
            GpsAxis::new((10, 1), (0, 1), (0, 1), "E"),
        ))
        .unwrap_err();
        assert!(matches!(err, TagError::InvalidCoordinateData(_)));
    }
}
