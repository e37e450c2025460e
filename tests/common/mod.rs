#![allow(dead_code)]

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use phototag::constants::MAX_OUTPUT_WIDTH;
use phototag::coordinates::Coordinate;
use phototag::geocoding::{Address, GeocodeCache, PlaceLookup, ReverseGeocoder};
use phototag::overlay::Compositor;
use phototag::{GeocodeError, Tagger};

#[derive(Clone, Copy)]
pub enum Answer {
    SanFrancisco,
    Offline,
}

/// Lookup backend that never touches the network.
pub struct FakeLookup {
    answer: Answer,
    calls: Arc<AtomicUsize>,
}

impl PlaceLookup for FakeLookup {
    fn reverse(&self, _coord: Coordinate) -> Result<Option<Address>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Answer::SanFrancisco => Ok(Some(Address {
                city: Some("San Francisco".into()),
                state: Some("California".into()),
                country: Some("United States".into()),
                ..Default::default()
            })),
            Answer::Offline => Err(GeocodeError::Network("connection refused".into())),
        }
    }
}

pub fn tagger(answer: Answer) -> (Tagger, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = FakeLookup {
        answer,
        calls: calls.clone(),
    };
    let cache = Arc::new(GeocodeCache::new(Duration::from_secs(600)));
    let geocoder = ReverseGeocoder::new(Box::new(lookup), cache);
    let compositor = Compositor::new(None, MAX_OUTPUT_WIDTH).expect("bundled font");
    (Tagger::with_parts(geocoder, compositor), calls)
}

pub fn jpeg_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, 90)
        .encode_image(&img)
        .expect("encode jpeg");
    data
}

fn rationals(values: &[(u32, u32)]) -> Value {
    Value::Rational(
        values
            .iter()
            .map(|&(num, denom)| Rational { num, denom })
            .collect(),
    )
}

fn ascii(text: &str) -> Value {
    Value::Ascii(vec![text.as_bytes().to_vec()])
}

fn field(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

/// 37°46'29.64"N 122°25'9.84"W, i.e. (37.7749, -122.4194)
pub fn san_francisco_gps() -> Vec<Field> {
    vec![
        field(Tag::GPSLatitudeRef, ascii("N")),
        field(Tag::GPSLatitude, rationals(&[(37, 1), (46, 1), (2964, 100)])),
        field(Tag::GPSLongitudeRef, ascii("W")),
        field(Tag::GPSLongitude, rationals(&[(122, 1), (25, 1), (984, 100)])),
    ]
}

pub fn captured_at(timestamp: &str) -> Field {
    field(Tag::DateTimeOriginal, ascii(timestamp))
}

pub fn orientation(value: u16) -> Field {
    field(Tag::Orientation, Value::Short(vec![value]))
}

pub fn broken_latitude() -> Vec<Field> {
    vec![
        field(Tag::GPSLatitudeRef, ascii("N")),
        field(Tag::GPSLatitude, rationals(&[(37, 0), (46, 1), (0, 1)])),
        field(Tag::GPSLongitudeRef, ascii("W")),
        field(Tag::GPSLongitude, rationals(&[(122, 1), (25, 1), (0, 1)])),
    ]
}

/// Serializes fields into a big-endian TIFF structure.
pub fn exif_blob(fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for f in fields {
        writer.push_field(f);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false).expect("write exif");
    buf.into_inner()
}

/// Inserts an APP1 Exif segment right after the JPEG SOI marker.
pub fn with_exif(jpeg: &[u8], fields: &[Field]) -> Vec<u8> {
    let tiff = exif_blob(fields);
    let segment_len = u16::try_from(2 + 6 + tiff.len()).expect("exif fits in one segment");

    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

pub fn write_photo(path: &Path, width: u32, height: u32, fields: &[Field]) {
    let jpeg = jpeg_bytes(width, height, [90, 120, 160]);
    let data = if fields.is_empty() {
        jpeg
    } else {
        with_exif(&jpeg, fields)
    };
    std::fs::write(path, data).expect("write photo");
}

/// A photo taken in San Francisco on 2024-06-01 at 14:30.
pub fn write_sf_photo(path: &Path) {
    let mut fields = san_francisco_gps();
    fields.push(captured_at("2024:06:01 14:30:00"));
    write_photo(path, 640, 480, &fields);
}

pub fn count_bright(img: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
    (y0..y1)
        .flat_map(|y| (x0..x1).map(move |x| (x, y)))
        .filter(|&(x, y)| img.get_pixel(x, y).0.iter().all(|&c| c > 200))
        .count()
}
