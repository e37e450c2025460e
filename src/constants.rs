// Output geometry
pub const TARGET_ASPECT_W: u32 = 16;
pub const TARGET_ASPECT_H: u32 = 9;
pub const MAX_OUTPUT_WIDTH: u32 = 1920;

// Overlay text styling
pub const TEXT_MARGIN: u32 = 30;
pub const SHADOW_OFFSET: i32 = 2;
pub const MIN_FONT_SIZE: f32 = 16.0;
pub const FONT_SIZE_DIVISOR: u32 = 30;
pub const LINE_SPACING: f32 = 1.15;

// Naming convention: outputs are `<stem>_tagged.png`, and any input whose
// name contains the marker is treated as already processed.
pub const TAGGED_MARKER: &str = "tagged";
pub const TAGGED_SUFFIX: &str = "_tagged";
pub const OUTPUT_EXTENSION: &str = "png";
pub const DEFAULT_OUTPUT_DIR: &str = "tagged";

// Geocode cache keys round to 3 decimals (~110 m of latitude)
pub const CACHE_PRECISION: i32 = 3;
pub const CACHE_FILE_NAME: &str = "geocache_v1.bin";
pub const CACHE_FORMAT_VERSION: u32 = 1;

// Geocoding service
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const PLACE_SEPARATOR: &str = ", ";

// Image sizes
pub const THUMBNAIL_SIZE: u32 = 300;
pub const MAX_THUMBNAIL_SIZE: u32 = 2048;
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;

// Server
pub const DEFAULT_PORT: u16 = 5001;

// Extensions offered to the tagger when listing folders
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp", "bmp"];
