//! Stamps photos with where and when they were taken.
//!
//! The pipeline reads EXIF metadata, resolves GPS tags to a coordinate,
//! reverse geocodes it to a short place name and draws the result onto a
//! 16:9 letterboxed PNG. [`tagger::Tagger`] drives one file at a time;
//! [`processing`] and [`server`] run it over folders and behind HTTP.

pub mod constants;
pub mod coordinates;
pub mod error;
pub mod exif_parser;
pub mod geocoding;
pub mod image_processing;
pub mod overlay;
pub mod processing;
pub mod server;
pub mod settings;
pub mod tagger;
pub mod utils;

pub use error::{ErrorKind, GeocodeError, TagError};
pub use tagger::{OutputTarget, SkipReason, TagOutcome, Tagger};
