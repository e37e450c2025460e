use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{BufWriter, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::coordinates;
use crate::error::{ErrorKind, TagError};
use crate::exif_parser::{extract_metadata, RawMetadata};
use crate::geocoding::{GeocodeCache, NominatimClient, RetryPolicy, ReverseGeocoder};
use crate::image_processing::{load_image, write_png};
use crate::overlay::{Compositor, OverlayText};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The input name carries the `tagged` marker.
    NameMarkedTagged,
    /// Something already exists at the output path.
    OutputExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NameMarkedTagged => f.write_str("already tagged (name contains \"tagged\")"),
            SkipReason::OutputExists => f.write_str("already tagged (output exists)"),
        }
    }
}

/// Result of tagging one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    Success(PathBuf),
    Skipped(SkipReason),
    Failed(ErrorKind, String),
}

impl TagOutcome {
    fn failed(err: TagError) -> Self {
        TagOutcome::Failed(err.kind(), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TagOutcome::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TagOutcome::Failed(..))
    }

    /// Short status used by the web API.
    pub fn status(&self) -> &'static str {
        match self {
            TagOutcome::Success(_) => "success",
            TagOutcome::Skipped(_) => "skipped",
            TagOutcome::Failed(..) => "error",
        }
    }

    pub fn output(&self) -> Option<&Path> {
        match self {
            TagOutcome::Success(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for TagOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagOutcome::Success(path) => write!(f, "tagged -> {}", path.display()),
            TagOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            TagOutcome::Failed(kind, detail) => write!(f, "{}: {}", kind, detail),
        }
    }
}

/// Where the tagged file goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// `<input dir>/<output_dir_name>/<stem>_tagged.png`
    #[default]
    Auto,
    /// `<dir>/<stem>_tagged.png`
    Directory(PathBuf),
    /// Exactly this path.
    File(PathBuf),
}

/// `true` when the file name marks an already tagged artifact.
pub fn is_tagged_name(path: &Path) -> bool {
    path.file_stem()
        .map_or(false, |stem| stem.to_string_lossy().contains(TAGGED_MARKER))
}

/// `<stem>_tagged.png`. Non UTF-8 stems are kept byte for byte.
pub fn tagged_file_name(input: &Path) -> Option<OsString> {
    let mut name = input.file_stem()?.to_os_string();
    name.push(format!("{}.{}", TAGGED_SUFFIX, OUTPUT_EXTENSION));
    Some(name)
}

enum Persisted {
    Created,
    AlreadyPresent,
}

/// Runs extraction, resolution, geocoding and composition for one file at a
/// time. The geocoder and its cache are shared by every call.
pub struct Tagger {
    geocoder: ReverseGeocoder,
    compositor: Compositor,
    output_dir_name: String,
    cache_file: Option<PathBuf>,
}

impl Tagger {
    pub fn new(settings: &Settings) -> Result<Self> {
        let cache = Arc::new(GeocodeCache::new(settings.unknown_ttl()));

        let cache_file = if settings.persist_cache {
            let path = crate::utils::get_app_data_dir().join(CACHE_FILE_NAME);
            match cache.load_from_file(&path) {
                Ok(count) if count > 0 => info!("Loaded {} cached place(s) from {}", count, path.display()),
                Ok(_) => {}
                Err(e) => warn!("Could not load geocode cache: {:#}", e),
            }
            Some(path)
        } else {
            None
        };

        let backend = NominatimClient::new(
            &settings.geocoder_url,
            &settings.user_agent,
            &settings.language,
            settings.request_timeout(),
        )?;
        let geocoder = ReverseGeocoder::new(Box::new(backend), cache)
            .with_min_interval(settings.min_request_interval())
            .with_retry(RetryPolicy {
                attempts: settings.geocode_attempts,
                delay: settings.retry_delay(),
            });

        let compositor = Compositor::new(settings.font_path().as_deref(), settings.max_width)
            .context("Failed to prepare the compositor")?;

        Ok(Tagger {
            geocoder,
            compositor,
            output_dir_name: settings.output_dir_name.clone(),
            cache_file,
        })
    }

    pub fn with_parts(geocoder: ReverseGeocoder, compositor: Compositor) -> Self {
        Tagger {
            geocoder,
            compositor,
            output_dir_name: DEFAULT_OUTPUT_DIR.to_string(),
            cache_file: None,
        }
    }

    /// Name of the per-folder output directory used by `OutputTarget::Auto`.
    pub fn output_dir_name(&self) -> &str {
        &self.output_dir_name
    }

    pub fn output_path(&self, input: &Path, target: &OutputTarget) -> Result<PathBuf, TagError> {
        if let OutputTarget::File(path) = target {
            return Ok(path.clone());
        }

        let name = tagged_file_name(input).ok_or_else(|| TagError::unreadable(input, "no file name"))?;
        let dir = match target {
            OutputTarget::Directory(dir) => dir.clone(),
            _ => input
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(&self.output_dir_name),
        };
        Ok(dir.join(name))
    }

    /// Reads metadata and builds the overlay text without touching pixels.
    pub fn describe(&self, input: &Path) -> Result<(RawMetadata, OverlayText), TagError> {
        let metadata = extract_metadata(input)?;
        let coordinate = coordinates::resolve(&metadata)?;
        let place = self.geocoder.lookup(coordinate);
        let text = OverlayText::compose(&place, metadata.captured_at);
        Ok((metadata, text))
    }

    /// Tags `input`, writing the result according to `target`.
    ///
    /// Skips (without any network or image work) when the name is already
    /// marked or the output exists. The output appears atomically or not at all.
    pub fn tag(&self, input: &Path, target: &OutputTarget) -> TagOutcome {
        if is_tagged_name(input) {
            debug!("Skipping {}: name marks a tagged file", input.display());
            return TagOutcome::Skipped(SkipReason::NameMarkedTagged);
        }

        let output = match self.output_path(input, target) {
            Ok(path) => path,
            Err(e) => return TagOutcome::failed(e),
        };
        if output.exists() {
            debug!("Skipping {}: {} exists", input.display(), output.display());
            return TagOutcome::Skipped(SkipReason::OutputExists);
        }

        match self.render(input, &output) {
            Ok(Persisted::Created) => {
                info!("Tagged {} -> {}", input.display(), output.display());
                TagOutcome::Success(output)
            }
            Ok(Persisted::AlreadyPresent) => {
                debug!("{} appeared while tagging {}", output.display(), input.display());
                TagOutcome::Skipped(SkipReason::OutputExists)
            }
            Err(e) => {
                warn!("Failed to tag {}: {}", input.display(), e);
                TagOutcome::failed(e)
            }
        }
    }

    fn render(&self, input: &Path, output: &Path) -> Result<Persisted, TagError> {
        let (metadata, text) = self.describe(input)?;
        let img = load_image(input, metadata.orientation)?;
        let canvas = self.compositor.compose(&img, &text);
        drop(img);
        write_atomically(&canvas, output)
    }

    /// Saves known places when cache persistence is enabled.
    pub fn save_cache(&self) -> Result<()> {
        if let Some(path) = &self.cache_file {
            let count = self.geocoder.cache().save_to_file(path)?;
            info!("Saved {} cached place(s) to {}", count, path.display());
        }
        Ok(())
    }
}

fn write_atomically(canvas: &image::RgbImage, output: &Path) -> Result<Persisted, TagError> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| {
        TagError::CompositionFailed(format!("cannot create {}: {}", dir.display(), e))
    })?;

    let io_failure = |e: std::io::Error| {
        TagError::CompositionFailed(format!("cannot write {}: {}", output.display(), e))
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".phototag-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_failure)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write_png(canvas, &mut writer)?;
        writer.flush().map_err(io_failure)?;
    }

    match temp.persist_noclobber(output) {
        Ok(_) => Ok(Persisted::Created),
        Err(e) if e.error.kind() == IoErrorKind::AlreadyExists => Ok(Persisted::AlreadyPresent),
        Err(e) => Err(io_failure(e.error)),
    }
}
