use anyhow::{Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::constants::SUPPORTED_EXTENSIONS;
use crate::error::ErrorKind;
use crate::tagger::{is_tagged_name, OutputTarget, TagOutcome, Tagger};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub recursive: bool,
    pub output_dir: Option<PathBuf>,
    pub jobs: usize,
    pub silent_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub total: usize,
    pub tagged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub failures: Vec<FailedFile>,
}

impl BatchStats {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record(&mut self, path: &Path, outcome: &TagOutcome) {
        match outcome {
            TagOutcome::Success(_) => self.tagged += 1,
            TagOutcome::Skipped(_) => self.skipped += 1,
            TagOutcome::Failed(kind, detail) => {
                self.failed += 1;
                self.failures.push(FailedFile {
                    path: path.to_path_buf(),
                    kind: *kind,
                    detail: detail.clone(),
                });
            }
        }
    }
}

/// An image in a folder listing.
#[derive(Debug, Clone, Serialize)]
pub struct ImageEntry {
    pub filename: String,
    pub tagged: bool,
}

pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .map_or(false, |ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Collects supported images under `folder`, sorted by path. Hidden entries
/// and subfolders named `skip_dir_name` are skipped; subfolders are only
/// entered when `recursive` is set.
pub fn collect_images(folder: &Path, recursive: bool, skip_dir_name: Option<&str>) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        anyhow::bail!("Photos directory not found: {}", folder.display());
    }

    let mut walker = WalkBuilder::new(folder);
    walker
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false);
    if !recursive {
        walker.max_depth(Some(1));
    }
    if let Some(name) = skip_dir_name {
        let name = OsString::from(name);
        walker.filter_entry(move |entry| {
            let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
            !(entry.depth() > 0 && is_dir && entry.file_name() == name.as_os_str())
        });
    }

    let mut files: Vec<PathBuf> = walker
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().map_or(false, |ft| ft.is_file()))
        .map(|e| e.into_path())
        .filter(|path| has_supported_extension(path))
        .collect();

    files.sort();
    Ok(files)
}

/// Lists the images of one folder that are candidates for tagging, with
/// whether their default output already exists.
pub fn list_images(tagger: &Tagger, folder: &Path) -> Result<Vec<ImageEntry>> {
    let files = collect_images(folder, false, None)
        .with_context(|| format!("Listing images in {}", folder.display()))?;

    Ok(files
        .iter()
        .filter(|path| !is_tagged_name(path))
        .filter_map(|path| {
            let filename = path.file_name()?.to_str()?.to_string();
            let tagged = tagger
                .output_path(path, &OutputTarget::Auto)
                .map_or(false, |output| output.exists());
            Some(ImageEntry { filename, tagged })
        })
        .collect())
}

/// Tags every supported image in `folder`. Failures are recorded and the run
/// continues.
pub fn process_folder(tagger: &Tagger, folder: &Path, options: &BatchOptions) -> Result<BatchStats> {
    if !options.silent_mode {
        println!("🔍 Scanning photos directory: {}", folder.display());
    }

    let mut files = collect_images(folder, options.recursive, Some(tagger.output_dir_name()))?;
    if let Some(dir) = &options.output_dir {
        files.retain(|path| !path.starts_with(dir));
    }

    // Outputs mirror the input's subfolder so equal stems never collide
    let target_for = |path: &Path| match &options.output_dir {
        Some(dir) => {
            let relative = path
                .parent()
                .and_then(|parent| parent.strip_prefix(folder).ok())
                .unwrap_or_else(|| Path::new(""));
            OutputTarget::Directory(dir.join(relative))
        }
        None => OutputTarget::Auto,
    };

    if !options.silent_mode {
        println!("✅ Found {} image(s). Starting tagging...", files.len());
    }
    info!("Tagging {} file(s) in {}", files.len(), folder.display());

    let start_time = Instant::now();
    let tag_one = |path: &PathBuf| {
        let outcome = tagger.tag(path, &target_for(path));
        match &outcome {
            TagOutcome::Failed(..) => error!("{}: {}", path.display(), outcome),
            _ => info!("{}: {}", path.display(), outcome),
        }
        (path.clone(), outcome)
    };

    let outcomes: Vec<(PathBuf, TagOutcome)> = if options.jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()
            .context("Failed to build worker pool")?;
        pool.install(|| files.par_iter().map(tag_one).collect())
    } else {
        files.iter().map(tag_one).collect()
    };

    let mut stats = BatchStats {
        total: files.len(),
        ..Default::default()
    };
    for (path, outcome) in &outcomes {
        stats.record(path, outcome);
    }
    stats.elapsed = start_time.elapsed();

    if !options.silent_mode {
        print_summary(&stats);
    }

    Ok(stats)
}

fn print_summary(stats: &BatchStats) {
    let secs = stats.elapsed.as_secs_f64();
    let avg_ms = if stats.total > 0 {
        secs * 1000.0 / stats.total as f64
    } else {
        0.0
    };

    println!("\n📊 Tagging summary:");
    println!("   🔍 Files found: {}", stats.total);
    println!("   🏷️  Tagged: {}", stats.tagged);
    println!("   ⏭️  Skipped: {}", stats.skipped);
    println!("   ❌ Failed: {}", stats.failed);
    println!("   ⏱️  Elapsed: {:.2} s ({:.1} ms per file)", secs, avg_ms);

    for failure in &stats.failures {
        println!("      • {} [{}] {}", failure.path.display(), failure.kind, failure.detail);
    }
}
