use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::PlaceLabel;
use crate::constants::{CACHE_FORMAT_VERSION, CACHE_PRECISION};
use crate::coordinates::Coordinate;

/// A coordinate rounded to `CACHE_PRECISION` decimals, so a burst of photos
/// taken at the same spot shares one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    lat: i32,
    lon: i32,
}

impl CacheKey {
    pub fn from_coordinate(coord: &Coordinate) -> Self {
        let scale = 10f64.powi(CACHE_PRECISION);
        CacheKey {
            lat: (coord.latitude * scale).round() as i32,
            lon: (coord.longitude * scale).round() as i32,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    label: PlaceLabel,
    stored_at: Instant,
}

// Structure for disk persistence
#[derive(Serialize, Deserialize)]
struct CachedPlaces {
    version: u32,
    places: Vec<(CacheKey, String)>,
}

/// Run-scoped place label cache. Known labels live until the cache is
/// dropped; `Unknown` results expire after `unknown_ttl` so a later call in a
/// long-running session may retry. Concurrent inserts for one key are last
/// write wins.
pub struct GeocodeCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    unknown_ttl: Duration,
}

impl GeocodeCache {
    pub fn new(unknown_ttl: Duration) -> Self {
        GeocodeCache {
            entries: RwLock::new(HashMap::new()),
            unknown_ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<PlaceLabel> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if entry.label == PlaceLabel::Unknown && entry.stored_at.elapsed() >= self.unknown_ttl {
            return None;
        }
        Some(entry.label.clone())
    }

    pub fn insert(&self, key: CacheKey, label: PlaceLabel) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key,
            CacheEntry {
                label,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes known labels to disk using bincode.
    pub fn save_to_file(&self, path: &Path) -> Result<usize> {
        let places: Vec<(CacheKey, String)> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .filter_map(|(key, entry)| match &entry.label {
                    PlaceLabel::Known(name) => Some((*key, name.clone())),
                    PlaceLabel::Unknown => None,
                })
                .collect()
        };
        let count = places.len();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating cache directory {}", parent.display()))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Creating cache file {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);
        bincode::serialize_into(
            &mut writer,
            &CachedPlaces {
                version: CACHE_FORMAT_VERSION,
                places,
            },
        )
        .context("Serializing geocode cache")?;
        writer.flush().context("Flushing geocode cache")?;

        debug!("Saved {} place(s) to {}", count, path.display());
        Ok(count)
    }

    /// Loads labels saved by `save_to_file`. A missing file loads nothing; a
    /// corrupt or outdated one is deleted.
    pub fn load_from_file(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("Opening cache file {}", path.display()))?;
        let cached: CachedPlaces = match bincode::deserialize_from(std::io::BufReader::new(file)) {
            Ok(c) => c,
            Err(e) => {
                warn!("Geocode cache {} is corrupted ({}), deleting it", path.display(), e);
                let _ = std::fs::remove_file(path);
                return Ok(0);
            }
        };

        if cached.version != CACHE_FORMAT_VERSION {
            warn!(
                "Geocode cache version mismatch (found {}, expected {}), deleting it",
                cached.version, CACHE_FORMAT_VERSION
            );
            let _ = std::fs::remove_file(path);
            return Ok(0);
        }

        let count = cached.places.len();
        for (key, name) in cached.places {
            self.insert(key, PlaceLabel::Known(name));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate { latitude, longitude }
    }

    #[test]
    fn nearby_points_share_a_key() {
        let a = CacheKey::from_coordinate(&coord(37.77490, -122.41940));
        let b = CacheKey::from_coordinate(&coord(37.77470, -122.41930));
        assert_eq!(a, b);
    }

    #[test]
    fn distant_points_do_not_share_a_key() {
        let a = CacheKey::from_coordinate(&coord(37.7749, -122.4194));
        let b = CacheKey::from_coordinate(&coord(37.7849, -122.4194));
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_entries_expire_but_known_do_not() {
        let cache = GeocodeCache::new(Duration::ZERO);
        let known = CacheKey::from_coordinate(&coord(1.0, 1.0));
        let unknown = CacheKey::from_coordinate(&coord(2.0, 2.0));

        cache.insert(known, PlaceLabel::Known("Somewhere".into()));
        cache.insert(unknown, PlaceLabel::Unknown);

        assert_eq!(cache.get(&known), Some(PlaceLabel::Known("Somewhere".into())));
        assert_eq!(cache.get(&unknown), None);
    }

    #[test]
    fn unknown_entries_are_served_within_ttl() {
        let cache = GeocodeCache::new(Duration::from_secs(600));
        let key = CacheKey::from_coordinate(&coord(2.0, 2.0));
        cache.insert(key, PlaceLabel::Unknown);
        assert_eq!(cache.get(&key), Some(PlaceLabel::Unknown));
    }

    #[test]
    fn persistence_keeps_only_known_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.bin");

        let cache = GeocodeCache::new(Duration::from_secs(600));
        let known = CacheKey::from_coordinate(&coord(48.8566, 2.3522));
        cache.insert(known, PlaceLabel::Known("Paris, Île-de-France".into()));
        cache.insert(CacheKey::from_coordinate(&coord(0.0, 0.0)), PlaceLabel::Unknown);

        assert_eq!(cache.save_to_file(&path).unwrap(), 1);

        let restored = GeocodeCache::new(Duration::from_secs(600));
        assert_eq!(restored.load_from_file(&path).unwrap(), 1);
        assert_eq!(
            restored.get(&known),
            Some(PlaceLabel::Known("Paris, Île-de-France".into()))
        );
    }

    #[test]
    fn corrupt_cache_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.bin");
        std::fs::write(&path, b"definitely not bincode").unwrap();

        let cache = GeocodeCache::new(Duration::from_secs(600));
        assert_eq!(cache.load_from_file(&path).unwrap(), 0);
        assert!(!path.exists());
    }
}
