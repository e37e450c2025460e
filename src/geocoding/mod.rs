pub mod cache;
pub mod nominatim;

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::constants::PLACE_SEPARATOR;
use crate::coordinates::Coordinate;
use crate::error::GeocodeError;

pub use cache::{CacheKey, GeocodeCache};
pub use nominatim::NominatimClient;

/// A short place name, or the "unknown location" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceLabel {
    Known(String),
    Unknown,
}

impl PlaceLabel {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            PlaceLabel::Known(name) => Some(name),
            PlaceLabel::Unknown => None,
        }
    }
}

impl fmt::Display for PlaceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceLabel::Known(name) => f.write_str(name),
            PlaceLabel::Unknown => f.write_str("Unknown location"),
        }
    }
}

/// Structured address as returned by the lookup service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// City/town first, then region, then country; the first two available
    /// are joined.
    pub fn place_name(&self) -> Option<String> {
        let locality = self
            .city
            .as_ref()
            .or(self.town.as_ref())
            .or(self.village.as_ref())
            .or(self.municipality.as_ref());
        let region = self
            .state
            .as_ref()
            .or(self.region.as_ref())
            .or(self.province.as_ref());

        let parts: Vec<&str> = [locality, region, self.country.as_ref()]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .take(2)
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(PLACE_SEPARATOR))
        }
    }
}

/// A reverse geocoding backend. `Ok(None)` means the service answered but
/// knows no address for the point.
pub trait PlaceLookup: Send + Sync {
    fn reverse(&self, coord: Coordinate) -> Result<Option<Address>, GeocodeError>;
}

/// Enforces a minimum delay between outgoing requests across all callers.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        RateLimiter {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn wait(&self) {
        let mut last = self.last_request.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Coordinate to place name, with caching and graceful degradation.
/// Lookup failures become `PlaceLabel::Unknown` and never propagate.
pub struct ReverseGeocoder {
    backend: Box<dyn PlaceLookup>,
    cache: Arc<GeocodeCache>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ReverseGeocoder {
    pub fn new(backend: Box<dyn PlaceLookup>, cache: Arc<GeocodeCache>) -> Self {
        ReverseGeocoder {
            backend,
            cache,
            limiter: RateLimiter::new(Duration::ZERO),
            retry: RetryPolicy::default(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.limiter = RateLimiter::new(min_interval);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    pub fn lookup(&self, coord: Option<Coordinate>) -> PlaceLabel {
        let Some(coord) = coord else {
            return PlaceLabel::Unknown;
        };

        let key = CacheKey::from_coordinate(&coord);
        if let Some(label) = self.cache.get(&key) {
            debug!("Geocode cache hit for {}: {}", coord, label);
            return label;
        }

        // One lookup per key at a time; later callers reuse its result.
        let slot = self.in_flight_slot(key);
        let label = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            match self.cache.get(&key) {
                Some(label) => label,
                None => {
                    let label = self.fetch(coord);
                    self.cache.insert(key, label.clone());
                    label
                }
            }
        };
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);

        label
    }

    fn in_flight_slot(&self, key: CacheKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.entry(key).or_default().clone()
    }

    fn fetch(&self, coord: Coordinate) -> PlaceLabel {
        let attempts = self.retry.attempts.max(1);

        for attempt in 1..=attempts {
            self.limiter.wait();
            match self.backend.reverse(coord) {
                Ok(Some(address)) => {
                    return match address.place_name() {
                        Some(name) => {
                            info!("Resolved {} to {}", coord, name);
                            PlaceLabel::Known(name)
                        }
                        None => {
                            info!("No usable place name for {}", coord);
                            PlaceLabel::Unknown
                        }
                    };
                }
                Ok(None) => {
                    info!("No location found for {}", coord);
                    return PlaceLabel::Unknown;
                }
                Err(e) => {
                    warn!(
                        "Reverse geocoding {} failed (attempt {}/{}): {}",
                        coord, attempt, attempts, e
                    );
                    if attempt < attempts {
                        std::thread::sleep(self.retry.delay);
                    }
                }
            }
        }

        warn!("Geocoding unavailable for {}, continuing without a location", coord);
        PlaceLabel::Unknown
    }
}
