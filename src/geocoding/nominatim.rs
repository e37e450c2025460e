use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{Address, PlaceLookup};
use crate::coordinates::Coordinate;
use crate::error::GeocodeError;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    error: Option<String>,
}

/// Reverse geocoding against a Nominatim-compatible `/reverse` endpoint.
pub struct NominatimClient {
    client: Client,
    endpoint: String,
    language: String,
}

impl NominatimClient {
    pub fn new(endpoint: &str, user_agent: &str, language: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(NominatimClient {
            client,
            endpoint: endpoint.to_string(),
            language: language.to_string(),
        })
    }
}

impl PlaceLookup for NominatimClient {
    fn reverse(&self, coord: Coordinate) -> Result<Option<Address>, GeocodeError> {
        let lat = format!("{:.6}", coord.latitude);
        let lon = format!("{:.6}", coord.longitude);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("accept-language", self.language.as_str()),
            ])
            .send()?
            .error_for_status()?;

        let body: ReverseResponse = response.json()?;
        if let Some(message) = body.error {
            debug!("Geocoder has no address for {}: {}", coord, message);
            return Ok(None);
        }
        Ok(body.address)
    }
}
