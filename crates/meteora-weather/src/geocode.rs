//! Forward geocoding (Open-Meteo search) and reverse geocoding
//! (Nominatim / OpenStreetMap, no API key required).

use meteora_offline::Fetch;
use serde::Deserialize;

use crate::client::WeatherClient;
use crate::error::GatewayError;
use crate::types::{CityMatch, Location};

/// Queries shorter than this (after trimming) never reach the network
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    admin1: Option<String>,
    timezone: Option<String>,
    population: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl<F: Fetch> WeatherClient<F> {
    /// Search for places by name, preserving server order.
    pub async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, GatewayError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let mut url = self.endpoints.geocoding.clone();
        url.query_pairs_mut()
            .append_pair("name", query)
            .append_pair("count", &self.search_limit.to_string())
            .append_pair("language", "en")
            .append_pair("format", "json");

        let body: SearchResponse = self.get_json(url).await.inspect_err(|e| {
            tracing::warn!("City search for {:?} failed: {}", query, e);
        })?;

        let matches = body
            .results
            .into_iter()
            .take(self.search_limit)
            .map(|r| CityMatch {
                id: format!("{},{}", r.latitude, r.longitude),
                location: Location {
                    name: r.name,
                    country: r.country,
                    admin1: r.admin1,
                    latitude: r.latitude,
                    longitude: r.longitude,
                },
                timezone: r.timezone,
                population: r.population.unwrap_or(0),
            })
            .collect::<Vec<_>>();

        tracing::debug!("City search for {:?} returned {} matches", query, matches.len());
        Ok(matches)
    }

    /// Best-match place for the coordinates.
    /// Returns `None` on any failure; the caller can fall back to coordinates.
    pub async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Option<Location> {
        let mut url = self.endpoints.reverse_geocoding.clone();
        url.query_pairs_mut()
            .append_pair("lat", &latitude.to_string())
            .append_pair("lon", &longitude.to_string())
            .append_pair("format", "json")
            .append_pair("addressdetails", "1")
            .append_pair("layer", "address")
            .append_pair("zoom", "10");

        let body: NominatimResponse = match self.get_json(url).await {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!("Reverse geocode failed: {}", e);
                return None;
            }
        };

        let addr = body.address?;
        let state = addr.state.clone();
        let country = addr.country.clone();

        // Prefer city > town > village > municipality for the primary place name
        let place = addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality)
            .or(addr.state_district)
            .or(addr.county)
            .or(addr.state)
            .or(addr.country)?;

        let location = Location {
            admin1: state.filter(|s| !s.is_empty() && *s != place),
            country: country.filter(|c| !c.is_empty() && *c != place),
            name: place,
            latitude,
            longitude,
        };

        tracing::info!("Reverse geocoded to: {}", location.display_name());
        Some(location)
    }
}
