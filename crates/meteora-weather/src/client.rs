//! Open-Meteo forecast and air-quality client.
//!
//! Requests go through a [`Fetch`] implementation: plain HTTP, or an
//! `OfflineCacheManager` that answers from its caches when the network is
//! down. Every request is bounded by the configured timeout; when it
//! elapses the in-flight request is dropped and `GatewayError::Timeout` is
//! returned.

use std::sync::Arc;

use meteora_core::ApiConfig;
use meteora_offline::{Fetch, HttpFetcher, Request};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::GatewayError;
use crate::types::{AirQualityPayload, WeatherPayload};

const TIMEZONE: &str = "auto";

const CURRENT_FIELDS: &[&str] = &[
    "temperature_2m",
    "apparent_temperature",
    "relative_humidity_2m",
    "precipitation",
    "weather_code",
    "pressure_msl",
    "wind_speed_10m",
    "wind_direction_10m",
    "uv_index",
];

const HOURLY_FIELDS: &[&str] = &[
    "temperature_2m",
    "apparent_temperature",
    "precipitation_probability",
    "precipitation",
    "weather_code",
    "pressure_msl",
    "wind_speed_10m",
    "wind_direction_10m",
    "uv_index",
    "visibility",
];

const DAILY_FIELDS: &[&str] = &[
    "weather_code",
    "temperature_2m_max",
    "temperature_2m_min",
    "apparent_temperature_max",
    "apparent_temperature_min",
    "sunrise",
    "sunset",
    "uv_index_max",
    "precipitation_sum",
    "rain_sum",
    "precipitation_probability_max",
    "wind_speed_10m_max",
    "wind_direction_10m_dominant",
];

const AIR_CURRENT_FIELDS: &[&str] = &[
    "us_aqi",
    "pm10",
    "pm2_5",
    "carbon_monoxide",
    "nitrogen_dioxide",
    "sulphur_dioxide",
    "ozone",
];

const AIR_HOURLY_FIELDS: &[&str] = &["us_aqi", "pm10", "pm2_5"];

#[derive(Debug)]
pub(crate) struct Endpoints {
    pub forecast: Url,
    pub geocoding: Url,
    pub reverse_geocoding: Url,
    pub air_quality: Url,
}

/// Error body the cache manager synthesizes when neither network nor cache
/// can answer a data request
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Gateway over the remote geocoding, forecast and air-quality endpoints.
#[derive(Debug)]
pub struct WeatherClient<F = HttpFetcher> {
    pub(crate) fetcher: Arc<F>,
    pub(crate) endpoints: Arc<Endpoints>,
    pub(crate) search_limit: usize,
}

impl<F> Clone for WeatherClient<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            endpoints: self.endpoints.clone(),
            search_limit: self.search_limit,
        }
    }
}

impl WeatherClient<HttpFetcher> {
    /// Client talking to the network directly.
    pub fn new(api: &ApiConfig) -> Result<Self, GatewayError> {
        Self::with_fetcher(api, Arc::new(HttpFetcher::new(api)?))
    }
}

impl<F: Fetch> WeatherClient<F> {
    /// Client whose requests go through `fetcher`, typically a shared
    /// `OfflineCacheManager`.
    pub fn with_fetcher(api: &ApiConfig, fetcher: Arc<F>) -> Result<Self, GatewayError> {
        let endpoints = Endpoints {
            forecast: Url::parse(&api.forecast_url)?,
            geocoding: Url::parse(&api.geocoding_url)?,
            reverse_geocoding: Url::parse(&api.reverse_geocoding_url)?,
            air_quality: Url::parse(&api.air_quality_url)?,
        };

        Ok(Self {
            fetcher,
            endpoints: Arc::new(endpoints),
            search_limit: api.search_limit,
        })
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }
    /// Current, hourly and daily forecast for the given coordinates.
    pub async fn weather(&self, latitude: f64, longitude: f64) -> Result<WeatherPayload, GatewayError> {
        let mut url = self.endpoints.forecast.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &latitude.to_string())
            .append_pair("longitude", &longitude.to_string())
            .append_pair("timezone", TIMEZONE)
            .append_pair("current", &CURRENT_FIELDS.join(","))
            .append_pair("hourly", &HOURLY_FIELDS.join(","))
            .append_pair("daily", &DAILY_FIELDS.join(","));

        let payload: WeatherPayload = self.get_json(url).await.inspect_err(|e| {
            tracing::warn!("Failed to fetch weather data: {}", e);
        })?;

        tracing::debug!(
            "Fetched forecast for {},{} ({} hourly points)",
            latitude,
            longitude,
            payload.hourly.time.len()
        );
        Ok(payload)
    }

    /// Current and hourly pollutant readings for the given coordinates.
    pub async fn air_quality(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AirQualityPayload, GatewayError> {
        let mut url = self.endpoints.air_quality.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &latitude.to_string())
            .append_pair("longitude", &longitude.to_string())
            .append_pair("timezone", TIMEZONE)
            .append_pair("current", &AIR_CURRENT_FIELDS.join(","))
            .append_pair("hourly", &AIR_HOURLY_FIELDS.join(","));

        self.get_json(url).await.inspect_err(|e| {
            tracing::warn!("Failed to fetch air quality data: {}", e);
        })
    }

    /// GET `url` and decode the JSON body, mapping non-success statuses to errors.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        let response = self.fetcher.fetch(&Request::get(url)).await?;

        if !response.is_success() {
            if let Ok(body) = response.json::<ErrorBody>() {
                if body.error == "Offline" {
                    return Err(GatewayError::Offline);
                }
            }
            return Err(GatewayError::Http {
                status: response.status,
                message: StatusCode::from_u16(response.status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        response
            .json()
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }
}
