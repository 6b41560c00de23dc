//! Application state, user settings and favorites.

use chrono::{DateTime, Utc};
use meteora_weather::{AirQualityPayload, Location, WeatherPayload};
use serde::{Deserialize, Serialize};

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// Wind speed unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Kmh,
    Mph,
    Ms,
}

/// Clock style for displayed times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "24")]
    TwentyFourHour,
    #[serde(rename = "12")]
    TwelveHour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

fn default_refresh_interval() -> u32 {
    10
}

/// User preferences. Missing keys in a persisted record take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub temperature_unit: TemperatureUnit,
    pub wind_speed_unit: WindSpeedUnit,
    pub time_format: TimeFormat,
    pub theme: Theme,
    pub auto_refresh: bool,
    #[serde(alias = "refreshInterval")]
    pub refresh_interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::default(),
            wind_speed_unit: WindSpeedUnit::default(),
            time_format: TimeFormat::default(),
            theme: Theme::default(),
            auto_refresh: true,
            refresh_interval_minutes: default_refresh_interval(),
        }
    }
}

impl Settings {
    /// Restore invariants a hand-edited record may have broken
    pub(crate) fn normalized(mut self) -> Self {
        if self.refresh_interval_minutes == 0 {
            self.refresh_interval_minutes = default_refresh_interval();
        }
        self
    }
}

/// Weather summary kept alongside a favorite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub temperature: Option<f64>,
    pub weather_code: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn from_weather(weather: &WeatherPayload, now: DateTime<Utc>) -> Self {
        Self {
            temperature: weather.current.temperature_2m,
            weather_code: weather.current.weather_code,
            updated_at: now,
        }
    }
}

/// A saved place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    /// "lat,lon"
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub last_weather: Option<WeatherSnapshot>,
}

impl Favorite {
    pub fn id_for(latitude: f64, longitude: f64) -> String {
        format!("{},{}", latitude, longitude)
    }

    pub fn location(&self) -> Location {
        Location {
            name: self.name.clone(),
            country: self.country.clone(),
            admin1: self.admin1.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Exact coordinate match. Two searches that geocode the same place to
    /// slightly different floats are treated as different favorites.
    pub fn is_at(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }
}

/// Everything the dashboard knows at a point in time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub current_location: Option<Location>,
    pub current_weather: Option<WeatherPayload>,
    pub current_air_quality: Option<AirQualityPayload>,
    pub settings: Settings,
    pub favorites: Vec<Favorite>,
    /// Transient, never persisted
    pub is_loading: bool,
    pub last_updated: Option<DateTime<Utc>>,
    /// Transient, never persisted
    pub error: Option<String>,
}

impl AppState {
    /// True when there is no data or it is older than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        match self.last_updated {
            Some(updated) => now - updated > max_age,
            None => true,
        }
    }
}

/// A shallow, top-level partial update of `AppState`.
///
/// `None` leaves a field untouched; for optional fields `Some(None)` clears it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatePatch {
    pub current_location: Option<Option<Location>>,
    pub current_weather: Option<Option<WeatherPayload>>,
    pub current_air_quality: Option<Option<AirQualityPayload>>,
    pub settings: Option<Settings>,
    pub favorites: Option<Vec<Favorite>>,
    pub is_loading: Option<bool>,
    pub last_updated: Option<Option<DateTime<Utc>>>,
    pub error: Option<Option<String>>,
}

impl StatePatch {
    pub fn current_location(mut self, location: Option<Location>) -> Self {
        self.current_location = Some(location);
        self
    }

    pub fn current_weather(mut self, weather: Option<WeatherPayload>) -> Self {
        self.current_weather = Some(weather);
        self
    }

    pub fn current_air_quality(mut self, air_quality: Option<AirQualityPayload>) -> Self {
        self.current_air_quality = Some(air_quality);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn favorites(mut self, favorites: Vec<Favorite>) -> Self {
        self.favorites = Some(favorites);
        self
    }

    pub fn loading(mut self, is_loading: bool) -> Self {
        self.is_loading = Some(is_loading);
        self
    }

    pub fn last_updated(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_updated = Some(at);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite every field this patch sets
    pub(crate) fn apply(&self, state: &mut AppState) {
        if let Some(location) = &self.current_location {
            state.current_location = location.clone();
        }
        if let Some(weather) = &self.current_weather {
            state.current_weather = weather.clone();
        }
        if let Some(air_quality) = &self.current_air_quality {
            state.current_air_quality = air_quality.clone();
        }
        if let Some(settings) = &self.settings {
            state.settings = settings.clone();
        }
        if let Some(favorites) = &self.favorites {
            state.favorites = favorites.clone();
        }
        if let Some(is_loading) = self.is_loading {
            state.is_loading = is_loading;
        }
        if let Some(last_updated) = self.last_updated {
            state.last_updated = last_updated;
        }
        if let Some(error) = &self.error {
            state.error = error.clone();
        }
    }
}

/// The durable subset of `AppState`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedState {
    pub settings: Settings,
    pub favorites: Vec<Favorite>,
    pub current_location: Option<Location>,
}

impl From<&AppState> for PersistedState {
    fn from(state: &AppState) -> Self {
        Self {
            settings: state.settings.clone(),
            favorites: state.favorites.clone(),
            current_location: state.current_location.clone(),
        }
    }
}
