//! Typed UI events and the feedback the dashboard gives in return.

use meteora_state::{TemperatureUnit, TimeFormat, WindSpeedUnit};
use meteora_weather::{CityMatch, Location};

/// Everything the UI can ask the dashboard to do.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// Search box text changed (debounced)
    SearchInput(String),
    /// A search suggestion was picked
    SelectCity(Location),
    /// "Use my location" button
    UseMyLocation,
    ToggleTheme,
    SetTemperatureUnit(TemperatureUnit),
    SetWindSpeedUnit(WindSpeedUnit),
    SetTimeFormat(TimeFormat),
    SetAutoRefresh(bool),
    /// Add or remove the current location from favorites
    ToggleFavorite,
    RemoveFavorite(String),
    /// Load a saved favorite
    OpenFavorite(String),
    Refresh,
    Online,
    Offline,
    VisibilityChanged(bool),
}

/// What the UI should show after handling an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    None,
    Suggestions(Vec<CityMatch>),
    HideSuggestions,
    Success(String),
    Error(String),
}
