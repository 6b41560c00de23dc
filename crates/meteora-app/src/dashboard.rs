//! Dashboard controller: turns UI events into gateway calls and store
//! updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use meteora_core::{AppError, DashboardConfig, DefaultLocation};
use meteora_offline::{Fetch, HttpFetcher};
use meteora_state::{AppState, Favorite, Settings, Store, Subscription, Theme};
use meteora_weather::{Location, LocationPermission, LocationProvider, WeatherClient};
use parking_lot::Mutex;

use crate::events::{DashboardEvent, Feedback};
use crate::refresh::AutoRefresh;
use crate::search::SearchDebouncer;

const MIN_QUERY_CHARS: usize = 2;

/// `F` is the transport under the gateway; with an `OfflineCacheManager`
/// the dashboard keeps showing cached data while the network is down.
pub struct Dashboard<L, F = HttpFetcher> {
    store: Arc<Store>,
    client: WeatherClient<F>,
    locator: L,
    config: DashboardConfig,
    search: SearchDebouncer,
    auto_refresh: AutoRefresh,
    online: AtomicBool,
    settings_watch: Mutex<Option<Subscription>>,
    /// (enabled, minutes) the timer was last configured with
    refresh_schedule: Mutex<Option<(bool, u32)>>,
}

impl<L: LocationProvider + 'static, F: Fetch + 'static> Dashboard<L, F> {
    pub fn new(store: Arc<Store>, client: WeatherClient<F>, locator: L, config: DashboardConfig) -> Self {
        Self {
            store,
            client,
            locator,
            search: SearchDebouncer::new(Duration::from_millis(config.search_debounce_ms)),
            config,
            auto_refresh: AutoRefresh::new(),
            online: AtomicBool::new(true),
            settings_watch: Mutex::new(None),
            refresh_schedule: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Wire auto refresh to the settings and load the initial location.
    pub async fn start(self: &Arc<Self>) -> Result<Location, AppError> {
        self.watch_settings();
        self.initialize_location().await
    }

    pub fn shutdown(&self) {
        if let Some(subscription) = self.settings_watch.lock().take() {
            subscription.unsubscribe();
        }
        self.auto_refresh.stop();
    }

    fn watch_settings(self: &Arc<Self>) {
        self.configure_auto_refresh(&self.store.settings());

        let weak = Arc::downgrade(self);
        let subscription = self.store.subscribe(move |state, patch| {
            if patch.settings.is_none() {
                return;
            }
            if let Some(dashboard) = weak.upgrade() {
                dashboard.configure_auto_refresh(&state.settings);
            }
        });

        if let Some(previous) = self.settings_watch.lock().replace(subscription) {
            previous.unsubscribe();
        }
    }

    fn configure_auto_refresh(self: &Arc<Self>, settings: &Settings) {
        let schedule = (settings.auto_refresh, settings.refresh_interval_minutes);
        {
            let mut current = self.refresh_schedule.lock();
            if *current == Some(schedule) {
                return;
            }
            *current = Some(schedule);
        }

        let every = settings
            .auto_refresh
            .then(|| Duration::from_secs(u64::from(settings.refresh_interval_minutes) * 60));
        let weak = Arc::downgrade(self);

        self.auto_refresh.configure(every, move || {
            let weak = weak.clone();
            async move {
                if let Some(dashboard) = weak.upgrade() {
                    if let Err(e) = dashboard.refresh().await {
                        tracing::debug!("Auto-refresh failed: {}", e);
                    }
                }
            }
        });
    }

    /// Fetch forecast and air quality together and publish them.
    ///
    /// Air quality is optional: its failure only drops that panel.
    pub async fn load_weather(&self, location: Location) -> Result<(), AppError> {
        self.store.set_loading(true);

        let (weather, air_quality) = tokio::join!(
            self.client.weather(location.latitude, location.longitude),
            self.client.air_quality(location.latitude, location.longitude),
        );

        let air_quality = match air_quality {
            Ok(air) => Some(air),
            Err(e) => {
                tracing::warn!("Air quality unavailable for {}: {}", location.name, e);
                None
            }
        };

        let weather = match weather {
            Ok(weather) => weather,
            Err(e) => {
                tracing::error!("Failed to load weather for {}: {}", location.name, e);
                let err = AppError::from(e);
                self.store.set_error(err.user_message());
                return Err(err);
            }
        };

        let favorite_id = self
            .store
            .is_favorite(location.latitude, location.longitude)
            .then(|| Favorite::id_for(location.latitude, location.longitude));

        tracing::info!("Loaded weather for {}", location.display_name());
        self.store
            .set_current_weather(location, weather.clone(), air_quality);
        if let Some(id) = favorite_id {
            self.store.update_favorite_weather(&id, &weather);
        }
        self.store.set_loading(false);
        Ok(())
    }

    /// Saved location, then geolocation when already granted, then the
    /// configured default.
    pub async fn initialize_location(&self) -> Result<Location, AppError> {
        if let Some(saved) = self.store.get().current_location {
            match self.load_weather(saved.clone()).await {
                Ok(()) => return Ok(saved),
                Err(e) => tracing::warn!("Failed to load weather for saved location: {}", e),
            }
        }

        let location = match self.locator.permission().await {
            LocationPermission::Granted => match self.locate().await {
                Ok(location) => location,
                Err(e) => {
                    tracing::warn!("Geolocation failed, using default location: {}", e);
                    default_location(&self.config.default_location)
                }
            },
            permission => {
                tracing::debug!("Geolocation {:?}, using default location", permission);
                default_location(&self.config.default_location)
            }
        };

        self.load_weather(location.clone()).await?;
        Ok(location)
    }

    /// Current position, named by reverse geocoding when possible.
    pub async fn locate(&self) -> Result<Location, AppError> {
        let position = self.locator.current_position().await?;
        let location = self
            .client
            .reverse_geocode(position.latitude, position.longitude)
            .await
            .unwrap_or_else(|| Location::unnamed(position.latitude, position.longitude));
        Ok(location)
    }

    /// Reload the current location. `Ok(false)` when there is none.
    pub async fn refresh(&self) -> Result<bool, AppError> {
        let Some(location) = self.store.get().current_location else {
            return Ok(false);
        };
        self.load_weather(location).await?;
        tracing::debug!("Weather data refreshed");
        Ok(true)
    }

    pub async fn handle(&self, event: DashboardEvent) -> Feedback {
        match event {
            DashboardEvent::SearchInput(query) => self.search(&query).await,
            DashboardEvent::SelectCity(location) => match self.load_weather(location).await {
                Ok(()) => Feedback::HideSuggestions,
                Err(e) => Feedback::Error(e.user_message().to_string()),
            },
            DashboardEvent::UseMyLocation => self.use_my_location().await,
            DashboardEvent::ToggleTheme => {
                let theme = self.store.settings().theme.toggled();
                self.store.update_settings(|s| s.theme = theme);
                let name = match theme {
                    Theme::Dark => "dark",
                    Theme::Light => "light",
                };
                Feedback::Success(format!("Switched to {} theme", name))
            }
            DashboardEvent::SetTemperatureUnit(unit) => {
                self.store.update_settings(|s| s.temperature_unit = unit);
                Feedback::None
            }
            DashboardEvent::SetWindSpeedUnit(unit) => {
                self.store.update_settings(|s| s.wind_speed_unit = unit);
                Feedback::None
            }
            DashboardEvent::SetTimeFormat(format) => {
                self.store.update_settings(|s| s.time_format = format);
                Feedback::None
            }
            DashboardEvent::SetAutoRefresh(enabled) => {
                self.store.update_settings(|s| s.auto_refresh = enabled);
                Feedback::None
            }
            DashboardEvent::ToggleFavorite => self.toggle_favorite(),
            DashboardEvent::RemoveFavorite(id) => {
                self.store.remove_from_favorites(&id);
                Feedback::None
            }
            DashboardEvent::OpenFavorite(id) => {
                let favorite = self.store.get().favorites.into_iter().find(|f| f.id == id);
                match favorite {
                    Some(favorite) => match self.load_weather(favorite.location()).await {
                        Ok(()) => Feedback::None,
                        Err(e) => Feedback::Error(e.user_message().to_string()),
                    },
                    None => Feedback::None,
                }
            }
            DashboardEvent::Refresh => match self.refresh().await {
                Ok(true) => Feedback::Success("Weather data refreshed".to_string()),
                Ok(false) => Feedback::None,
                Err(e) => Feedback::Error(e.user_message().to_string()),
            },
            DashboardEvent::Online => {
                self.online.store(true, Ordering::SeqCst);
                tracing::info!("Dashboard is online");
                self.refresh_if_stale(self.config.stale_on_online_minutes).await;
                Feedback::None
            }
            DashboardEvent::Offline => {
                self.online.store(false, Ordering::SeqCst);
                tracing::info!("Dashboard is offline");
                Feedback::Error("App is offline. Some features may not work.".to_string())
            }
            DashboardEvent::VisibilityChanged(visible) => {
                self.auto_refresh.set_visible(visible);
                if visible && self.store.settings().auto_refresh {
                    self.refresh_if_stale(self.config.stale_on_visible_minutes).await;
                }
                Feedback::None
            }
        }
    }

    async fn search(&self, query: &str) -> Feedback {
        if query.trim().chars().count() < MIN_QUERY_CHARS {
            return Feedback::HideSuggestions;
        }

        match self.search.search(&self.client, query).await {
            None => Feedback::None,
            Some(Ok(cities)) => Feedback::Suggestions(cities),
            Some(Err(e)) => {
                tracing::warn!("Search failed: {}", e);
                Feedback::HideSuggestions
            }
        }
    }

    async fn use_my_location(&self) -> Feedback {
        if self.locator.permission().await == LocationPermission::Denied {
            return Feedback::Error(
                "Location access denied. Please enable location permissions and try again."
                    .to_string(),
            );
        }

        let result = match self.locate().await {
            Ok(location) => self.load_weather(location).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Feedback::Success("Location updated successfully".to_string()),
            Err(e) => {
                tracing::warn!("Location update failed: {}", e);
                Feedback::Error(e.user_message().to_string())
            }
        }
    }

    fn toggle_favorite(&self) -> Feedback {
        let state = self.store.get();
        let Some(location) = state.current_location else {
            return Feedback::Error("No location selected".to_string());
        };

        if self.store.is_favorite(location.latitude, location.longitude) {
            self.store
                .remove_from_favorites(&Favorite::id_for(location.latitude, location.longitude));
            Feedback::Success(format!("Removed {} from favorites", location.name))
        } else {
            self.store
                .add_to_favorites(&location, state.current_weather.as_ref());
            Feedback::Success(format!("Added {} to favorites", location.name))
        }
    }

    async fn refresh_if_stale(&self, minutes: u32) {
        if !needs_refresh(&self.store.get(), Utc::now(), minutes) {
            return;
        }
        if let Err(e) = self.refresh().await {
            tracing::debug!("Background refresh failed: {}", e);
        }
    }
}

impl<L, F> Drop for Dashboard<L, F> {
    fn drop(&mut self) {
        if let Some(subscription) = self.settings_watch.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

/// Data for a location exists and is older than `minutes`.
pub fn needs_refresh(state: &AppState, now: DateTime<Utc>, minutes: u32) -> bool {
    state.current_location.is_some()
        && state
            .last_updated
            .is_some_and(|at| now - at > chrono::Duration::minutes(i64::from(minutes)))
}

fn default_location(default: &DefaultLocation) -> Location {
    Location {
        name: default.name.clone(),
        country: Some(default.country.clone()).filter(|c| !c.is_empty()),
        admin1: Some(default.admin1.clone()).filter(|a| !a.is_empty()),
        latitude: default.latitude,
        longitude: default.longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_updated(minutes_ago: Option<i64>, now: DateTime<Utc>) -> AppState {
        AppState {
            current_location: Some(Location::unnamed(1.0, 2.0)),
            last_updated: minutes_ago.map(|m| now - chrono::Duration::minutes(m)),
            ..AppState::default()
        }
    }

    #[test]
    fn test_needs_refresh() {
        let now = Utc::now();
        assert!(needs_refresh(&state_updated(Some(11), now), now, 10));
        assert!(!needs_refresh(&state_updated(Some(9), now), now, 10));
        // Nothing loaded yet: the startup path handles that
        assert!(!needs_refresh(&state_updated(None, now), now, 10));
        assert!(!needs_refresh(&AppState::default(), now, 10));
    }

    #[test]
    fn test_default_location() {
        let location = default_location(&DefaultLocation::default());
        assert_eq!(location.name, "New York");
        assert_eq!(location.country.as_deref(), Some("US"));
        assert_eq!(location.latitude, 40.7128);
    }
}
