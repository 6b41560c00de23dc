//! The dashboard state container.
//!
//! One `Store` owns the `AppState`. Every mutation goes through
//! [`Store::update`], which merges a [`StatePatch`], optionally writes the
//! durable subset to [`StateStorage`], and then synchronously notifies
//! subscribers in registration order with the exact patch applied.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use meteora_weather::{AirQualityPayload, Location, WeatherPayload};
use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::format;
use crate::state::{AppState, Favorite, PersistedState, Settings, StatePatch, Theme, WeatherSnapshot};
use crate::storage::StateStorage;

type Listener = Arc<dyn Fn(&AppState, &StatePatch) + Send + Sync>;
type ListenerList = Mutex<Vec<(u64, Listener)>>;

/// Handle returned by [`Store::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// Remove exactly this listener. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct Store {
    state: RwLock<AppState>,
    listeners: Arc<ListenerList>,
    next_listener_id: AtomicU64,
    /// Serializes updates across threads; re-entrant so listeners may update.
    update_lock: ReentrantMutex<()>,
    storage: Arc<dyn StateStorage>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.read())
            .field("listeners", &self.listeners.lock().len())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Create a store hydrated from `storage`.
    ///
    /// Unreadable or corrupt records fall back to defaults; this never fails.
    pub fn open(storage: Arc<dyn StateStorage>) -> Self {
        Self::open_with_system_theme(storage, None)
    }

    /// Like [`Store::open`], adopting `system_theme` when the saved settings
    /// do not carry a theme of their own.
    pub fn open_with_system_theme(storage: Arc<dyn StateStorage>, system_theme: Option<Theme>) -> Self {
        let (state, has_saved_theme) = hydrate(storage.as_ref());

        let store = Self {
            state: RwLock::new(state),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
            update_lock: ReentrantMutex::new(()),
            storage,
        };

        if let Some(theme) = system_theme.filter(|_| !has_saved_theme) {
            tracing::debug!("Adopting system theme {:?}", theme);
            store.update_settings(|s| s.theme = theme);
        }

        store
    }

    /// Snapshot of the current state
    pub fn get(&self) -> AppState {
        self.state.read().clone()
    }

    pub fn settings(&self) -> Settings {
        self.state.read().settings.clone()
    }

    /// Merge `patch` into the state, persist if asked, then notify subscribers.
    pub fn update(&self, patch: StatePatch, persist: bool) {
        let _guard = self.update_lock.lock();

        let snapshot = {
            let mut state = self.state.write();
            patch.apply(&mut state);
            state.clone()
        };

        if persist {
            self.persist(&snapshot);
        }

        self.notify(&snapshot, &patch);
    }

    /// Compute a patch from the current state and apply it atomically.
    ///
    /// `f` sees a snapshot taken with no lock held, so it may call back into
    /// the store; its own updates land before the returned patch.
    pub fn update_with<F>(&self, f: F, persist: bool)
    where
        F: FnOnce(&AppState) -> StatePatch,
    {
        let _guard = self.update_lock.lock();
        let snapshot = self.state.read().clone();
        let patch = f(&snapshot);
        self.update(patch, persist);
    }

    /// Register a listener called with the new state and the applied patch.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AppState, &StatePatch) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Mutate a copy of the settings and store it.
    pub fn update_settings<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        self.update_with(
            |state| {
                let mut settings = state.settings.clone();
                f(&mut settings);
                StatePatch::default().settings(settings.normalized())
            },
            true,
        );
    }

    /// Record a successful load for `location`; clears any previous error.
    pub fn set_current_weather(
        &self,
        location: Location,
        weather: WeatherPayload,
        air_quality: Option<AirQualityPayload>,
    ) {
        self.update(
            StatePatch::default()
                .current_location(Some(location))
                .current_weather(Some(weather))
                .current_air_quality(air_quality)
                .last_updated(Some(Utc::now()))
                .error(None),
            true,
        );
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.update(StatePatch::default().loading(is_loading), false);
    }

    /// Record a user-facing error; also ends any loading state.
    pub fn set_error(&self, message: impl Into<String>) {
        self.update(
            StatePatch::default()
                .error(Some(message.into()))
                .loading(false),
            false,
        );
    }

    /// Add `location` unless a favorite already exists at the same coordinates.
    ///
    /// Coordinates are compared exactly, so the same place geocoded to
    /// slightly different floats becomes a second favorite.
    pub fn add_to_favorites(&self, location: &Location, weather: Option<&WeatherPayload>) -> bool {
        let _guard = self.update_lock.lock();

        if self.is_favorite(location.latitude, location.longitude) {
            return false;
        }

        let now = Utc::now();
        let favorite = Favorite {
            id: Favorite::id_for(location.latitude, location.longitude),
            name: location.name.clone(),
            country: location.country.clone(),
            admin1: location.admin1.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            added_at: now,
            last_weather: weather.map(|w| WeatherSnapshot::from_weather(w, now)),
        };

        self.update_with(
            |state| {
                let mut favorites = state.favorites.clone();
                favorites.push(favorite);
                StatePatch::default().favorites(favorites)
            },
            true,
        );

        tracing::info!("Added {} to favorites", location.name);
        true
    }

    pub fn remove_from_favorites(&self, id: &str) {
        let _guard = self.update_lock.lock();

        let favorites = self.state.read().favorites.clone();
        if !favorites.iter().any(|f| f.id == id) {
            return;
        }

        let remaining = favorites.into_iter().filter(|f| f.id != id).collect();
        self.update(StatePatch::default().favorites(remaining), true);
    }

    pub fn is_favorite(&self, latitude: f64, longitude: f64) -> bool {
        self.state
            .read()
            .favorites
            .iter()
            .any(|f| f.is_at(latitude, longitude))
    }

    /// Replace the weather snapshot of favorite `id`, if present.
    pub fn update_favorite_weather(&self, id: &str, weather: &WeatherPayload) {
        let _guard = self.update_lock.lock();

        let mut favorites = self.state.read().favorites.clone();
        let Some(favorite) = favorites.iter_mut().find(|f| f.id == id) else {
            return;
        };
        favorite.last_weather = Some(WeatherSnapshot::from_weather(weather, Utc::now()));

        self.update(StatePatch::default().favorites(favorites), true);
    }

    pub fn format_temperature(&self, celsius: Option<f64>) -> String {
        format::format_temperature(celsius, self.state.read().settings.temperature_unit)
    }

    pub fn format_wind_speed(&self, kmh: Option<f64>) -> String {
        format::format_wind_speed(kmh, self.state.read().settings.wind_speed_unit)
    }

    pub fn format_time(&self, time: Option<&str>) -> String {
        format::format_time(time, self.state.read().settings.time_format)
    }

    /// Restore defaults and erase the persisted record.
    pub fn reset(&self) {
        let _guard = self.update_lock.lock();

        self.update(
            StatePatch::default()
                .current_location(None)
                .current_weather(None)
                .current_air_quality(None)
                .settings(Settings::default())
                .favorites(Vec::new())
                .loading(false)
                .last_updated(None)
                .error(None),
            false,
        );

        if let Err(e) = self.storage.clear() {
            tracing::warn!("Failed to clear saved state: {}", e);
        }
        tracing::info!("Dashboard state reset");
    }

    fn persist(&self, state: &AppState) {
        let record = PersistedState::from(state);
        let result = serde_json::to_string(&record)
            .map_err(Into::into)
            .and_then(|json| self.storage.save(&json));

        if let Err(e) = result {
            tracing::warn!("Failed to save state to storage: {}", e);
        }
    }

    fn notify(&self, state: &AppState, patch: &StatePatch) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(state, patch))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("State listener panicked: {}", reason);
            }
        }
    }
}

/// Load the durable subset, reporting whether saved settings carry a theme.
fn hydrate(storage: &dyn StateStorage) -> (AppState, bool) {
    let record = match storage.load() {
        Ok(Some(record)) => record,
        Ok(None) => return (AppState::default(), false),
        Err(e) => {
            tracing::warn!("Failed to load state from storage: {}", e);
            return (AppState::default(), false);
        }
    };

    let parsed = serde_json::from_str::<serde_json::Value>(&record).and_then(|value| {
        let has_theme = value.pointer("/settings/theme").is_some();
        serde_json::from_value::<PersistedState>(value).map(|saved| (saved, has_theme))
    });

    match parsed {
        Ok((saved, has_theme)) => {
            tracing::debug!("Restored {} favorites from storage", saved.favorites.len());
            let state = AppState {
                settings: saved.settings.normalized(),
                favorites: saved.favorites,
                current_location: saved.current_location,
                ..AppState::default()
            };
            (state, has_theme)
        }
        Err(e) => {
            tracing::warn!("Saved state is corrupt, using defaults: {}", e);
            (AppState::default(), false)
        }
    }
}
