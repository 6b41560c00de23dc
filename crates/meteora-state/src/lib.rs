//! Dashboard state for Meteora
//!
//! Holds the in-memory [`AppState`], persists its durable subset and fans
//! changes out to subscribers.

pub mod format;
pub mod state;
pub mod storage;
pub mod store;

pub use state::{
    AppState, Favorite, PersistedState, Settings, StatePatch, TemperatureUnit, Theme, TimeFormat,
    WeatherSnapshot, WindSpeedUnit,
};
pub use storage::{open_storage, FileStorage, MemoryStorage, StateStorage};
pub use store::{Store, Subscription};
