//! Remote data gateway for Meteora
//!
//! Geocoding, forecast and air-quality data via the Open-Meteo APIs, reverse
//! geocoding via Nominatim, and the geolocation abstraction.

pub mod client;
pub mod error;
pub mod geocode;
pub mod location;
pub mod types;

pub use client::WeatherClient;
pub use error::GatewayError;
pub use location::{FixedLocator, LocationPermission, LocationProvider, Position, SystemLocator};
pub use types::*;
