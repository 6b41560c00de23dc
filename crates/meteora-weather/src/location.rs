//! Geolocation: permission state and current position.

use std::future::Future;

use meteora_core::LocationError;
use serde::{Deserialize, Serialize};

/// Permission state of the platform geolocation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationPermission {
    Granted,
    Denied,
    Prompt,
    Unavailable,
}

/// A raw position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

/// Source of the device position.
pub trait LocationProvider: Send + Sync {
    fn permission(&self) -> impl Future<Output = LocationPermission> + Send;

    fn current_position(&self) -> impl Future<Output = Result<Position, LocationError>> + Send;
}

/// Platform locator. No backend is wired up yet, so it reports `Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLocator;

impl LocationProvider for SystemLocator {
    async fn permission(&self) -> LocationPermission {
        LocationPermission::Unavailable
    }

    async fn current_position(&self) -> Result<Position, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

/// Locator answering with a fixed position, e.g. coordinates from the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator {
    permission: LocationPermission,
    position: Option<Position>,
}

impl FixedLocator {
    pub fn granted(latitude: f64, longitude: f64) -> Self {
        Self {
            permission: LocationPermission::Granted,
            position: Some(Position {
                latitude,
                longitude,
                accuracy_meters: None,
            }),
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: LocationPermission::Denied,
            position: None,
        }
    }
}

impl LocationProvider for FixedLocator {
    async fn permission(&self) -> LocationPermission {
        self.permission
    }

    async fn current_position(&self) -> Result<Position, LocationError> {
        match (self.permission, self.position) {
            (LocationPermission::Denied, _) => Err(LocationError::PermissionDenied),
            (_, Some(position)) => Ok(position),
            (_, None) => Err(LocationError::ServiceUnavailable),
        }
    }
}
