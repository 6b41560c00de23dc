//! Debounced city search.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use meteora_offline::Fetch;
use meteora_weather::{CityMatch, GatewayError, WeatherClient};

/// Only the last query typed within the quiet period reaches the network.
/// Requests already sent are not cancelled.
#[derive(Debug)]
pub struct SearchDebouncer {
    quiet: Duration,
    generation: AtomicU64,
}

impl SearchDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            generation: AtomicU64::new(0),
        }
    }

    /// `None` when a newer query superseded this one during the quiet period.
    pub async fn search<F: Fetch>(
        &self,
        client: &WeatherClient<F>,
        query: &str,
    ) -> Option<Result<Vec<CityMatch>, GatewayError>> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.quiet).await;

        if self.generation.load(Ordering::SeqCst) != ticket {
            tracing::debug!("Search for {:?} superseded", query);
            return None;
        }
        Some(client.search_cities(query).await)
    }
}
