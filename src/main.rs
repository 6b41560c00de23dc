use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use meteora_app::{Dashboard, DashboardEvent, Feedback};
use meteora_core::{Config, OfflineConfig};
use meteora_offline::{CacheStorage, CacheWorker, ControlMessage, HttpFetcher, OfflineCacheManager};
use meteora_state::{format, open_storage, Store};
use meteora_weather::{SystemLocator, WeatherClient};

#[tokio::main]
async fn main() -> Result<()> {
    meteora_core::init()?;

    let (config, _) = Config::load_validated()?;
    let store = Arc::new(Store::open(open_storage(&config.state_path())));

    let snapshot = config.cache_dir().join("offline.json");
    let storage = CacheStorage::load_from(&snapshot).unwrap_or_else(|e| {
        tracing::warn!("Discarding cache snapshot: {}", e);
        CacheStorage::new()
    });
    // The terminal front end has no shell or static assets to pre-cache
    let offline = OfflineConfig {
        static_assets: Vec::new(),
        ..config.offline.clone()
    };
    let fetcher = HttpFetcher::new(&config.api).context("Failed to create HTTP client")?;
    let manager = Arc::new(
        OfflineCacheManager::new(&offline, fetcher, storage.clone())
            .context("Failed to create offline cache manager")?,
    );
    let worker = CacheWorker::spawn(
        manager.clone(),
        Duration::from_secs(u64::from(offline.sweep_interval_minutes) * 60),
    );
    // Queued behind install, so interception is live once this returns
    if let Err(e) = worker.request(ControlMessage::ActivateNow).await {
        tracing::warn!("Offline cache unavailable: {}", e);
    }

    let client = WeatherClient::with_fetcher(&config.api, manager)
        .context("Failed to create weather client")?;
    let dashboard = Arc::new(Dashboard::new(
        store.clone(),
        client,
        SystemLocator,
        config.dashboard.clone(),
    ));

    tracing::info!("Meteora started");

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        if let Err(e) = dashboard.start().await {
            eprintln!("{}", e.user_message());
        }
    } else {
        match dashboard.handle(DashboardEvent::SearchInput(query.clone())).await {
            Feedback::Suggestions(cities) if !cities.is_empty() => {
                let city = cities[0].location.clone();
                if let Feedback::Error(message) =
                    dashboard.handle(DashboardEvent::SelectCity(city)).await
                {
                    eprintln!("{}", message);
                }
            }
            _ => eprintln!("No places found for \"{}\"", query.trim()),
        }
    }

    print_summary(&store);
    dashboard.shutdown();

    worker.shutdown().await;
    if let Err(e) = storage.save_to(&snapshot) {
        tracing::warn!("Failed to save cache snapshot: {}", e);
    }
    Ok(())
}

fn print_summary(store: &Store) {
    let state = store.get();
    let (Some(location), Some(weather)) = (&state.current_location, &state.current_weather) else {
        return;
    };

    println!("{}", location.display_name());
    println!(
        "  {}",
        format::format_coordinates(location.latitude, location.longitude, 4)
    );
    println!(
        "  {}  {}",
        store.format_temperature(weather.current.temperature_2m),
        weather
            .condition()
            .map(|c| format!("{} {}", c.icon(), c.description()))
            .unwrap_or_else(|| format::PLACEHOLDER.to_string())
    );
    println!(
        "  Feels like {}, wind {}",
        store.format_temperature(weather.current.apparent_temperature),
        store.format_wind_speed(weather.current.wind_speed_10m)
    );
    if let Some(air) = &state.current_air_quality {
        if let Some(category) = air.category() {
            println!("  Air quality: {}", category.description());
        }
    }
    println!(
        "  Sunrise {}, sunset {}",
        store.format_time(weather.daily.sunrise.first().map(String::as_str)),
        store.format_time(weather.daily.sunset.first().map(String::as_str))
    );
    println!(
        "  Updated {}",
        format::format_time_ago(state.last_updated, chrono::Utc::now())
    );

    if !state.favorites.is_empty() {
        println!("\nFavorites:");
        for favorite in &state.favorites {
            let temperature = favorite.last_weather.as_ref().and_then(|w| w.temperature);
            println!("  {}  {}", favorite.name, store.format_temperature(temperature));
        }
    }
}
