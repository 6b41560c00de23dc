//! Integration tests for WeatherClient using wiremock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meteora_core::{ApiConfig, OfflineConfig};
use meteora_offline::{
    CacheStorage, Fetch, FetchError, HttpFetcher, OfflineCacheManager, Request, Response,
};
use meteora_weather::{GatewayError, WeatherClient, WeatherCondition};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ApiConfig {
    ApiConfig {
        forecast_url: format!("{}/v1/forecast", server.uri()),
        geocoding_url: format!("{}/v1/search", server.uri()),
        reverse_geocoding_url: format!("{}/reverse", server.uri()),
        air_quality_url: format!("{}/v1/air-quality", server.uri()),
        timeout_secs: 1,
        ..ApiConfig::default()
    }
}

fn client_for(server: &MockServer) -> WeatherClient {
    WeatherClient::new(&api_for(server)).unwrap()
}

/// HTTP that can be switched off to simulate losing the connection.
struct Switchable {
    http: HttpFetcher,
    offline: Arc<AtomicBool>,
}

impl Fetch for Switchable {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("connection refused".into()));
        }
        self.http.fetch(request).await
    }
}

/// Client whose requests go through an active cache manager, plus the
/// switch that takes the network down.
async fn cached_client(
    server: &MockServer,
) -> (WeatherClient<OfflineCacheManager<Switchable>>, Arc<AtomicBool>) {
    let api = api_for(server);
    let offline = OfflineConfig {
        origin: format!("{}/", server.uri()),
        static_assets: Vec::new(),
        data_endpoints: vec![format!("{}/v1/", server.uri())],
        ..OfflineConfig::default()
    };
    let switch = Arc::new(AtomicBool::new(false));
    let fetcher = Switchable {
        http: HttpFetcher::new(&api).unwrap(),
        offline: switch.clone(),
    };
    let manager = OfflineCacheManager::new(&offline, fetcher, CacheStorage::new()).unwrap();
    manager.install().await.unwrap();
    manager.activate().await.unwrap();

    let client = WeatherClient::with_fetcher(&api, Arc::new(manager)).unwrap();
    (client, switch)
}

fn search_result(name: &str, lat: f64, lon: f64) -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "name": name,
        "latitude": lat,
        "longitude": lon,
        "country": "Germany",
        "admin1": "Berlin",
        "timezone": "Europe/Berlin",
        "population": 3426354
    })
}

fn forecast_body() -> serde_json::Value {
    serde_json::json!({
        "latitude": 52.52,
        "longitude": 13.41,
        "timezone": "Europe/Berlin",
        "elevation": 38.0,
        "current": {
            "time": "2026-10-18T12:00",
            "temperature_2m": 14.2,
            "weather_code": 61,
            "wind_speed_10m": 18.0
        },
        "hourly": {
            "time": ["2026-10-18T12:00", "2026-10-18T13:00"],
            "temperature_2m": [14.2, 14.8]
        },
        "daily": {
            "time": ["2026-10-18"],
            "temperature_2m_max": [16.0],
            "temperature_2m_min": [9.0],
            "sunrise": ["2026-10-18T07:31"],
            "sunset": ["2026-10-18T18:12"]
        }
    })
}

#[tokio::test]
async fn test_search_short_query_skips_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.search_cities("B").await.unwrap().is_empty());
    assert!(client.search_cities("  x  ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_preserves_server_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "Berlin"))
        .and(query_param("count", "8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                search_result("Berlin", 52.52437, 13.41053),
                search_result("Berlin", 39.92064, -74.95819),
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let cities = client.search_cities(" Berlin ").await.unwrap();

    assert_eq!(cities.len(), 2);
    assert_eq!(cities[0].id, "52.52437,13.41053");
    assert_eq!(cities[0].location.admin1.as_deref(), Some("Berlin"));
    assert_eq!(cities[0].population, 3426354);
    assert_eq!(cities[1].location.longitude, -74.95819);
}

#[tokio::test]
async fn test_search_caps_results_at_limit() {
    let mock_server = MockServer::start().await;

    let results: Vec<_> = (0..12)
        .map(|i| search_result("Springfield", 40.0 + f64::from(i), -89.0))
        .collect();

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": results })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let cities = client.search_cities("Springfield").await.unwrap();
    assert_eq!(cities.len(), 8);
    assert_eq!(cities[0].location.latitude, 40.0);
}

#[tokio::test]
async fn test_search_without_results_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "generationtime_ms": 0.2 })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.search_cities("Nowhereville").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_weather_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "52.52"))
        .and(query_param("longitude", "13.41"))
        .and(query_param("timezone", "auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let weather = client.weather(52.52, 13.41).await.unwrap();

    assert_eq!(weather.timezone, "Europe/Berlin");
    assert_eq!(weather.elevation, Some(38.0));
    assert_eq!(weather.current.temperature_2m, Some(14.2));
    assert_eq!(weather.condition(), Some(WeatherCondition::SlightRain));
    assert_eq!(weather.condition().unwrap().description(), "Slight rain");
    assert_eq!(weather.hourly.time.len(), 2);
    assert_eq!(weather.daily.sunset, vec!["2026-10-18T18:12".to_string()]);
}

#[tokio::test]
async fn test_weather_http_failure_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.weather(1.0, 2.0).await.unwrap_err();

    assert!(
        matches!(err, GatewayError::Http { status: 500, .. }),
        "unexpected error: {err:?}"
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_weather_bad_shape_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "hourly": [] })),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.weather(1.0, 2.0).await.unwrap_err();
    assert!(matches!(err, GatewayError::Parse(_)), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_weather_timeout_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.weather(1.0, 2.0).await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_unreachable_host_is_offline() {
    let api = ApiConfig {
        forecast_url: "http://127.0.0.1:9/v1/forecast".to_string(),
        ..ApiConfig::default()
    };
    let client = WeatherClient::new(&api).unwrap();

    let err = client.weather(1.0, 2.0).await.unwrap_err();
    assert!(matches!(err, GatewayError::Offline), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_air_quality_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/air-quality"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current": { "time": "2026-10-18T12:00", "us_aqi": 42, "pm2_5": 8.1 },
            "hourly": { "time": ["2026-10-18T12:00"], "us_aqi": [42] }
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let air = client.air_quality(52.52, 13.41).await.unwrap();

    assert_eq!(air.current.us_aqi, Some(42.0));
    assert_eq!(air.hourly.us_aqi, vec![Some(42.0)]);
    assert_eq!(air.category(), Some(meteora_weather::AqiCategory::Good));
}

#[tokio::test]
async fn test_reverse_geocode_prefers_city() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .and(query_param("lat", "47.6062"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "display_name": "Seattle, King County, Washington, United States",
            "address": {
                "city": "Seattle",
                "county": "King County",
                "state": "Washington",
                "country": "United States"
            }
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let location = client.reverse_geocode(47.6062, -122.3321).await.unwrap();

    assert_eq!(location.name, "Seattle");
    assert_eq!(location.admin1.as_deref(), Some("Washington"));
    assert_eq!(location.country.as_deref(), Some("United States"));
    assert_eq!(location.latitude, 47.6062);
}

#[tokio::test]
async fn test_reverse_geocode_failure_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.reverse_geocode(0.0, 0.0).await.is_none());
}

#[tokio::test]
async fn test_weather_served_from_cache_when_network_drops() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, network_down) = cached_client(&mock_server).await;
    let online = client.weather(52.52, 13.41).await.unwrap();

    network_down.store(true, Ordering::SeqCst);
    let offline = client.weather(52.52, 13.41).await.unwrap();

    assert_eq!(offline, online);
    let cached = client
        .fetcher()
        .storage()
        .urls(&client.fetcher().names().data);
    assert_eq!(cached.len(), 1);
}

#[tokio::test]
async fn test_uncached_weather_offline_is_offline_error() {
    let mock_server = MockServer::start().await;
    let (client, network_down) = cached_client(&mock_server).await;
    network_down.store(true, Ordering::SeqCst);

    let err = client.weather(1.0, 2.0).await.unwrap_err();
    assert!(matches!(err, GatewayError::Offline), "unexpected error: {err:?}");
}
