//! The offline cache manager.
//!
//! Owns the versioned cache partitions, moves through the install/activate
//! lifecycle, and answers intercepted requests with one of four strategies
//! chosen by [`RequestKind`].

use chrono::{DateTime, Utc};
use meteora_core::OfflineConfig;
use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use url::Url;

use crate::error::{FetchError, OfflineError};
use crate::fetch::{Fetch, Request, Response};
use crate::storage::{CacheNames, CacheStorage};

/// Background-sync tag that asks clients to reload their weather data
pub const WEATHER_SYNC_TAG: &str = "weather-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Constructed, install not started
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    /// Install failed; the manager never intercepts
    Redundant,
}

/// Caching strategy bucket for an intercepted GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    RemoteData,
    StaticAsset,
    Navigation,
    Other,
}

/// Broadcast to every client of the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// Cached data changed without a client asking for it
    DataChanged { urls: Vec<String> },
}

/// A static manifest entry. Relative entries match by path on the origin,
/// absolute ones by the full URL.
#[derive(Debug, Clone)]
struct StaticAsset {
    url: Url,
    relative: bool,
}

impl StaticAsset {
    fn matches(&self, url: &Url) -> bool {
        if self.relative {
            url.origin() == self.url.origin() && url.path() == self.url.path()
        } else {
            *url == self.url
        }
    }
}

pub struct OfflineCacheManager<F> {
    fetcher: F,
    storage: CacheStorage,
    names: CacheNames,
    shell: Url,
    static_assets: Vec<StaticAsset>,
    data_endpoints: Vec<String>,
    origin: Url,
    max_age: chrono::Duration,
    skip_waiting: bool,
    lifecycle: Mutex<Lifecycle>,
    /// Install and activate never overlap
    transition: tokio::sync::Mutex<()>,
    notifications: broadcast::Sender<Notification>,
}

impl<F> std::fmt::Debug for OfflineCacheManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCacheManager")
            .field("names", &self.names)
            .field("lifecycle", &*self.lifecycle.lock())
            .finish_non_exhaustive()
    }
}

impl<F: Fetch> OfflineCacheManager<F> {
    pub fn new(config: &OfflineConfig, fetcher: F, storage: CacheStorage) -> Result<Self, OfflineError> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| OfflineError::invalid_url(&config.origin, e))?;
        let resolve = |path: &str| origin.join(path).map_err(|e| OfflineError::invalid_url(path, e));

        let shell = resolve(config.app_shell.as_str())?;
        let static_assets = config
            .static_assets
            .iter()
            .map(|asset| {
                Ok::<_, OfflineError>(StaticAsset {
                    url: resolve(asset.as_str())?,
                    relative: Url::parse(asset).is_err(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (notifications, _) = broadcast::channel(16);

        Ok(Self {
            fetcher,
            storage,
            names: CacheNames::from_config(config),
            shell,
            static_assets,
            data_endpoints: config.data_endpoints.clone(),
            origin,
            max_age: chrono::Duration::hours(i64::from(config.data_max_age_hours)),
            skip_waiting: config.skip_waiting,
            lifecycle: Mutex::new(Lifecycle::Parsed),
            transition: tokio::sync::Mutex::new(()),
            notifications,
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    fn set_lifecycle(&self, next: Lifecycle) {
        let mut lifecycle = self.lifecycle.lock();
        tracing::debug!("Cache manager {:?} -> {:?}", *lifecycle, next);
        *lifecycle = next;
    }

    /// Populate the static partition with every manifest entry.
    ///
    /// Either every asset is stored or none is; a failure marks the manager
    /// redundant.
    pub async fn install(&self) -> Result<(), OfflineError> {
        let _transition = self.transition.lock().await;

        match self.lifecycle() {
            Lifecycle::Parsed | Lifecycle::Redundant => {}
            state => {
                tracing::debug!("Install skipped, already {:?}", state);
                return Ok(());
            }
        }

        self.set_lifecycle(Lifecycle::Installing);
        tracing::info!(
            "Installing offline cache {} ({} static assets)",
            self.names.static_assets,
            self.static_assets.len()
        );

        let mut entries = Vec::with_capacity(self.static_assets.len());
        for StaticAsset { url, .. } in &self.static_assets {
            match self.fetch_ok(url).await {
                Ok(response) => entries.push((url.to_string(), response)),
                Err(reason) => {
                    self.set_lifecycle(Lifecycle::Redundant);
                    tracing::error!("Failed to cache static asset {}: {}", url, reason);
                    return Err(OfflineError::Install {
                        url: url.to_string(),
                        reason,
                    });
                }
            }
        }

        self.storage.put_all(&self.names.static_assets, entries);
        self.set_lifecycle(Lifecycle::Installed);
        tracing::info!("Static assets cached");
        Ok(())
    }

    /// Drop every partition that is not current and start intercepting.
    pub async fn activate(&self) -> Result<(), OfflineError> {
        let _transition = self.transition.lock().await;

        match self.lifecycle() {
            Lifecycle::Installed => {}
            Lifecycle::Active => return Ok(()),
            _ => return Err(OfflineError::NotInstalled),
        }

        self.set_lifecycle(Lifecycle::Activating);
        tracing::info!("Activating offline cache {}", self.names.general);

        for name in self.storage.keys() {
            if !self.names.is_current(&name) {
                tracing::info!("Deleting old cache {}", name);
                self.storage.delete(&name);
            }
        }
        for name in self.names.all() {
            self.storage.open(name);
        }

        self.set_lifecycle(Lifecycle::Active);
        Ok(())
    }

    pub fn classify(&self, request: &Request) -> RequestKind {
        let href = request.url.as_str();
        if self.data_endpoints.iter().any(|prefix| href.starts_with(prefix)) {
            RequestKind::RemoteData
        } else if self.static_assets.iter().any(|asset| asset.matches(&request.url)) {
            RequestKind::StaticAsset
        } else if request.accepts("text/html") {
            RequestKind::Navigation
        } else {
            RequestKind::Other
        }
    }

    /// Answer an intercepted request.
    ///
    /// Non-GET requests, and every request before activation, go straight to
    /// the network.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if request.method != Method::GET || self.lifecycle() != Lifecycle::Active {
            return self.fetcher.fetch(request).await;
        }

        match self.classify(request) {
            RequestKind::RemoteData => Ok(self.network_first(request).await),
            RequestKind::StaticAsset => self.cache_first(request, &self.names.static_assets).await,
            RequestKind::Navigation => Ok(self.app_shell(request).await),
            RequestKind::Other => self.other_asset(request).await,
        }
    }

    async fn network_first(&self, request: &Request) -> Response {
        let key = request.url.as_str();

        match self.fetcher.fetch(request).await {
            Ok(response) if response.is_success() => {
                self.storage.put(&self.names.data, key, response.clone());
                response
            }
            Ok(response) => match self.storage.get(&self.names.data, key) {
                Some(cached) => {
                    tracing::debug!("HTTP {} for {}, serving cached data", response.status, key);
                    cached
                }
                None => response,
            },
            Err(e) => {
                tracing::debug!("Network failed for {} ({}), trying cache", key, e);
                self.storage
                    .get(&self.names.data, key)
                    .unwrap_or_else(Response::offline_data)
            }
        }
    }

    async fn cache_first(&self, request: &Request, partition: &str) -> Result<Response, FetchError> {
        let key = request.url.as_str();
        if let Some(cached) = self.storage.match_any(key) {
            tracing::debug!("Cache hit for {}", key);
            return Ok(cached);
        }

        let response = self.fetcher.fetch(request).await.map_err(|e| {
            tracing::warn!("Failed to fetch {}: {}", key, e);
            e
        })?;
        if response.is_success() {
            self.storage.put(partition, key, response.clone());
        }
        Ok(response)
    }

    async fn app_shell(&self, request: &Request) -> Response {
        if let Some(shell) = self.storage.match_any(self.shell.as_str()) {
            return shell;
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Shell unavailable for {} ({}), serving offline page", request.url, e);
                Response::offline_page()
            }
        }
    }

    async fn other_asset(&self, request: &Request) -> Result<Response, FetchError> {
        match self.cache_first(request, &self.names.general).await {
            Err(_) if is_font_like(request) => Ok(Response::empty()),
            result => result,
        }
    }

    /// Evict dynamic-data entries older than the retention window.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Entries without a parseable `date` header are kept.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut evicted = 0;
        for (url, response) in self.storage.entries(&self.names.data) {
            let Some(stored_at) = response
                .header("date")
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
            else {
                continue;
            };

            if now - stored_at.with_timezone(&Utc) > self.max_age
                && self.storage.remove(&self.names.data, &url)
            {
                tracing::debug!("Deleted old cache entry {}", url);
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::info!("Swept {} expired data entries", evicted);
        }
        evicted
    }

    /// Fetch `urls` into the dynamic-data partition.
    ///
    /// Nothing is stored unless every URL succeeds.
    pub async fn prefetch(&self, urls: &[String]) -> Result<usize, OfflineError> {
        let mut entries = Vec::with_capacity(urls.len());
        for raw in urls {
            let url = self
                .origin
                .join(raw)
                .map_err(|e| OfflineError::invalid_url(raw, e))?;
            let response = self.fetch_ok(&url).await.map_err(|reason| {
                tracing::warn!("Prefetch of {} failed: {}", url, reason);
                OfflineError::Prefetch {
                    url: url.to_string(),
                    reason,
                }
            })?;
            entries.push((url.to_string(), response));
        }

        let stored: Vec<String> = entries.iter().map(|(url, _)| url.clone()).collect();
        self.storage.put_all(&self.names.data, entries);
        tracing::info!("Prefetched {} URLs", stored.len());

        let count = stored.len();
        self.notify(Notification::DataChanged { urls: stored });
        Ok(count)
    }

    /// Handle a background-sync request; returns whether the tag was known.
    pub fn background_sync(&self, tag: &str) -> bool {
        if tag != WEATHER_SYNC_TAG {
            tracing::debug!("Ignoring background sync tag {}", tag);
            return false;
        }

        tracing::info!("Background sync triggered, notifying clients");
        self.notify(Notification::DataChanged { urls: Vec::new() });
        true
    }

    fn notify(&self, notification: Notification) {
        // No receivers is fine
        let _ = self.notifications.send(notification);
    }

    /// GET `url`, treating non-success statuses as failures
    async fn fetch_ok(&self, url: &Url) -> Result<Response, String> {
        match self.fetcher.fetch(&Request::get(url.clone())).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(format!("HTTP {}", response.status)),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Clients fetching through the manager get the interception strategies.
impl<F: Fetch> Fetch for OfflineCacheManager<F> {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.handle_fetch(request).await
    }
}

fn is_font_like(request: &Request) -> bool {
    request.url.as_str().contains("fonts") || request.accepts("font")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    struct Unreachable;

    impl Fetch for Unreachable {
        async fn fetch(&self, _request: &Request) -> Result<Response, FetchError> {
            Err(FetchError::Network("offline".into()))
        }
    }

    fn manager() -> OfflineCacheManager<Unreachable> {
        OfflineCacheManager::new(&OfflineConfig::default(), Unreachable, CacheStorage::new()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_classify() {
        let m = manager();

        let data = Request::get(url("https://api.open-meteo.com/v1/forecast?latitude=1"));
        assert_eq!(m.classify(&data), RequestKind::RemoteData);

        let css = Request::get(url("http://localhost:8080/styles.css"));
        assert_eq!(m.classify(&css), RequestKind::StaticAsset);

        // Relative manifest entries match by path, whatever the query
        let versioned = Request::get(url("http://localhost:8080/styles.css?v=2"));
        assert_eq!(m.classify(&versioned), RequestKind::StaticAsset);

        // Path matching is exact and bound to the origin
        let nested = Request::get(url("http://localhost:8080/assets/styles.css"));
        assert_eq!(m.classify(&nested), RequestKind::Other);
        let elsewhere = Request::get(url("http://cdn.example.com/styles.css"));
        assert_eq!(m.classify(&elsewhere), RequestKind::Other);
    }

    #[test]
    fn test_absolute_manifest_entry_matches_full_url() {
        let config = OfflineConfig {
            static_assets: vec!["https://cdn.example.com/chart.js?v=4".to_string()],
            ..OfflineConfig::default()
        };
        let m = OfflineCacheManager::new(&config, Unreachable, CacheStorage::new()).unwrap();

        let exact = Request::get(url("https://cdn.example.com/chart.js?v=4"));
        assert_eq!(m.classify(&exact), RequestKind::StaticAsset);
        let other_version = Request::get(url("https://cdn.example.com/chart.js?v=5"));
        assert_eq!(m.classify(&other_version), RequestKind::Other);

        let page = Request::navigate(url("http://localhost:8080/city/berlin"));
        assert_eq!(m.classify(&page), RequestKind::Navigation);
    }

    #[test]
    fn test_font_detection() {
        assert!(is_font_like(&Request::get(url("https://fonts.gstatic.com/s/inter.woff2"))));
        assert!(is_font_like(
            &Request::get(url("http://localhost:8080/a.woff2")).with_header("accept", "font/woff2")
        ));
        assert!(!is_font_like(&Request::get(url("http://localhost:8080/logo.png"))));
    }

    #[test]
    fn test_notification_wire_format() {
        let json = serde_json::to_value(Notification::DataChanged { urls: vec![] }).unwrap();
        assert_eq!(json["type"], "data-changed");
    }

    #[test]
    fn test_unknown_sync_tag_ignored() {
        let m = manager();
        let mut rx = m.subscribe();
        assert!(!m.background_sync("other"));
        assert!(rx.try_recv().is_err());

        assert!(m.background_sync(WEATHER_SYNC_TAG));
        assert_eq!(rx.try_recv().unwrap(), Notification::DataChanged { urls: vec![] });
    }

    #[tokio::test]
    async fn test_install_failure_is_redundant() {
        let m = manager();
        let err = m.install().await.unwrap_err();

        assert!(matches!(err, OfflineError::Install { .. }));
        assert_eq!(m.lifecycle(), Lifecycle::Redundant);
        assert!(m.storage().urls(&m.names().static_assets).is_empty());
        assert!(matches!(m.activate().await, Err(OfflineError::NotInstalled)));
    }

    #[tokio::test]
    async fn test_passthrough_before_activation() {
        let m = manager();
        let request = Request::get(url("https://api.open-meteo.com/v1/forecast"));
        // Not active: no synthesized 503, the network error surfaces
        assert!(m.handle_fetch(&request).await.is_err());
    }
}
