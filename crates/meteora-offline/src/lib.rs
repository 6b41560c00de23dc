//! Offline cache manager for Meteora
//!
//! Serves the dashboard's requests from versioned cache partitions when the
//! network is slow or gone: network-first for remote data, cache-first for
//! static assets, a cached shell for navigations.

pub mod error;
pub mod fetch;
pub mod manager;
pub mod storage;
pub mod worker;

pub use error::{FetchError, OfflineError};
pub use fetch::{Fetch, HttpFetcher, Request, Response};
pub use manager::{Lifecycle, Notification, OfflineCacheManager, RequestKind, WEATHER_SYNC_TAG};
pub use storage::{CacheNames, CacheStorage};
pub use worker::{CacheWorker, ControlMessage};
