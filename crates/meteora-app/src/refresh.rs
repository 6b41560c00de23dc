//! Interval-driven auto refresh.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Periodic refresh timer. Ticks are skipped while the dashboard is hidden;
/// reconfiguring cancels the running timer and starts a new one.
#[derive(Debug)]
pub struct AutoRefresh {
    current: Mutex<Option<CancellationToken>>,
    visible: Arc<AtomicBool>,
    runtime: Option<Handle>,
}

impl AutoRefresh {
    /// Timers run on the current tokio runtime, if there is one.
    pub fn new() -> Self {
        Self::build(Handle::try_current().ok())
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        Self::build(Some(runtime))
    }

    fn build(runtime: Option<Handle>) -> Self {
        Self {
            current: Mutex::new(None),
            visible: Arc::new(AtomicBool::new(true)),
            runtime,
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Replace the running timer. `None` turns auto refresh off.
    pub fn configure<F, Fut>(&self, every: Option<Duration>, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            previous.cancel();
        }

        let Some(every) = every.filter(|d| !d.is_zero()) else {
            tracing::info!("Auto-refresh disabled");
            return;
        };
        let Some(runtime) = &self.runtime else {
            tracing::warn!("No async runtime, auto-refresh unavailable");
            return;
        };

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let visible = self.visible.clone();

        runtime.spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if visible.load(Ordering::SeqCst) {
                            tick().await;
                        } else {
                            tracing::debug!("Dashboard hidden, skipping auto-refresh");
                        }
                    }
                }
            }
        });

        tracing::info!("Auto-refresh enabled: every {:?}", every);
        *current = Some(token);
    }

    pub fn stop(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }
}

impl Default for AutoRefresh {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}
