//! Background task driving a cache manager: install/activate on start, an
//! inbox for control messages, and the periodic expired-entry sweep.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::OfflineError;
use crate::fetch::Fetch;
use crate::manager::OfflineCacheManager;

/// Message posted to the manager by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    /// Skip waiting and activate now
    ActivateNow,
    /// Fetch these URLs into the data partition
    Prefetch { urls: Vec<String> },
}

impl ControlMessage {
    pub fn parse(json: &str) -> Result<Self, OfflineError> {
        serde_json::from_str(json).map_err(OfflineError::InvalidMessage)
    }
}

enum Command {
    Control(ControlMessage, Option<oneshot::Sender<Result<(), OfflineError>>>),
    Sync(String),
}

/// Handle to a running cache worker.
#[derive(Debug)]
pub struct CacheWorker<F> {
    manager: Arc<OfflineCacheManager<F>>,
    inbox: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<F: Fetch + 'static> CacheWorker<F> {
    /// Start the worker; it installs (and, with skip-waiting, activates)
    /// before reading its inbox.
    pub fn spawn(manager: Arc<OfflineCacheManager<F>>, sweep_every: Duration) -> Self {
        let (inbox, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(manager.clone(), rx, cancel.clone(), sweep_every));

        Self {
            manager,
            inbox,
            cancel,
            task,
        }
    }

    pub fn manager(&self) -> &Arc<OfflineCacheManager<F>> {
        &self.manager
    }

    /// Queue a control message without waiting for it to be handled
    pub async fn post(&self, message: ControlMessage) -> Result<(), OfflineError> {
        self.inbox
            .send(Command::Control(message, None))
            .await
            .map_err(|_| OfflineError::WorkerStopped)
    }

    /// Parse and queue a JSON control message
    pub async fn post_json(&self, json: &str) -> Result<(), OfflineError> {
        self.post(ControlMessage::parse(json)?).await
    }

    /// Send a control message and wait for its outcome
    pub async fn request(&self, message: ControlMessage) -> Result<(), OfflineError> {
        let (tx, rx) = oneshot::channel();
        self.inbox
            .send(Command::Control(message, Some(tx)))
            .await
            .map_err(|_| OfflineError::WorkerStopped)?;
        rx.await.map_err(|_| OfflineError::WorkerStopped)?
    }

    pub async fn sync(&self, tag: impl Into<String>) -> Result<(), OfflineError> {
        self.inbox
            .send(Command::Sync(tag.into()))
            .await
            .map_err(|_| OfflineError::WorkerStopped)
    }

    /// Stop the worker and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Cache worker ended abnormally: {}", e);
        }
    }
}

async fn run<F: Fetch + 'static>(
    manager: Arc<OfflineCacheManager<F>>,
    mut inbox: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    sweep_every: Duration,
) {
    match manager.install().await {
        Ok(()) if manager.skip_waiting() => {
            if let Err(e) = manager.activate().await {
                tracing::warn!("Activation after install failed: {}", e);
            }
        }
        Ok(()) => tracing::info!("Cache manager installed, waiting for activate-now"),
        Err(e) => tracing::warn!("Cache manager install failed: {}", e),
    }

    let mut sweep = tokio::time::interval(sweep_every);
    // The first tick completes immediately
    sweep.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Cache worker cancelled");
                break;
            }
            _ = sweep.tick() => {
                manager.sweep_expired();
            }
            command = inbox.recv() => {
                let Some(command) = command else {
                    tracing::debug!("Cache worker inbox closed");
                    break;
                };
                handle(&manager, command).await;
            }
        }
    }
}

async fn handle<F: Fetch>(manager: &OfflineCacheManager<F>, command: Command) {
    match command {
        Command::Control(message, reply) => {
            tracing::debug!("Control message received: {:?}", message);
            let result = match message {
                ControlMessage::ActivateNow => manager.activate().await,
                ControlMessage::Prefetch { urls } => manager.prefetch(&urls).await.map(|_| ()),
            };

            match reply {
                Some(reply) => {
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(e) = result {
                        tracing::warn!("Control message failed: {}", e);
                    }
                }
            }
        }
        Command::Sync(tag) => {
            manager.background_sync(&tag);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_control_messages() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"activate-now"}"#).unwrap(),
            ControlMessage::ActivateNow
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"prefetch","urls":["/a","/b"]}"#).unwrap(),
            ControlMessage::Prefetch {
                urls: vec!["/a".into(), "/b".into()]
            }
        );
    }

    #[test]
    fn test_unknown_message_rejected() {
        let err = ControlMessage::parse(r#"{"type":"self-destruct"}"#).unwrap_err();
        assert!(matches!(err, OfflineError::InvalidMessage(_)));
    }
}
