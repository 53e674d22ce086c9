//! Background rate-check system
//!
//! Periodically runs the rate tracker's eviction check on a tokio interval and
//! reports each outcome over a channel.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::rate::RateCheck;
use crate::service::AggregationService;

/// Messages sent from the background task
#[derive(Debug, Clone)]
pub enum CheckMessage {
    /// A rate check ran
    Checked(RateCheck),
    /// The task has stopped
    Stopped,
}

/// Configuration for the background check
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between checks
    pub interval: Duration,
    /// Whether the background check runs at all
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            enabled: false,
        }
    }
}

impl RefreshConfig {
    /// Builds a config from an interval in seconds, where 0 disables the check
    pub fn from_secs(secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(secs.max(1)),
            enabled: secs > 0,
        }
    }
}

/// Handle for controlling the background check task
pub struct RefreshHandle {
    /// Channel for receiving check outcomes
    pub receiver: mpsc::Receiver<CheckMessage>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Creates a new RefreshHandle and spawns the background check task
    ///
    /// The first check happens one full interval after spawning. Nothing is
    /// spawned when the config is disabled.
    pub fn spawn(service: Arc<AggregationService>, config: RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            let interval_duration = config.interval;
            tracing::info!(interval_secs = interval_duration.as_secs(), "Starting background rate check");

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(interval_duration);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let check = service.check_and_maybe_evict();
                            // Observers are optional; a full or closed channel is fine
                            let _ = msg_tx.try_send(CheckMessage::Checked(check));
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }

                let _ = msg_tx.send(CheckMessage::Stopped).await;
                tracing::info!("Background rate check stopped");
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Shuts down the background task and waits until it has stopped
    ///
    /// Returns immediately when no task was spawned.
    pub async fn shutdown(mut self) {
        if self.shutdown_tx.send(()).await.is_err() {
            return;
        }

        while let Some(message) = self.receiver.recv().await {
            if matches!(message, CheckMessage::Stopped) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{FakeSource, RecordingStore};
    use crate::aggregator::Aggregator;

    fn service(rate_limit: i64) -> Arc<AggregationService> {
        let aggregator = Aggregator::new(
            vec![FakeSource::ok("banana", &["RED"])],
            Arc::new(RecordingStore::default()),
        );
        Arc::new(AggregationService::new(aggregator, rate_limit))
    }

    #[test]
    fn test_refresh_config_default() {
        let config = RefreshConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(!config.enabled);
    }

    #[test]
    fn test_refresh_config_from_secs() {
        let config = RefreshConfig::from_secs(300);
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.enabled);

        let disabled = RefreshConfig::from_secs(0);
        assert!(!disabled.enabled);
    }

    #[tokio::test]
    async fn test_refresh_handle_spawn_disabled() {
        let mut handle = RefreshHandle::spawn(service(5), RefreshConfig::default());

        // With the check disabled, there should be no messages
        assert!(handle.receiver.try_recv().is_err());

        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("nothing to wait for");
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_check_evicts_on_interval() {
        let service = service(0);
        service.on_demand_aggregation().await.unwrap();
        assert!(service.is_cached());

        let config = RefreshConfig {
            interval: Duration::from_secs(30),
            enabled: true,
        };
        let mut handle = RefreshHandle::spawn(service.clone(), config);

        let message = handle.receiver.recv().await.expect("a check message");

        match message {
            CheckMessage::Checked(check) => assert!(check.evicted),
            other => panic!("expected a check, got {:?}", other),
        }
        assert!(!service.is_cached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let config = RefreshConfig {
            interval: Duration::from_secs(30),
            enabled: true,
        };
        let handle = RefreshHandle::spawn(service(5), config);

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("task stops before the next tick");
    }
}
