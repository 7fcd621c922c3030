//! Periodic maintenance sweeps.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use courier_common::config::SweepConfig;
use tokio::time::interval;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval for dispatching due pending notifications.
    pub pending_interval: Duration,
    /// Interval for retrying failed notifications.
    pub retry_interval: Duration,
    /// Interval for cancelling expired notifications.
    pub expiry_interval: Duration,
    /// Interval for campaign promotion and completion.
    pub campaign_interval: Duration,
    /// Interval for retention cleanup.
    pub cleanup_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pending_interval: Duration::from_secs(60),
            retry_interval: Duration::from_secs(60),
            expiry_interval: Duration::from_secs(300),
            campaign_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(86400),
        }
    }
}

impl From<&SweepConfig> for SchedulerConfig {
    fn from(config: &SweepConfig) -> Self {
        Self {
            pending_interval: Duration::from_secs(config.pending_interval_secs),
            retry_interval: Duration::from_secs(config.retry_interval_secs),
            expiry_interval: Duration::from_secs(config.expiry_interval_secs),
            campaign_interval: Duration::from_secs(config.campaign_interval_secs),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
        }
    }
}

/// Executor trait for the periodic sweeps.
///
/// Every pass is idempotent; a pass that finds nothing to do returns 0.
#[async_trait::async_trait]
pub trait SweepExecutor: Send + Sync {
    /// Dispatch pending notifications that are due.
    async fn process_pending_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    /// Re-dispatch failed notifications whose cool-down elapsed.
    async fn retry_failed_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    /// Cancel pending notifications past their expiry.
    async fn cancel_expired_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    /// Delete terminal notifications past retention.
    async fn cleanup_old_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    /// Promote scheduled campaigns and complete finished ones.
    async fn process_scheduled_campaigns(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    /// Delete terminal campaigns past retention.
    async fn cleanup_old_campaigns(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;
}

/// Run the scheduler with the given configuration and executor.
///
/// Each sweep gets its own spawned interval loop; a failing pass is
/// logged and the loop keeps ticking.
pub async fn run_scheduler<E: SweepExecutor + 'static>(config: SchedulerConfig, executor: Arc<E>) {
    let executor_pending = executor.clone();
    let executor_retry = executor.clone();
    let executor_expiry = executor.clone();
    let executor_campaign = executor.clone();
    let executor_cleanup = executor;

    let pending_interval = config.pending_interval;
    let retry_interval = config.retry_interval;
    let expiry_interval = config.expiry_interval;
    let campaign_interval = config.campaign_interval;
    let cleanup_interval = config.cleanup_interval;

    // Spawn pending dispatch task
    tokio::spawn(async move {
        let mut interval = interval(pending_interval);
        loop {
            interval.tick().await;
            match executor_pending.process_pending_notifications().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Dispatched pending notifications");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to dispatch pending notifications");
                }
            }
        }
    });

    // Spawn retry task
    tokio::spawn(async move {
        let mut interval = interval(retry_interval);
        loop {
            interval.tick().await;
            match executor_retry.retry_failed_notifications().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Retried failed notifications");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to retry notifications");
                }
            }
        }
    });

    // Spawn expiry task
    tokio::spawn(async move {
        let mut interval = interval(expiry_interval);
        loop {
            interval.tick().await;
            match executor_expiry.cancel_expired_notifications().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Cancelled expired notifications");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to cancel expired notifications");
                }
            }
        }
    });

    // Spawn campaign promotion task
    tokio::spawn(async move {
        let mut interval = interval(campaign_interval);
        loop {
            interval.tick().await;
            match executor_campaign.process_scheduled_campaigns().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Processed scheduled campaigns");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to process scheduled campaigns");
                }
            }
        }
    });

    // Spawn cleanup task
    tokio::spawn(async move {
        let mut interval = interval(cleanup_interval);
        loop {
            interval.tick().await;
            match executor_cleanup.cleanup_old_notifications().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Cleaned up old notifications");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to cleanup old notifications");
                }
            }
            match executor_cleanup.cleanup_old_campaigns().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Cleaned up old campaigns");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to cleanup old campaigns");
                }
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.pending_interval, Duration::from_secs(60));
        assert_eq!(config.expiry_interval, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(86400));
    }

    #[test]
    fn test_scheduler_config_from_sweep_config() {
        let sweep = SweepConfig::default();
        let config = SchedulerConfig::from(&sweep);
        assert_eq!(config.pending_interval, Duration::from_secs(sweep.pending_interval_secs));
        assert_eq!(config.retry_interval, Duration::from_secs(sweep.retry_interval_secs));
    }

    #[derive(Default)]
    struct CountingExecutor {
        pending: AtomicU64,
    }

    #[async_trait::async_trait]
    impl SweepExecutor for CountingExecutor {
        async fn process_pending_notifications(
            &self,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            self.pending.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }

        async fn retry_failed_notifications(
            &self,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            Ok(0)
        }

        async fn cancel_expired_notifications(
            &self,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            Ok(0)
        }

        async fn cleanup_old_notifications(
            &self,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            Ok(0)
        }

        async fn process_scheduled_campaigns(
            &self,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            Ok(0)
        }

        async fn cleanup_old_campaigns(
            &self,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_scheduler_runs_pending_sweep() {
        let executor = Arc::new(CountingExecutor::default());
        let config = SchedulerConfig {
            pending_interval: Duration::from_millis(10),
            retry_interval: Duration::from_secs(3600),
            expiry_interval: Duration::from_secs(3600),
            campaign_interval: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(3600),
        };

        run_scheduler(config, executor.clone()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(executor.pending.load(Ordering::SeqCst) >= 1);
    }
}
