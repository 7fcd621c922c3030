//! Queue integration tests.
//!
//! These tests verify the sweep scheduler drives an executor end to end.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use courier_queue::{SchedulerConfig, SweepExecutor, run_scheduler};

#[derive(Default)]
struct CountingExecutor {
    pending: AtomicU64,
    retry: AtomicU64,
    expiry: AtomicU64,
    cleanup: AtomicU64,
    campaigns: AtomicU64,
    campaign_cleanup: AtomicU64,
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
        self.retry.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn cancel_expired_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.expiry.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn cleanup_old_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.cleanup.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn process_scheduled_campaigns(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.campaigns.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn cleanup_old_campaigns(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.campaign_cleanup.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

/// A sweep that always fails. The scheduler must keep ticking anyway.
struct FailingExecutor {
    attempts: AtomicU64,
}

#[async_trait::async_trait]
impl SweepExecutor for FailingExecutor {
    async fn process_pending_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err("simulated sweep failure".into())
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

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        pending_interval: Duration::from_millis(10),
        retry_interval: Duration::from_millis(10),
        expiry_interval: Duration::from_millis(10),
        campaign_interval: Duration::from_millis(10),
        cleanup_interval: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_all_sweeps_run() {
    let executor = Arc::new(CountingExecutor::default());

    run_scheduler(fast_config(), Arc::clone(&executor)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(executor.pending.load(Ordering::SeqCst) >= 2);
    assert!(executor.retry.load(Ordering::SeqCst) >= 2);
    assert!(executor.expiry.load(Ordering::SeqCst) >= 2);
    assert!(executor.campaigns.load(Ordering::SeqCst) >= 2);
    // Cleanup loop drives both cleanup sweeps
    assert!(executor.cleanup.load(Ordering::SeqCst) >= 2);
    assert!(executor.campaign_cleanup.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_failing_sweep_keeps_ticking() {
    let executor = Arc::new(FailingExecutor {
        attempts: AtomicU64::new(0),
    });

    run_scheduler(fast_config(), Arc::clone(&executor)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The pass fails every time but the loop must not die
    assert!(executor.attempts.load(Ordering::SeqCst) >= 3);
}
