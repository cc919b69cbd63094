use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::builder::SnapshotBuilder;
use crate::error::RefreshError;
use crate::metrics;
use crate::registry::MetricRegistry;
use crate::snapshot::Snapshot;

/// Drives the snapshot builder forever and publishes each completed pass.
///
/// The pause is measured from the end of a pass, so a slow admin API never
/// causes passes to overlap.
pub struct RefreshScheduler {
    builder: SnapshotBuilder,
    registry: Arc<MetricRegistry>,
    interval: Duration,
    jitter: Duration,
}

impl RefreshScheduler {
    pub fn new(builder: SnapshotBuilder, registry: Arc<MetricRegistry>, interval: Duration) -> Self {
        Self {
            builder,
            registry,
            interval,
            jitter: Duration::ZERO,
        }
    }

    /// Add a uniform random delay in `[0, jitter]` to every pause.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Run one pass and publish it.
    ///
    /// On enumeration failure nothing is published and the previously
    /// published snapshot stays current.
    pub async fn run_once(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let outcome = match self.builder.build().await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_refresh_failure();
                tracing::error!(
                    error = %e,
                    "Refresh pass aborted, keeping previous snapshot"
                );
                return Err(e);
            }
        };

        for failure in &outcome.failures {
            metrics::record_entity_fetch_error(failure.target.resource());
        }
        metrics::record_refresh_success(outcome.elapsed);

        let snapshot = self.registry.publish(outcome.snapshot);
        tracing::info!(
            buckets = snapshot.buckets.len(),
            users = snapshot.users.len(),
            user_quotas = snapshot.user_quotas.len(),
            bucket_quotas = snapshot.bucket_quotas.len(),
            records = snapshot.record_count(),
            skipped = outcome.failures.len(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Published snapshot"
        );

        Ok(snapshot)
    }

    /// Start the background loop. The first pass runs immediately.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                jitter_secs = self.jitter.as_secs(),
                "Refresh scheduler started"
            );

            loop {
                // Errors are logged and counted in run_once; retry on the next tick
                let _ = self.run_once().await;
                tokio::time::sleep(self.next_delay()).await;
            }
        })
    }

    fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let extra_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.interval + Duration::from_millis(extra_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::FakeAdmin;
    use crate::builder::FetchTarget;

    fn scheduler(admin: FakeAdmin, registry: Arc<MetricRegistry>, interval: Duration) -> RefreshScheduler {
        let builder = SnapshotBuilder::new(Arc::new(admin), 4, Duration::from_secs(1));
        RefreshScheduler::new(builder, registry, interval)
    }

    #[tokio::test]
    async fn test_run_once_publishes() {
        let registry = Arc::new(MetricRegistry::new());
        let scheduler = scheduler(
            FakeAdmin::new(&["alice", "bob"], &["b1", "b2"]),
            Arc::clone(&registry),
            Duration::from_secs(60),
        );

        let published = scheduler.run_once().await.unwrap();

        assert_eq!(published.buckets.len(), 2);
        assert_eq!(published.users.len(), 2);
        assert!(Arc::ptr_eq(&published, &registry.current().unwrap()));
    }

    #[tokio::test]
    async fn test_partial_pass_is_still_published() {
        let registry = Arc::new(MetricRegistry::new());
        let mut admin = FakeAdmin::new(&["alice"], &["b1", "b2"]);
        admin.failing.insert(FetchTarget::BucketStats("b2".to_string()));

        let published = scheduler(admin, Arc::clone(&registry), Duration::from_secs(60))
            .run_once()
            .await
            .unwrap();

        assert_eq!(published.buckets.len(), 1);
        assert_eq!(published.buckets[0].bucket, "b1");
    }

    #[tokio::test]
    async fn test_enumeration_failure_keeps_previous_snapshot() {
        let registry = Arc::new(MetricRegistry::new());

        let mut first = FakeAdmin::new(&["alice"], &["b1"]);
        first.seed = 1;
        let good = scheduler(first, Arc::clone(&registry), Duration::from_secs(60))
            .run_once()
            .await
            .unwrap();

        let mut broken = FakeAdmin::new(&["alice"], &["b1", "b2"]);
        broken.fail_bucket_listing = true;
        let result = scheduler(broken, Arc::clone(&registry), Duration::from_secs(60))
            .run_once()
            .await;

        assert!(matches!(result, Err(RefreshError::Enumeration { resource: "buckets", .. })));
        assert!(Arc::ptr_eq(&good, &registry.current().unwrap()));
    }

    #[tokio::test]
    async fn test_failure_before_first_publish_leaves_registry_empty() {
        let registry = Arc::new(MetricRegistry::new());
        let mut admin = FakeAdmin::new(&["alice"], &["b1"]);
        admin.fail_user_listing = true;

        let result = scheduler(admin, Arc::clone(&registry), Duration::from_secs(60))
            .run_once()
            .await;

        assert!(result.is_err());
        assert!(!registry.is_ready());
    }

    #[tokio::test]
    async fn test_spawned_loop_publishes_and_keeps_running() {
        let registry = Arc::new(MetricRegistry::new());
        let handle = scheduler(
            FakeAdmin::new(&["alice"], &["b1"]),
            Arc::clone(&registry),
            Duration::from_millis(10),
        )
        .spawn();

        let first = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(snapshot) = registry.current() {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // A later pass replaces the first one
        tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::ptr_eq(&first, &registry.current().unwrap()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(!handle.is_finished());
        handle.abort();
    }

    #[test]
    fn test_next_delay_stays_within_jitter() {
        let builder = SnapshotBuilder::new(
            Arc::new(FakeAdmin::new(&[], &[])),
            1,
            Duration::from_secs(1),
        );
        let scheduler = RefreshScheduler::new(builder, Arc::new(MetricRegistry::new()), Duration::from_secs(60));
        assert_eq!(scheduler.next_delay(), Duration::from_secs(60));

        let scheduler = scheduler.with_jitter(Duration::from_secs(5));
        for _ in 0..100 {
            let delay = scheduler.next_delay();
            assert!(delay >= Duration::from_secs(60));
            assert!(delay <= Duration::from_secs(65));
        }
    }
}
