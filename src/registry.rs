use arc_swap::ArcSwapOption;
use std::sync::Arc;

use crate::snapshot::Snapshot;

/// Holds the snapshot served to scrapers.
///
/// Publishing swaps a single pointer, so a reader sees either the previous
/// snapshot or the new one, never a cleared or half-filled registry. A reader
/// that already holds an `Arc<Snapshot>` keeps it alive and unchanged for as
/// long as it needs, regardless of later publishes.
///
/// There is one writer (the refresh scheduler) and any number of readers.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    current: ArcSwapOption<Snapshot>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `snapshot` the one returned by [`current`](Self::current).
    ///
    /// Returns the published `Arc` so the caller can log or render it without
    /// another load.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// The snapshot valid at call time, or `None` before the first publish.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// True once at least one snapshot has been published.
    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{BucketRecord, QuotaKind, QuotaRecord, UserRecord};
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Snapshot in which every numeric field equals `pass`, so a reader can
    /// tell whether anything it sees came from a different pass.
    fn snapshot_of_pass(pass: i64, entities: usize) -> Snapshot {
        let buckets = (0..entities)
            .map(|i| BucketRecord {
                bucket: format!("b{i}"),
                owner: format!("u{i}"),
                num_objects: pass,
                size_kb_actual: pass,
                num_shards: pass,
            })
            .collect();
        let users = (0..entities)
            .map(|i| UserRecord {
                owner: format!("u{i}"),
                num_objects: pass,
                size_kb_actual: pass,
            })
            .collect();
        let quotas = |kind: QuotaKind| {
            (0..entities)
                .map(|i| QuotaRecord {
                    owner: format!("u{i}"),
                    kind,
                    enabled: true,
                    max_size_kb: pass,
                    max_objects: pass,
                })
                .collect::<Vec<_>>()
        };
        Snapshot {
            buckets,
            users,
            user_quotas: quotas(QuotaKind::User),
            bucket_quotas: quotas(QuotaKind::Bucket),
            completed_at: Utc::now(),
        }
    }

    /// Returns the pass number if every value agrees, panics otherwise.
    fn assert_single_pass(snapshot: &Snapshot, entities: usize) -> i64 {
        let pass = snapshot.buckets[0].num_objects;
        assert_eq!(snapshot.buckets.len(), entities);
        assert_eq!(snapshot.users.len(), entities);
        assert_eq!(snapshot.user_quotas.len(), entities);
        assert_eq!(snapshot.bucket_quotas.len(), entities);
        assert!(snapshot.buckets.iter().all(|b| b.num_objects == pass && b.num_shards == pass));
        assert!(snapshot.users.iter().all(|u| u.num_objects == pass));
        assert!(snapshot.user_quotas.iter().all(|q| q.max_objects == pass));
        assert!(snapshot.bucket_quotas.iter().all(|q| q.max_size_kb == pass));
        pass
    }

    #[test]
    fn test_empty_before_first_publish() {
        let registry = MetricRegistry::new();
        assert!(registry.current().is_none());
        assert!(!registry.is_ready());
    }

    #[test]
    fn test_publish_replaces_current() {
        let registry = MetricRegistry::new();
        registry.publish(snapshot_of_pass(1, 2));
        registry.publish(snapshot_of_pass(2, 3));

        let current = registry.current().unwrap();
        assert!(registry.is_ready());
        assert_eq!(assert_single_pass(&current, 3), 2);
    }

    #[test]
    fn test_held_snapshot_survives_publish() {
        let registry = MetricRegistry::new();
        registry.publish(snapshot_of_pass(1, 2));

        let held = registry.current().unwrap();
        registry.publish(snapshot_of_pass(2, 5));

        assert_eq!(assert_single_pass(&held, 2), 1);
        assert_eq!(assert_single_pass(&registry.current().unwrap(), 5), 2);
    }

    #[test]
    fn test_publish_returns_the_stored_snapshot() {
        let registry = MetricRegistry::new();
        let published = registry.publish(snapshot_of_pass(7, 1));
        assert!(Arc::ptr_eq(&published, &registry.current().unwrap()));
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_passes() {
        const ENTITIES: usize = 50;
        let registry = Arc::new(MetricRegistry::new());
        registry.publish(snapshot_of_pass(0, ENTITIES));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut last_seen = 0;
                    while !done.load(Ordering::Relaxed) {
                        let snapshot = registry.current().unwrap();
                        let pass = assert_single_pass(&snapshot, ENTITIES);
                        // Single writer: visible state only moves forward
                        assert!(pass >= last_seen, "went back from {last_seen} to {pass}");
                        last_seen = pass;
                    }
                })
            })
            .collect();

        for pass in 1..=200 {
            registry.publish(snapshot_of_pass(pass, ENTITIES));
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(assert_single_pass(&registry.current().unwrap(), ENTITIES), 200);
    }
}
