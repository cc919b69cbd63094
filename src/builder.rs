//! One refresh pass: enumerate, fan out, assemble
//!
//! The builder never touches the registry. It hands back a finished
//! [`Snapshot`] (plus the per-entity failures it skipped) or an enumeration
//! error, and the scheduler decides what to publish.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::admin::AdminApi;
use crate::error::{EntityFetchError, RefreshError, UpstreamError};
use crate::snapshot::{BucketRecord, QuotaRecord, Snapshot, UserRecord};

/// One per-entity fetch within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchTarget {
    BucketStats(String),
    UserStats(String),
    UserQuota(String),
    BucketQuota(String),
}

impl FetchTarget {
    /// Resource label for logs and the fetch error counter.
    pub fn resource(&self) -> &'static str {
        match self {
            FetchTarget::BucketStats(_) => "bucket_stats",
            FetchTarget::UserStats(_) => "user_stats",
            FetchTarget::UserQuota(_) => "user_quota",
            FetchTarget::BucketQuota(_) => "bucket_quota",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            FetchTarget::BucketStats(id)
            | FetchTarget::UserStats(id)
            | FetchTarget::UserQuota(id)
            | FetchTarget::BucketQuota(id) => id,
        }
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchTarget::BucketStats(id) => write!(f, "stats of bucket '{}'", id),
            FetchTarget::UserStats(id) => write!(f, "stats of user '{}'", id),
            FetchTarget::UserQuota(id) => write!(f, "user quota of '{}'", id),
            FetchTarget::BucketQuota(id) => write!(f, "bucket quota of '{}'", id),
        }
    }
}

enum Fetched {
    Bucket(BucketRecord),
    User(UserRecord),
    UserQuota(QuotaRecord),
    BucketQuota(QuotaRecord),
}

/// Result of a pass that got past enumeration.
#[derive(Debug)]
pub struct BuildOutcome {
    pub snapshot: Snapshot,
    /// Fetches whose entity was left out of the snapshot
    pub failures: Vec<EntityFetchError>,
    pub elapsed: Duration,
}

/// Assembles complete snapshots from the admin API.
pub struct SnapshotBuilder {
    api: Arc<dyn AdminApi>,
    concurrency: usize,
    fetch_timeout: Duration,
}

impl SnapshotBuilder {
    /// `concurrency` bounds the number of in-flight per-entity fetches and is
    /// clamped to at least one.
    pub fn new(api: Arc<dyn AdminApi>, concurrency: usize, fetch_timeout: Duration) -> Self {
        Self {
            api,
            concurrency: concurrency.max(1),
            fetch_timeout,
        }
    }

    /// Run one full pass.
    ///
    /// Fails only when a listing call fails. Any other fetch error drops that
    /// one record and is reported in [`BuildOutcome::failures`].
    pub async fn build(&self) -> Result<BuildOutcome, RefreshError> {
        let started = Instant::now();

        let (users, buckets) = tokio::try_join!(
            async {
                self.bounded(self.api.list_users())
                    .await
                    .map_err(|source| RefreshError::Enumeration {
                        resource: "users",
                        source,
                    })
            },
            async {
                self.bounded(self.api.list_buckets())
                    .await
                    .map_err(|source| RefreshError::Enumeration {
                        resource: "buckets",
                        source,
                    })
            },
        )?;
        let users = dedup(users);
        let buckets = dedup(buckets);

        tracing::debug!(
            users = users.len(),
            buckets = buckets.len(),
            concurrency = self.concurrency,
            "Enumerated entities, fetching stats and quotas"
        );

        let targets: Vec<FetchTarget> = buckets
            .iter()
            .map(|bucket| FetchTarget::BucketStats(bucket.clone()))
            .chain(users.iter().flat_map(|uid| {
                [
                    FetchTarget::UserStats(uid.clone()),
                    FetchTarget::UserQuota(uid.clone()),
                    FetchTarget::BucketQuota(uid.clone()),
                ]
            }))
            .collect();

        let results: Vec<(FetchTarget, Result<Fetched, UpstreamError>)> = stream::iter(targets)
            .map(|target| async move {
                let result = self.fetch(&target).await;
                (target, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut bucket_records = Vec::with_capacity(buckets.len());
        let mut user_records = Vec::with_capacity(users.len());
        let mut user_quotas = Vec::with_capacity(users.len());
        let mut bucket_quotas = Vec::with_capacity(users.len());
        let mut failures = Vec::new();

        for (target, result) in results {
            match result {
                Ok(Fetched::Bucket(record)) => bucket_records.push(record),
                Ok(Fetched::User(record)) => user_records.push(record),
                Ok(Fetched::UserQuota(record)) => user_quotas.push(record.normalized()),
                Ok(Fetched::BucketQuota(record)) => bucket_quotas.push(record.normalized()),
                Err(source) => {
                    tracing::warn!(
                        resource = target.resource(),
                        id = %target.id(),
                        kind = source.kind(),
                        error = %source,
                        "Fetch failed, leaving entity out of this snapshot"
                    );
                    failures.push(EntityFetchError { target, source });
                }
            }
        }

        bucket_records.sort_by(|a, b| a.bucket.cmp(&b.bucket));
        user_records.sort_by(|a, b| a.owner.cmp(&b.owner));
        user_quotas.sort_by(|a, b| a.owner.cmp(&b.owner));
        bucket_quotas.sort_by(|a, b| a.owner.cmp(&b.owner));

        let snapshot = Snapshot {
            buckets: bucket_records,
            users: user_records,
            user_quotas,
            bucket_quotas,
            completed_at: Utc::now(),
        };

        Ok(BuildOutcome {
            snapshot,
            failures,
            elapsed: started.elapsed(),
        })
    }

    async fn fetch(&self, target: &FetchTarget) -> Result<Fetched, UpstreamError> {
        let api = self.api.as_ref();
        match target {
            FetchTarget::BucketStats(id) => self.bounded(api.bucket_stats(id)).await.map(Fetched::Bucket),
            FetchTarget::UserStats(id) => self.bounded(api.user_stats(id)).await.map(Fetched::User),
            FetchTarget::UserQuota(id) => self.bounded(api.user_quota(id)).await.map(Fetched::UserQuota),
            FetchTarget::BucketQuota(id) => {
                self.bounded(api.bucket_quota(id)).await.map(Fetched::BucketQuota)
            }
        }
    }

    /// Fail the fetch if it outlives the per-request timeout.
    async fn bounded<T>(
        &self,
        fetch: impl Future<Output = Result<T, UpstreamError>>,
    ) -> Result<T, UpstreamError> {
        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.fetch_timeout)),
        }
    }
}

fn dedup(mut ids: Vec<String>) -> Vec<String> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
