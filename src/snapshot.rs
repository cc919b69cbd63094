//! Point-in-time usage and quota view of the whole cluster
//!
//! A [`Snapshot`] is assembled once per refresh pass and never changes after
//! that. Readers share it through `Arc<Snapshot>`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Published in place of a zero `max_size_kb`, which the admin API uses for "no limit".
pub const UNBOUNDED_SIZE_KB: i64 = -1;

/// Usage of one bucket, from one bucket-stats fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketRecord {
    pub bucket: String,
    pub owner: String,
    pub num_objects: i64,
    pub size_kb_actual: i64,
    pub num_shards: i64,
}

/// Usage summed over all buckets of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub owner: String,
    pub num_objects: i64,
    pub size_kb_actual: i64,
}

/// Which quota endpoint a [`QuotaRecord`] came from.
///
/// `Bucket` is the owner's default per-bucket quota, queried through the user
/// endpoint with `quota-type=bucket`; it is not a per-bucket override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaKind {
    User,
    Bucket,
}

impl QuotaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::User => "user",
            QuotaKind::Bucket => "bucket",
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaRecord {
    pub owner: String,
    pub kind: QuotaKind,
    pub enabled: bool,
    pub max_size_kb: i64,
    pub max_objects: i64,
}

impl QuotaRecord {
    /// Replace the "unlimited" size sentinel (0) with [`UNBOUNDED_SIZE_KB`].
    ///
    /// Applied by the snapshot builder before anything is published; other
    /// values pass through untouched.
    pub fn normalized(mut self) -> Self {
        if self.max_size_kb == 0 {
            self.max_size_kb = UNBOUNDED_SIZE_KB;
        }
        self
    }
}

/// Everything one refresh pass produced.
///
/// Record sets are sorted by identifier so renders are stable across passes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub buckets: Vec<BucketRecord>,
    pub users: Vec<UserRecord>,
    pub user_quotas: Vec<QuotaRecord>,
    pub bucket_quotas: Vec<QuotaRecord>,
    pub completed_at: DateTime<Utc>,
}

impl Snapshot {
    /// Total number of records across the four sets.
    pub fn record_count(&self) -> usize {
        self.buckets.len() + self.users.len() + self.user_quotas.len() + self.bucket_quotas.len()
    }

    /// Time elapsed since the pass completed, clamped at zero.
    pub fn age(&self) -> chrono::Duration {
        (Utc::now() - self.completed_at).max(chrono::Duration::zero())
    }
}
