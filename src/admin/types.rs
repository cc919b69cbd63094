//! Wire documents returned by the RGW admin API
//!
//! Only the fields the exporter publishes are modelled; everything else in
//! the responses is ignored.

use serde::Deserialize;

use crate::snapshot::{BucketRecord, QuotaKind, QuotaRecord, UserRecord};

/// `GET /admin/bucket` and `GET /admin/metadata/user` both return a bare list of ids.
pub type IdList = Vec<String>;

/// `GET /admin/bucket?bucket=<id>`
#[derive(Debug, Clone, Deserialize)]
pub struct BucketStatsDocument {
    pub owner: String,
    #[serde(default)]
    pub num_shards: i64,
    /// Absent or `{}` for buckets that never held an object
    #[serde(default)]
    pub usage: BucketUsage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketUsage {
    #[serde(rename = "rgw.main", default)]
    pub main: UsageCounters,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub size_kb: i64,
    #[serde(default)]
    pub size_kb_actual: i64,
    #[serde(default)]
    pub num_objects: i64,
}

/// `GET /admin/user?stats=true&uid=<id>`
#[derive(Debug, Clone, Deserialize)]
pub struct UserStatsDocument {
    pub stats: UsageCounters,
}

/// `GET /admin/user?quota&quota-type=<kind>&uid=<id>`
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaDocument {
    pub enabled: bool,
    pub max_size_kb: i64,
    pub max_objects: i64,
}

impl BucketStatsDocument {
    /// The record is keyed by the listed id, not the document's own `bucket` field.
    pub fn into_record(self, bucket: &str) -> BucketRecord {
        BucketRecord {
            bucket: bucket.to_string(),
            owner: self.owner,
            num_objects: self.usage.main.num_objects,
            size_kb_actual: self.usage.main.size_kb_actual,
            num_shards: self.num_shards,
        }
    }
}

impl UserStatsDocument {
    pub fn into_record(self, uid: &str) -> UserRecord {
        UserRecord {
            owner: uid.to_string(),
            num_objects: self.stats.num_objects,
            size_kb_actual: self.stats.size_kb_actual,
        }
    }
}

impl QuotaDocument {
    pub fn into_record(self, uid: &str, kind: QuotaKind) -> QuotaRecord {
        QuotaRecord {
            owner: uid.to_string(),
            kind,
            enabled: self.enabled,
            max_size_kb: self.max_size_kb,
            max_objects: self.max_objects,
        }
    }
}
