//! Prometheus text exposition of a [`Snapshot`]
//!
//! Metric names and help strings are a compatibility contract with existing
//! dashboards and must not change.

use std::fmt::{Display, Write};

use crate::snapshot::Snapshot;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub const BUCKET_NUM_OBJECTS: &str = "cephrgw_bucket_num_objects";
pub const BUCKET_SIZE_KB: &str = "cephrgw_bucket_size_kb";
pub const BUCKET_NUM_SHARDS: &str = "cephrgw_bucket_num_shards";
pub const USER_NUM_OBJECTS: &str = "cephrgw_user_num_objects";
pub const USER_SIZE_KB: &str = "cephrgw_user_size_kb";
pub const QUOTA_USER_ENABLED: &str = "cephrgw_quota_user_enabled";
pub const QUOTA_USER_MAX_SIZE_KB: &str = "cephrgw_quota_user_max_size_kb";
pub const QUOTA_USER_MAX_OBJECTS: &str = "cephrgw_quota_user_max_objects";
pub const QUOTA_BUCKET_ENABLED: &str = "cephrgw_quota_bucket_enabled";
pub const QUOTA_BUCKET_MAX_SIZE_KB: &str = "cephrgw_quota_bucket_max_size_kb";
pub const QUOTA_BUCKET_MAX_OBJECTS: &str = "cephrgw_quota_bucket_max_objects";
pub const SNAPSHOT_TIMESTAMP: &str = "cephrgw_exporter_snapshot_timestamp_seconds";

/// One gauge family being rendered.
struct Family {
    name: &'static str,
    help: &'static str,
    samples: String,
}

impl Family {
    fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            samples: String::new(),
        }
    }

    fn sample(&mut self, labels: &[(&str, &str)], value: impl Display) {
        self.samples.push_str(self.name);
        if !labels.is_empty() {
            self.samples.push('{');
            for (i, (key, val)) in labels.iter().enumerate() {
                if i > 0 {
                    self.samples.push(',');
                }
                self.samples.push_str(key);
                self.samples.push_str("=\"");
                escape_label_value(&mut self.samples, val);
                self.samples.push('"');
            }
            self.samples.push('}');
        }
        // Writing to a String cannot fail
        let _ = writeln!(self.samples, " {}", value);
    }

    /// Append HELP, TYPE and samples. Families without samples are skipped.
    fn write_to(&self, out: &mut String) {
        if self.samples.is_empty() {
            return;
        }
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} gauge", self.name);
        out.push_str(&self.samples);
    }
}

fn escape_label_value(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
}

fn flag(enabled: bool) -> u8 {
    if enabled {
        1
    } else {
        0
    }
}

/// Render every record of `snapshot`.
///
/// Each record set is walked exactly once; all samples in the output come
/// from the same snapshot.
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    render_into(&mut out, snapshot);
    out
}

pub fn render_into(out: &mut String, snapshot: &Snapshot) {
    let mut bucket_objects = Family::new(BUCKET_NUM_OBJECTS, "Ceph radosgw bucket num objects from admin api");
    let mut bucket_size = Family::new(BUCKET_SIZE_KB, "Ceph radosgw bucket size kb from admin api");
    let mut bucket_shards = Family::new(BUCKET_NUM_SHARDS, "Ceph radosgw bucket num shards from admin api");
    for bucket in &snapshot.buckets {
        let labels = [("bucket", bucket.bucket.as_str()), ("owner", bucket.owner.as_str())];
        bucket_objects.sample(&labels, bucket.num_objects);
        bucket_size.sample(&labels, bucket.size_kb_actual);
        bucket_shards.sample(&labels, bucket.num_shards);
    }

    let mut user_objects = Family::new(USER_NUM_OBJECTS, "Ceph radosgw user num objects from admin api");
    let mut user_size = Family::new(USER_SIZE_KB, "Ceph radosgw user size kb from admin api");
    for user in &snapshot.users {
        let labels = [("owner", user.owner.as_str())];
        user_objects.sample(&labels, user.num_objects);
        user_size.sample(&labels, user.size_kb_actual);
    }

    let mut user_quota_enabled = Family::new(QUOTA_USER_ENABLED, "Ceph radosgw user quota enabled from admin api");
    let mut user_quota_size = Family::new(QUOTA_USER_MAX_SIZE_KB, "Ceph radosgw user quota max size kb from admin api");
    let mut user_quota_objects = Family::new(QUOTA_USER_MAX_OBJECTS, "Ceph radosgw user quota max objects from admin api");
    for quota in &snapshot.user_quotas {
        let labels = [("owner", quota.owner.as_str())];
        user_quota_enabled.sample(&labels, flag(quota.enabled));
        user_quota_size.sample(&labels, quota.max_size_kb);
        user_quota_objects.sample(&labels, quota.max_objects);
    }

    let mut bucket_quota_enabled = Family::new(QUOTA_BUCKET_ENABLED, "Ceph radosgw bucket quota enabled from admin api");
    let mut bucket_quota_size = Family::new(QUOTA_BUCKET_MAX_SIZE_KB, "Ceph radosgw bucket quota max size kb from admin api");
    let mut bucket_quota_objects = Family::new(QUOTA_BUCKET_MAX_OBJECTS, "Ceph radosgw bucket quota max objects from admin api");
    for quota in &snapshot.bucket_quotas {
        let labels = [("owner", quota.owner.as_str())];
        bucket_quota_enabled.sample(&labels, flag(quota.enabled));
        bucket_quota_size.sample(&labels, quota.max_size_kb);
        bucket_quota_objects.sample(&labels, quota.max_objects);
    }

    let mut timestamp = Family::new(SNAPSHOT_TIMESTAMP, "Unix time at which the published snapshot was completed");
    timestamp.sample(&[], snapshot.completed_at.timestamp_millis() as f64 / 1000.0);

    let mut families = [
        bucket_objects,
        bucket_size,
        bucket_shards,
        user_objects,
        user_size,
        user_quota_enabled,
        user_quota_size,
        user_quota_objects,
        bucket_quota_enabled,
        bucket_quota_size,
        bucket_quota_objects,
        timestamp,
    ];
    families.sort_by_key(|family| family.name);

    for family in &families {
        family.write_to(out);
    }
}
