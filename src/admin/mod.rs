//! Access to the RGW admin API
//!
//! [`AdminApi`] is the set of typed fetches the snapshot builder needs.
//! [`AdminClient`] implements it over signed HTTP requests.

pub mod client;
pub mod signer;
pub mod types;

pub use client::AdminClient;
pub use signer::{Credentials, Signer};

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::snapshot::{BucketRecord, QuotaRecord, UserRecord};

/// Typed fetches against the admin API.
///
/// Each call is a single request/parse with no retries and no shared state.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// All user ids known to the cluster
    async fn list_users(&self) -> Result<Vec<String>, UpstreamError>;

    /// All bucket names known to the cluster
    async fn list_buckets(&self) -> Result<Vec<String>, UpstreamError>;

    async fn bucket_stats(&self, bucket: &str) -> Result<BucketRecord, UpstreamError>;

    async fn user_stats(&self, uid: &str) -> Result<UserRecord, UpstreamError>;

    /// The user's own quota. `max_size_kb` is returned as sent by the API.
    async fn user_quota(&self, uid: &str) -> Result<QuotaRecord, UpstreamError>;

    /// The user's default bucket quota. `max_size_kb` is returned as sent by the API.
    async fn bucket_quota(&self, uid: &str) -> Result<QuotaRecord, UpstreamError>;
}
