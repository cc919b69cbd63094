use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::signer::{uri_encode, Signer};
use super::types::{BucketStatsDocument, IdList, QuotaDocument, UserStatsDocument};
use super::AdminApi;
use crate::error::UpstreamError;
use crate::snapshot::{BucketRecord, QuotaKind, QuotaRecord, UserRecord};

/// HTTP client for the RGW admin API.
///
/// Every request carries its own timeout so that a hung gateway fails the
/// fetch instead of stalling the refresh pass.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: Client,
    endpoint: Url,
    signer: Option<Signer>,
    timeout: Duration,
}

impl AdminClient {
    /// Create a client for `endpoint` (e.g. `http://rgw.example:7480`).
    ///
    /// Without a signer requests go out unsigned, which the admin API rejects
    /// with 403 unless it sits behind an authenticating proxy.
    pub fn new(endpoint: &str, signer: Option<Signer>, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .with_context(|| format!("invalid admin endpoint '{}'", endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("admin endpoint must be http or https, got '{}'", endpoint.scheme());
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            signer,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build `{endpoint}{path}?{query}`.
    ///
    /// `(key, None)` pairs become bare flags (`?quota`); values are RFC 3986 encoded
    /// so the signed canonical query matches what goes on the wire.
    fn url_for(&self, path: &str, query: &[(&str, Option<&str>)]) -> Url {
        let mut url = self.endpoint.clone();
        let base = self.endpoint.path().trim_end_matches('/');
        url.set_path(&format!("{}{}", base, path));

        if query.is_empty() {
            url.set_query(None);
        } else {
            let encoded = query
                .iter()
                .map(|(key, value)| match value {
                    Some(value) => format!("{}={}", key, uri_encode(value)),
                    None => key.to_string(),
                })
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&encoded));
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        path: &str,
        query: &[(&str, Option<&str>)],
    ) -> Result<T, UpstreamError> {
        let url = self.url_for(path, query);

        let mut request = self.http.get(url.clone());
        if let Some(signer) = &self.signer {
            for (key, value) in signer.sign_get(&url, Utc::now()) {
                request = request.header(key, value);
            }
        }

        tracing::trace!(url = %url, "admin API request");

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(UpstreamError::from_status(
                status,
                &String::from_utf8_lossy(&body),
            ));
        }

        serde_json::from_slice(&body).map_err(|source| UpstreamError::Parse { resource, source })
    }

    fn classify(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Transport(error)
        }
    }

    async fn quota(&self, uid: &str, kind: QuotaKind) -> Result<QuotaRecord, UpstreamError> {
        let resource = match kind {
            QuotaKind::User => "user quota",
            QuotaKind::Bucket => "bucket quota",
        };
        let document: QuotaDocument = self
            .get_json(
                resource,
                "/admin/user",
                &[
                    ("quota", None),
                    ("quota-type", Some(kind.as_str())),
                    ("uid", Some(uid)),
                ],
            )
            .await?;
        Ok(document.into_record(uid, kind))
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn list_users(&self) -> Result<Vec<String>, UpstreamError> {
        self.get_json::<IdList>("user list", "/admin/metadata/user", &[])
            .await
    }

    async fn list_buckets(&self) -> Result<Vec<String>, UpstreamError> {
        self.get_json::<IdList>("bucket list", "/admin/bucket", &[])
            .await
    }

    async fn bucket_stats(&self, bucket: &str) -> Result<BucketRecord, UpstreamError> {
        let document: BucketStatsDocument = self
            .get_json("bucket stats", "/admin/bucket", &[("bucket", Some(bucket))])
            .await?;
        Ok(document.into_record(bucket))
    }

    async fn user_stats(&self, uid: &str) -> Result<UserRecord, UpstreamError> {
        let document: UserStatsDocument = self
            .get_json(
                "user stats",
                "/admin/user",
                &[("stats", Some("true")), ("uid", Some(uid))],
            )
            .await?;
        Ok(document.into_record(uid))
    }

    async fn user_quota(&self, uid: &str) -> Result<QuotaRecord, UpstreamError> {
        self.quota(uid, QuotaKind::User).await
    }

    async fn bucket_quota(&self, uid: &str) -> Result<QuotaRecord, UpstreamError> {
        self.quota(uid, QuotaKind::Bucket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::Credentials;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AdminClient {
        AdminClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for_encodes_query() {
        let client = AdminClient::new("http://rgw.example:7480/", None, Duration::from_secs(5)).unwrap();

        let url = client.url_for("/admin/bucket", &[]);
        assert_eq!(url.as_str(), "http://rgw.example:7480/admin/bucket");

        let url = client.url_for(
            "/admin/user",
            &[("quota", None), ("quota-type", Some("bucket")), ("uid", Some("tenant$bob"))],
        );
        assert_eq!(
            url.as_str(),
            "http://rgw.example:7480/admin/user?quota&quota-type=bucket&uid=tenant%24bob"
        );
    }

    #[test]
    fn test_url_for_keeps_endpoint_prefix() {
        let client = AdminClient::new("https://gw.example/rgw", None, Duration::from_secs(5)).unwrap();
        let url = client.url_for("/admin/metadata/user", &[]);
        assert_eq!(url.as_str(), "https://gw.example/rgw/admin/metadata/user");
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(AdminClient::new("ftp://rgw.example", None, Duration::from_secs(5)).is_err());
        assert!(AdminClient::new("not a url", None, Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_list_buckets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/bucket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["b1", "b2"])))
            .mount(&server)
            .await;

        let buckets = client(&server).list_buckets().await.unwrap();
        assert_eq!(buckets, vec!["b1".to_string(), "b2".to_string()]);
    }

    #[tokio::test]
    async fn test_bucket_stats_uses_listed_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/bucket"))
            .and(query_param("bucket", "b1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bucket": "b1",
                "owner": "alice",
                "num_shards": 3,
                "usage": {"rgw.main": {"size_kb": 1, "size_kb_actual": 4, "num_objects": 1}}
            })))
            .mount(&server)
            .await;

        let record = client(&server).bucket_stats("b1").await.unwrap();
        assert_eq!(record.bucket, "b1");
        assert_eq!(record.owner, "alice");
        assert_eq!(record.size_kb_actual, 4);
        assert_eq!(record.num_shards, 3);
    }

    #[tokio::test]
    async fn test_quota_query_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/user"))
            .and(query_param("quota-type", "bucket"))
            .and(query_param("uid", "alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "enabled": true, "max_size_kb": 0, "max_objects": 100
            })))
            .mount(&server)
            .await;

        let record = client(&server).bucket_quota("alice").await.unwrap();
        assert_eq!(record.kind, QuotaKind::Bucket);
        assert_eq!(record.owner, "alice");
        // Fetchers do not normalize; that happens when the snapshot is assembled
        assert_eq!(record.max_size_kb, 0);
    }

    #[tokio::test]
    async fn test_forbidden_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/metadata/user"))
            .respond_with(ResponseTemplate::new(403).set_body_string("{\"Code\":\"AccessDenied\"}"))
            .mount(&server)
            .await;

        let error = client(&server).list_users().await.unwrap_err();
        assert!(matches!(error, UpstreamError::Auth { .. }), "got {error:?}");
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/user"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let error = client(&server).user_stats("alice").await.unwrap_err();
        assert!(error.is_parse(), "got {error:?}");
    }

    #[tokio::test]
    async fn test_server_error_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/bucket"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let error = client(&server).list_buckets().await.unwrap_err();
        assert!(matches!(error, UpstreamError::Status { .. }), "got {error:?}");
        assert!(!error.is_parse());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/bucket"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = AdminClient::new(&server.uri(), None, Duration::from_millis(200)).unwrap();
        let error = client.list_buckets().await.unwrap_err();
        assert!(matches!(error, UpstreamError::Timeout(_)), "got {error:?}");
    }

    #[tokio::test]
    async fn test_signed_requests_carry_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/metadata/user"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["alice"])))
            .expect(1)
            .mount(&server)
            .await;

        let signer = Signer::new(
            Credentials {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: None,
            },
            "us-east-1",
            "s3",
        );
        let client = AdminClient::new(&server.uri(), Some(signer), Duration::from_secs(5)).unwrap();
        assert_eq!(client.list_users().await.unwrap(), vec!["alice".to_string()]);
    }
}
