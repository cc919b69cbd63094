// ============================================================
// AWS SigV4 Signing for the RGW admin API
// ============================================================

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::logging::Redacted;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Access key pair used to sign admin requests.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    /// Read credentials the way the AWS env provider does.
    ///
    /// `AWS_ACCESS_KEY_ID` falls back to `AWS_ACCESS_KEY`, `AWS_SECRET_ACCESS_KEY`
    /// to `AWS_SECRET_KEY`. Returns `None` unless both halves are present.
    pub fn from_env() -> Option<Self> {
        let var = |primary: &str, fallback: &str| {
            std::env::var(primary)
                .or_else(|_| std::env::var(fallback))
                .ok()
                .filter(|v| !v.is_empty())
        };

        let access_key_id = var("AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY")?;
        let secret_access_key = var("AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok().filter(|v| !v.is_empty());

        Some(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &Redacted::new(&self.access_key_id).to_string())
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Signs GET requests for a fixed region and service.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    region: String,
    service: String,
}

impl Signer {
    pub fn new(credentials: Credentials, region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.credentials.access_key_id
    }

    /// Headers to attach to a bodiless GET for `url`, signed as of `now`.
    pub fn sign_get(&self, url: &url::Url, now: DateTime<Utc>) -> Vec<(String, String)> {
        sigv4_sign(
            "GET",
            url,
            b"",
            &self.credentials,
            &self.region,
            &self.service,
            now,
        )
    }
}

/// Percent-encode per RFC 3986, leaving only unreserved characters.
pub fn uri_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(b as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", b)),
        }
    }
    encoded
}

/// Canonical query string: `key=value` pairs sorted by key then value.
///
/// The input is expected to be already encoded with [`uri_encode`]. Flags
/// without a value (`?quota`) canonicalize as `quota=`.
pub fn canonical_query_string(query: Option<&str>) -> String {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return String::new();
    };

    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();
    pairs.sort_unstable();

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Compute HMAC-SHA256.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex_encode(&Sha256::digest(data))
}

/// Derive the SigV4 signing key for a date/region/service scope.
fn signing_key(secret_access_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_access_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// `host[:port]` as reqwest will send it in the Host header.
fn host_header(url: &url::Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Sign an HTTP request with AWS SigV4.
///
/// Returns a list of headers to add to the request.
fn sigv4_sign(
    method: &str,
    url: &url::Url,
    body: &[u8],
    credentials: &Credentials,
    region: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();
    let payload_hash = sha256_hex(body);

    // Canonical headers, sorted by lowercase key
    let mut headers_map: BTreeMap<&str, String> = BTreeMap::new();
    headers_map.insert("host", host_header(url));
    headers_map.insert("x-amz-date", amz_date.clone());
    headers_map.insert("x-amz-content-sha256", payload_hash.clone());
    if let Some(token) = &credentials.session_token {
        headers_map.insert("x-amz-security-token", token.clone());
    }

    let canonical_headers: String = headers_map
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();
    let signed_headers: String = headers_map.keys().copied().collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        url.path(),
        canonical_query_string(url.query()),
        canonical_headers,
        signed_headers,
        payload_hash
    );

    let credential_scope = format!("{}/{}/{}/aws4_request", date_stamp, region, service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &date_stamp, region, service);
    let signature = hex_encode(&hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, credential_scope, signed_headers, signature
    );

    let mut result = vec![
        ("Authorization".to_string(), authorization),
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-content-sha256".to_string(), payload_hash),
    ];
    if let Some(token) = &credentials.session_token {
        result.push(("x-amz-security-token".to_string(), token.clone()));
    }
    result
}
