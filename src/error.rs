use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::builder::FetchTarget;

/// Longest response body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 256;

/// Failure of a single admin API request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, reset, DNS failure and the like
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// 401/403: signing or credentials were rejected
    #[error("admin API rejected the request signature ({status}): {body}")]
    Auth { status: StatusCode, body: String },

    /// Any other non-2xx status
    #[error("admin API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The body was not the JSON document we expected
    #[error("malformed {resource} response: {source}")]
    Parse {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl UpstreamError {
    /// Classify a non-success status into `Auth` or `Status`.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = excerpt(body);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Auth { status, body }
        } else {
            Self::Status { status, body }
        }
    }

    /// True when the request reached the API but the payload could not be parsed.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Short label for the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Auth { .. } => "auth",
            Self::Status { .. } => "status",
            Self::Parse { .. } => "parse",
        }
    }
}

/// A per-entity stats or quota fetch failed. The entity is left out of the
/// snapshot, the pass carries on.
#[derive(Debug, Error)]
#[error("failed to fetch {target}: {source}")]
pub struct EntityFetchError {
    pub target: FetchTarget,
    #[source]
    pub source: UpstreamError,
}

/// A refresh pass that produced nothing to publish.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Listing users or buckets failed; without identifiers no record can be attributed.
    #[error("failed to enumerate {resource}: {source}")]
    Enumeration {
        resource: &'static str,
        #[source]
        source: UpstreamError,
    },
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = MAX_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
