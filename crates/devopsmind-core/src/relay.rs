//! Leaderboard relay client.
//!
//! The relay accepts one YAML progress snapshot per POST and answers with
//! `{"ok": true, "sha256": "..."}` or `{"ok": false, "error": "..."}`.
//! It must be idempotent: the same snapshot may be delivered more than once.

use crate::config::Config;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no relay URL configured")]
    NotConfigured,

    #[error("relay unreachable: {0}")]
    Transport(String),

    #[error("relay returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("relay rejected submission: {0}")]
    Rejected(String),

    #[error("unreadable relay response: {0}")]
    BadResponse(String),
}

/// Headers sent alongside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionMeta {
    pub gamer: String,
    pub email_hash: String,
}

/// Relay acknowledgement. `sha256` is the relay's content hash, when given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub sha256: Option<String>,
}

pub trait Relay {
    fn submit(&self, body: &str, meta: &SubmissionMeta) -> Result<Ack, RelayError>;
}

/// SHA-256 hex of the trimmed, lowercased address. Empty input stays empty.
pub fn email_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() {
        return String::new();
    }
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

// ---------------------------------------------------------------------------
// HttpRelay
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpRelay {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpRelay {
    pub fn new(url: &str, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("devopsmind/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            url: url.trim().to_string(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Self::new(
            &config.relay_url,
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Relay for HttpRelay {
    fn submit(&self, body: &str, meta: &SubmissionMeta) -> Result<Ack, RelayError> {
        if self.url.is_empty() {
            return Err(RelayError::NotConfigured);
        }
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/yaml")
            .header("X-Gamer", &meta.gamer)
            .header("X-Email-Hash", &meta.email_hash)
            .body(body.to_string())
            .send()
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), "relay responded");

        if status != reqwest::StatusCode::OK {
            return Err(RelayError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let parsed: RelayResponse =
            serde_json::from_str(&text).map_err(|e| RelayError::BadResponse(e.to_string()))?;
        if !parsed.ok {
            return Err(RelayError::Rejected(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(Ack {
            sha256: parsed.sha256,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
