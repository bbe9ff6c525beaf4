use crate::config::{Config, MissingSetting};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_VERSION: &str = "v0";

#[derive(Debug, Error)]
pub enum SlackError {
    #[error(transparent)]
    NotConfigured(#[from] MissingSetting),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Slack API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Slack API error: {0}")]
    Api(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("timestamp {0:?} is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("timestamp is outside the {0:?} replay window")]
    StaleTimestamp(Duration),
    #[error("signature mismatch")]
    Mismatch,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatPostMessageRequest<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    text: &'a str,
}

pub struct SlackWebClient {
    bot_token: Result<String, MissingSetting>,
    base_url: String,
    client: reqwest::Client,
}

impl SlackWebClient {
    pub fn new(config: &Config) -> Self {
        Self {
            bot_token: config.require_bot_token().map(str::to_string),
            base_url: config.slack_api_base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Posts plain text to `channel`, threaded under `thread_ts` when given.
    ///
    /// A non-2xx status and an `ok: false` payload are reported separately.
    pub async fn chat_post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), SlackError> {
        let bot_token = self.bot_token.as_deref().map_err(Clone::clone)?;
        let url = format!("{}/chat.postMessage", self.base_url);
        let payload = ChatPostMessageRequest {
            channel,
            thread_ts,
            text,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", bot_token))
            .header("Content-Type", "application/json; charset=utf-8")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Status { status, body });
        }

        let parsed: SlackApiResponse = response.json().await?;
        if !parsed.ok {
            return Err(SlackError::Api(
                parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        Ok(())
    }
}

/// Computes `v0=<hex hmac>` over `v0:{timestamp}:{raw_body}`.
pub fn compute_signature(signing_secret: &str, timestamp: &str, raw_body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(raw_body.as_bytes());
    format!(
        "{}={}",
        SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    )
}

pub fn signature_matches(
    signing_secret: &str,
    timestamp: &str,
    raw_body: &str,
    signature: &str,
) -> bool {
    let computed = compute_signature(signing_secret, timestamp, raw_body);
    constant_time_eq(signature.as_bytes(), computed.as_bytes())
}

pub fn verify_signature(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    raw_body: &str,
    max_age: Duration,
) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    verify_signature_at(signing_secret, timestamp, signature, raw_body, max_age, now)
}

/// Same as [`verify_signature`] with an explicit clock, in unix seconds.
pub fn verify_signature_at(
    signing_secret: &str,
    timestamp: &str,
    signature: &str,
    raw_body: &str,
    max_age: Duration,
    now: i64,
) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_string()))?;

    if !max_age.is_zero() && now.abs_diff(ts) > max_age.as_secs() {
        return Err(SignatureError::StaleTimestamp(max_age));
    }

    if !signature_matches(signing_secret, timestamp, raw_body, signature) {
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
