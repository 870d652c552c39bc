use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to obtain data from the attack provider.
///
/// Always transient from the watcher's point of view: it is logged and the
/// next tick tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to attack provider timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider rejected credentials ({0})")]
    Unauthorized(StatusCode),

    #[error("provider returned {0}")]
    Status(StatusCode),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::from_status(status)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl FetchError {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized(status),
            _ => FetchError::Status(status),
        }
    }
}

/// Failure to deliver one message to one webhook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// 4xx other than 429: bad token, unknown webhook, invalid payload.
    #[error("webhook rejected message ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("webhook server error ({0})")]
    Server(StatusCode),
}

impl DeliveryError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::Rejected { .. })
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Network(e.to_string())
        }
    }
}

/// Command-level registry failures, reported back to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("webhook already registered (token or id {id} in use)")]
    Duplicate { id: u64 },

    #[error("no webhook matches `{0}`")]
    NotFound(String),
}

/// Config keys that could not be written, keyed by config key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistError {
    pub failures: BTreeMap<String, String>,
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.failures.keys().map(String::as_str).collect();
        write!(f, "failed to save config keys: {}", keys.join(", "))
    }
}

impl std::error::Error for PersistError {}
