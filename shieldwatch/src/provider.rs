/// Attack provider client
///
/// This module wraps the provider's HTTP API behind the `AttackSource` trait so
/// the watcher can be driven by any data source, and a scripted one in tests.
use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::message::{AttackDetail, Snapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Read side of the attack provider.
#[async_trait]
pub trait AttackSource: Send + Sync {
    /// Current attack listing.
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;

    /// Full record for one attack id.
    async fn fetch_detail(&self, id: u64) -> Result<AttackDetail, FetchError>;

    /// Addresses protected by the provider account.
    async fn fetch_ips(&self) -> Result<Vec<String>, FetchError>;
}

/// Shared, replaceable provider credential.
///
/// Cloned handles observe `set` immediately, so the operator can rotate the key
/// while the watcher keeps polling.
#[derive(Clone, Default)]
pub struct ApiKey(Arc<RwLock<String>>);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(key.into())))
    }

    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, key: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = key.into();
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Deserialize)]
struct IpList {
    #[serde(default)]
    ips: Vec<String>,
}

/// HTTP client for the Royale Hosting attack API.
pub struct RoyaleClient {
    base_url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl RoyaleClient {
    pub fn new(config: &ProviderConfig, api_key: ApiKey) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .context("Failed to build provider HTTP client")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.get())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }

        response.json::<T>().await.map_err(FetchError::from)
    }
}

#[async_trait]
impl AttackSource for RoyaleClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        self.get_json("attacks").await
    }

    async fn fetch_detail(&self, id: u64) -> Result<AttackDetail, FetchError> {
        self.get_json(&format!("attacks/{}", id)).await
    }

    async fn fetch_ips(&self) -> Result<Vec<String>, FetchError> {
        self.get_json::<IpList>("ips").await.map(|list| list.ips)
    }
}
