//! # HTTP Trade Service
//!
//! [`TradeService`] client for the remote trade store over HTTP/JSON.
//!
//! | Request | Success | Failure |
//! |---------|---------|---------|
//! | `PUT {base}/trades/{id}` | 200 + record | 409 → `Conflict` |
//! | `GET {base}/trades?profilePubKey=..` | 200 + list | |
//! | `GET {base}/trades/{id}` | 200 + record | 404 → `None` |
//!
//! Transport errors, timeouts and 5xx responses map to
//! `ServiceError::Network`; other non-success statuses to `Rejected`.

use crate::application::dto::TradeRecord;
use crate::application::ports::{ServiceError, ServiceResult, TradeService};
use crate::domain::value_objects::TradeId;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Body of a 409 response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictBody {
    #[serde(default)]
    current_version: u64,
}

/// Configuration for [`HttpTradeService`].
#[derive(Debug, Clone)]
pub struct HttpTradeServiceConfig {
    /// Base URL the `trades` resource hangs off.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpTradeServiceConfig {
    /// Creates a configuration with the default timeout.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP implementation of [`TradeService`].
#[derive(Debug, Clone)]
pub struct HttpTradeService {
    client: Client,
    base_url: Url,
}

impl HttpTradeService {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// `ServiceError::Network` if the TLS backend cannot be initialised.
    pub fn new(config: HttpTradeServiceConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> ServiceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Network(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ServiceResult<T> {
        response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn failure(response: Response) -> ServiceError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            warn!(status = status.as_u16(), "trade service error");
            ServiceError::Network(format!("server returned {status}: {message}"))
        } else {
            ServiceError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn transport(err: reqwest::Error) -> ServiceError {
    ServiceError::Network(err.to_string())
}

#[async_trait]
impl TradeService for HttpTradeService {
    async fn put(&self, record: TradeRecord) -> ServiceResult<TradeRecord> {
        let url = self.endpoint(&["trades", record.id.as_str()])?;
        let response = self
            .client
            .put(url)
            .json(&record)
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            status if status.is_success() => {
                let stored: TradeRecord = Self::decode(response).await?;
                debug!(trade_id = %stored.id, version = stored.version, "record stored");
                Ok(stored)
            }
            StatusCode::CONFLICT => {
                let body = response.bytes().await.map_err(transport)?;
                let current = serde_json::from_slice::<ConflictBody>(&body)
                    .unwrap_or_default()
                    .current_version;
                Err(ServiceError::Conflict {
                    id: record.id.to_string(),
                    submitted: record.version,
                    current,
                })
            }
            _ => Err(Self::failure(response).await),
        }
    }

    async fn get(&self, profile_pub_key: &str) -> ServiceResult<Vec<TradeRecord>> {
        let mut url = self.endpoint(&["trades"])?;
        url.query_pairs_mut().append_pair("profilePubKey", profile_pub_key);
        let response = self.client.get(url).send().await.map_err(transport)?;
        if response.status().is_success() {
            Self::decode(response).await
        } else {
            Err(Self::failure(response).await)
        }
    }

    async fn fetch(&self, id: &TradeId) -> ServiceResult<Option<TradeRecord>> {
        let url = self.endpoint(&["trades", id.as_str()])?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        match response.status() {
            status if status.is_success() => Self::decode(response).await.map(Some),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::failure(response).await),
        }
    }
}
