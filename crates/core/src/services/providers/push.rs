//! Push notification gateway.

use async_trait::async_trait;
use courier_common::config::ProvidersConfig;
use courier_common::{AppError, AppResult};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{INITIAL_RETRY_DELAY, SEND_ATTEMPTS};

/// Error from a push send attempt.
///
/// `InvalidRecipient` is distinguished so callers can invalidate the
/// device registration instead of retrying a dead endpoint.
#[derive(Debug, thiserror::Error)]
pub enum PushSendError {
    /// The endpoint is gone; the device registration should be invalidated.
    #[error("push endpoint is no longer valid")]
    InvalidRecipient,
    /// Any other failure.
    #[error(transparent)]
    Other(#[from] AppError),
}

/// Capability for sending push notifications through a gateway.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Send a push message, returning the gateway message id.
    async fn send(
        &self,
        endpoint: &str,
        title: &str,
        body: &str,
        data: Option<&serde_json::Value>,
    ) -> Result<String, PushSendError>;

    /// Register a device token with the gateway, returning the endpoint.
    async fn register_endpoint(&self, token: &str, platform: &str) -> AppResult<String>;

    /// Whether the endpoint is still deliverable.
    async fn endpoint_status(&self, endpoint: &str) -> AppResult<bool>;

    /// Delete an endpoint registration.
    async fn delete_endpoint(&self, endpoint: &str) -> AppResult<()>;
}

/// Build the push provider from configuration.
#[must_use]
pub fn push_provider_from_config(config: &ProvidersConfig) -> Arc<dyn PushProvider> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match &config.push {
        Some(push) => Arc::new(HttpPushGateway::new(&push.base_url, &push.api_key, timeout)),
        None => Arc::new(NoOpPush),
    }
}

/// No-op push provider for tests and disabled configurations.
#[derive(Clone, Default)]
pub struct NoOpPush;

#[async_trait]
impl PushProvider for NoOpPush {
    async fn send(
        &self,
        endpoint: &str,
        _title: &str,
        _body: &str,
        _data: Option<&serde_json::Value>,
    ) -> Result<String, PushSendError> {
        info!(endpoint = %endpoint, "Push provider disabled, dropping message");
        Ok(format!("noop-push-{}", uuid::Uuid::new_v4()))
    }

    async fn register_endpoint(&self, _token: &str, _platform: &str) -> AppResult<String> {
        Ok(format!("noop-endpoint-{}", uuid::Uuid::new_v4()))
    }

    async fn endpoint_status(&self, _endpoint: &str) -> AppResult<bool> {
        Ok(true)
    }

    async fn delete_endpoint(&self, _endpoint: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Generic HTTP push gateway.
#[derive(Clone)]
pub struct HttpPushGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpPushGateway {
    /// Create a new gateway client.
    #[must_use]
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    async fn request_once(
        &self,
        endpoint: &str,
        title: &str,
        body: &str,
        data: Option<&serde_json::Value>,
    ) -> Result<String, PushSendError> {
        let payload = serde_json::json!({
            "endpoint": endpoint,
            "title": title,
            "body": body,
            "data": data,
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Push request failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(PushSendError::InvalidRecipient),
            status if status.is_success() => {
                #[derive(Deserialize)]
                struct PushResponse {
                    message_id: Option<String>,
                }
                let result: PushResponse = response
                    .json()
                    .await
                    .unwrap_or(PushResponse { message_id: None });
                Ok(result
                    .message_id
                    .unwrap_or_else(|| format!("push-{}", uuid::Uuid::new_v4())))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(PushSendError::Other(AppError::Provider(format!(
                    "Push gateway rejected the message ({status}): {error_text}"
                ))))
            }
        }
    }
}

#[async_trait]
impl PushProvider for HttpPushGateway {
    async fn send(
        &self,
        endpoint: &str,
        title: &str,
        body: &str,
        data: Option<&serde_json::Value>,
    ) -> Result<String, PushSendError> {
        let mut delay = INITIAL_RETRY_DELAY;
        let mut attempt = 1u32;
        loop {
            match self.request_once(endpoint, title, body, data).await {
                Ok(id) => return Ok(id),
                // A dead endpoint never becomes deliverable by retrying.
                Err(PushSendError::InvalidRecipient) => {
                    return Err(PushSendError::InvalidRecipient);
                }
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!(attempt, error = %e, "Push send attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn register_endpoint(&self, token: &str, platform: &str) -> AppResult<String> {
        let payload = serde_json::json!({
            "token": token,
            "platform": platform,
        });

        let response = self
            .client
            .post(format!("{}/v1/endpoints", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Endpoint registration failed: {e}")))?;

        if response.status().is_success() {
            #[derive(Deserialize)]
            struct RegisterResponse {
                endpoint: Option<String>,
            }
            let result: RegisterResponse = response
                .json()
                .await
                .unwrap_or(RegisterResponse { endpoint: None });
            Ok(result
                .endpoint
                .unwrap_or_else(|| format!("endpoint-{}", uuid::Uuid::new_v4())))
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::Provider(format!(
                "Push gateway rejected the registration ({status}): {error_text}"
            )))
        }
    }

    async fn endpoint_status(&self, endpoint: &str) -> AppResult<bool> {
        let response = self
            .client
            .get(format!("{}/v1/endpoints/{endpoint}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Endpoint status check failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(AppError::Provider(format!(
                "Endpoint status check failed ({status})"
            ))),
        }
    }

    async fn delete_endpoint(&self, endpoint: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(format!("{}/v1/endpoints/{endpoint}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Endpoint deletion failed: {e}")))?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(AppError::Provider(format!(
                "Push gateway rejected the deletion ({})",
                response.status()
            )))
        }
    }
}
