//! SMS provider implementations.

use async_trait::async_trait;
use courier_common::config::ProvidersConfig;
use courier_common::{AppError, AppResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{INITIAL_RETRY_DELAY, SEND_ATTEMPTS};

/// Capability for sending SMS through an external provider.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Send a text message, returning the provider message SID.
    async fn send(&self, to: &str, body: &str) -> AppResult<String>;
}

/// Build the SMS provider from configuration.
#[must_use]
pub fn sms_provider_from_config(config: &ProvidersConfig) -> Arc<dyn SmsProvider> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match &config.sms {
        Some(sms) => Arc::new(TwilioSms::new(
            &sms.account_sid,
            &sms.auth_token,
            &sms.from_number,
            timeout,
        )),
        None => Arc::new(NoOpSms),
    }
}

/// No-op SMS provider for tests and disabled configurations.
#[derive(Clone, Default)]
pub struct NoOpSms;

#[async_trait]
impl SmsProvider for NoOpSms {
    async fn send(&self, to: &str, _body: &str) -> AppResult<String> {
        info!(to = %to, "SMS provider disabled, dropping message");
        Ok(format!("noop-sms-{}", uuid::Uuid::new_v4()))
    }
}

/// Twilio-style SMS provider.
#[derive(Clone)]
pub struct TwilioSms {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    timeout: Duration,
}

impl TwilioSms {
    /// Create a new Twilio-style provider.
    #[must_use]
    pub fn new(account_sid: &str, auth_token: &str, from_number: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
            timeout,
        }
    }

    async fn request_once(&self, to: &str, body: &str) -> AppResult<String> {
        let form_params = [
            ("To", to.to_string()),
            ("From", self.from_number.clone()),
            ("Body", body.to_string()),
        ];

        let response = self
            .client
            .post(format!(
                "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
                self.account_sid
            ))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(self.timeout)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("SMS request failed: {e}")))?;

        if response.status().is_success() {
            #[derive(Deserialize)]
            struct SmsResponse {
                sid: Option<String>,
            }
            let result: SmsResponse = response
                .json()
                .await
                .unwrap_or(SmsResponse { sid: None });
            Ok(result
                .sid
                .unwrap_or_else(|| format!("sms-{}", uuid::Uuid::new_v4())))
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::Provider(format!(
                "SMS provider rejected the message ({status}): {error_text}"
            )))
        }
    }
}

#[async_trait]
impl SmsProvider for TwilioSms {
    async fn send(&self, to: &str, body: &str) -> AppResult<String> {
        let mut delay = INITIAL_RETRY_DELAY;
        let mut attempt = 1u32;
        loop {
            match self.request_once(to, body).await {
                Ok(sid) => return Ok(sid),
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!(attempt, error = %e, "SMS send attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
