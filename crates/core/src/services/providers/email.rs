//! Email provider implementations.

use async_trait::async_trait;
use courier_common::config::ProvidersConfig;
use courier_common::{AppError, AppResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{INITIAL_RETRY_DELAY, SEND_ATTEMPTS};

/// Capability for sending email through an external provider.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email, returning the provider message id.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> AppResult<String>;
}

/// Build the email provider from configuration.
///
/// Unconfigured or unknown providers fall back to the no-op
/// implementation so the rest of the pipeline keeps working.
#[must_use]
pub fn email_provider_from_config(config: &ProvidersConfig) -> Arc<dyn EmailProvider> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match &config.email {
        Some(email) => match email.kind.as_str() {
            "sendgrid" => Arc::new(SendGridEmail::new(
                &email.api_key,
                &email.from_address,
                &email.from_name,
                timeout,
            )),
            "mailgun" => {
                let Some(domain) = &email.domain else {
                    warn!("Mailgun provider configured without a domain, falling back to no-op");
                    return Arc::new(NoOpEmail);
                };
                Arc::new(MailgunEmail::new(
                    &email.api_key,
                    domain,
                    &email.from_address,
                    &email.from_name,
                    timeout,
                ))
            }
            other => {
                warn!(kind = %other, "Unknown email provider kind, falling back to no-op");
                Arc::new(NoOpEmail)
            }
        },
        None => Arc::new(NoOpEmail),
    }
}

/// No-op email provider for tests and disabled configurations.
#[derive(Clone, Default)]
pub struct NoOpEmail;

#[async_trait]
impl EmailProvider for NoOpEmail {
    async fn send(
        &self,
        to: &str,
        _subject: &str,
        _text: &str,
        _html: Option<&str>,
    ) -> AppResult<String> {
        info!(to = %to, "Email provider disabled, dropping message");
        Ok(format!("noop-email-{}", uuid::Uuid::new_v4()))
    }
}

/// SendGrid email provider.
#[derive(Clone)]
pub struct SendGridEmail {
    client: reqwest::Client,
    api_key: String,
    from_address: String,
    from_name: String,
    timeout: Duration,
}

impl SendGridEmail {
    /// Create a new SendGrid provider.
    #[must_use]
    pub fn new(api_key: &str, from_address: &str, from_name: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            from_address: from_address.to_string(),
            from_name: from_name.to_string(),
            timeout,
        }
    }

    async fn request_once(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> AppResult<String> {
        let body = serde_json::json!({
            "personalizations": [{
                "to": [{"email": to}]
            }],
            "from": {
                "email": self.from_address,
                "name": self.from_name
            },
            "subject": subject,
            "content": [
                {"type": "text/plain", "value": text},
                {"type": "text/html", "value": html.unwrap_or_default()}
            ]
        });

        let response = self
            .client
            .post("https://api.sendgrid.com/v3/mail/send")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("SendGrid request failed: {e}")))?;

        if response.status().is_success() {
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            Ok(message_id.unwrap_or_else(|| format!("sendgrid-{}", uuid::Uuid::new_v4())))
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::Provider(format!(
                "SendGrid rejected the message ({status}): {error_text}"
            )))
        }
    }
}

#[async_trait]
impl EmailProvider for SendGridEmail {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> AppResult<String> {
        let mut delay = INITIAL_RETRY_DELAY;
        let mut attempt = 1u32;
        loop {
            match self.request_once(to, subject, text, html).await {
                Ok(id) => return Ok(id),
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!(attempt, error = %e, "SendGrid send attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Mailgun email provider.
#[derive(Clone)]
pub struct MailgunEmail {
    client: reqwest::Client,
    api_key: String,
    domain: String,
    from_address: String,
    from_name: String,
    timeout: Duration,
}

impl MailgunEmail {
    /// Create a new Mailgun provider.
    #[must_use]
    pub fn new(
        api_key: &str,
        domain: &str,
        from_address: &str,
        from_name: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            domain: domain.to_string(),
            from_address: from_address.to_string(),
            from_name: from_name.to_string(),
            timeout,
        }
    }

    async fn request_once(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> AppResult<String> {
        let mut form_params = vec![
            (
                "from",
                format!("{} <{}>", self.from_name, self.from_address),
            ),
            ("to", to.to_string()),
            ("subject", subject.to_string()),
            ("text", text.to_string()),
        ];

        if let Some(html) = html {
            form_params.push(("html", html.to_string()));
        }

        let response = self
            .client
            .post(format!(
                "https://api.mailgun.net/v3/{}/messages",
                self.domain
            ))
            .basic_auth("api", Some(&self.api_key))
            .timeout(self.timeout)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Mailgun request failed: {e}")))?;

        if response.status().is_success() {
            #[derive(Deserialize)]
            struct MailgunResponse {
                id: Option<String>,
            }
            let result: MailgunResponse = response
                .json()
                .await
                .unwrap_or(MailgunResponse { id: None });
            Ok(result
                .id
                .unwrap_or_else(|| format!("mailgun-{}", uuid::Uuid::new_v4())))
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::Provider(format!(
                "Mailgun rejected the message ({status}): {error_text}"
            )))
        }
    }
}

#[async_trait]
impl EmailProvider for MailgunEmail {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> AppResult<String> {
        let mut delay = INITIAL_RETRY_DELAY;
        let mut attempt = 1u32;
        loop {
            match self.request_once(to, subject, text, html).await {
                Ok(id) => return Ok(id),
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!(attempt, error = %e, "Mailgun send attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
