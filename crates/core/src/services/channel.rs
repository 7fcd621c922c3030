//! Per-channel dispatch.
//!
//! Validates channel-specific recipient fields and hands the message to
//! the right provider, recording the lifecycle transition that results.

use std::sync::Arc;

use courier_common::{AppError, AppResult};
use courier_db::entities::notification::{self, NotificationChannel};
use courier_db::repositories::{CampaignRepository, DeviceTokenRepository, NotificationRepository};
use tracing::{debug, warn};

use crate::services::providers::{EmailProvider, PushProvider, PushSendError, SmsProvider};

/// Dispatches a persisted notification over its channel.
#[derive(Clone)]
pub struct ChannelDispatcher {
    notification_repo: NotificationRepository,
    campaign_repo: CampaignRepository,
    device_token_repo: DeviceTokenRepository,
    email: Arc<dyn EmailProvider>,
    sms: Arc<dyn SmsProvider>,
    push: Arc<dyn PushProvider>,
}

impl ChannelDispatcher {
    /// Create a new dispatcher.
    #[must_use]
    pub fn new(
        notification_repo: NotificationRepository,
        campaign_repo: CampaignRepository,
        device_token_repo: DeviceTokenRepository,
        email: Arc<dyn EmailProvider>,
        sms: Arc<dyn SmsProvider>,
        push: Arc<dyn PushProvider>,
    ) -> Self {
        Self {
            notification_repo,
            campaign_repo,
            device_token_repo,
            email,
            sms,
            push,
        }
    }

    /// Check that the notification carries the recipient fields its
    /// channel needs. Nothing is persisted on failure.
    pub fn validate(model: &notification::Model) -> AppResult<()> {
        match model.channel {
            NotificationChannel::Email => {
                if model.recipient_email.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::Validation(
                        "Email notifications require a recipient email address".to_string(),
                    ));
                }
                if model.subject.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::Validation(
                        "Email notifications require a subject".to_string(),
                    ));
                }
                Ok(())
            }
            NotificationChannel::Sms => {
                if model.recipient_phone.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::Validation(
                        "SMS notifications require a recipient phone number".to_string(),
                    ));
                }
                Ok(())
            }
            NotificationChannel::Push => {
                if model.push_token.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::Validation(
                        "Push notifications require a push token".to_string(),
                    ));
                }
                if model.platform.as_deref().is_none_or(str::is_empty) {
                    return Err(AppError::Validation(
                        "Push notifications require a device platform".to_string(),
                    ));
                }
                Ok(())
            }
            NotificationChannel::InApp => Ok(()),
        }
    }

    /// Dispatch a notification over its channel.
    ///
    /// On provider success the record moves to SENT; on failure it moves
    /// to FAILED (persisted) and the error is surfaced to the caller.
    /// Lifecycle-level retries are the sweeper's job, never this one's.
    pub async fn dispatch(&self, model: &notification::Model) -> AppResult<notification::Model> {
        debug!(id = %model.id, channel = ?model.channel, "Dispatching notification");

        match model.channel {
            NotificationChannel::InApp => self.dispatch_in_app(model).await,
            NotificationChannel::Email => self.dispatch_email(model).await,
            NotificationChannel::Sms => self.dispatch_sms(model).await,
            NotificationChannel::Push => self.dispatch_push(model).await,
        }
    }

    /// In-app notifications are stored, not transmitted, so they are
    /// sent and delivered in one step.
    async fn dispatch_in_app(&self, model: &notification::Model) -> AppResult<notification::Model> {
        let message_id = format!("in-app-{}", uuid::Uuid::new_v4());
        self.notification_repo
            .mark_sent(&model.id, &message_id)
            .await?;
        let delivered = self.notification_repo.mark_delivered(&model.id).await?;

        if let Some(campaign_id) = &model.campaign_id {
            self.campaign_repo.increment_delivered(campaign_id).await?;
        }

        Ok(delivered)
    }

    async fn dispatch_email(&self, model: &notification::Model) -> AppResult<notification::Model> {
        let to = model.recipient_email.as_deref().ok_or_else(|| {
            AppError::Validation(
                "Email notifications require a recipient email address".to_string(),
            )
        })?;
        let subject = model.subject.as_deref().ok_or_else(|| {
            AppError::Validation("Email notifications require a subject".to_string())
        })?;

        let result = self
            .email
            .send(to, subject, &model.content, model.html_content.as_deref())
            .await;

        self.record_outcome(model, result).await
    }

    async fn dispatch_sms(&self, model: &notification::Model) -> AppResult<notification::Model> {
        let to = model.recipient_phone.as_deref().ok_or_else(|| {
            AppError::Validation("SMS notifications require a recipient phone number".to_string())
        })?;

        let result = self.sms.send(to, &model.content).await;

        self.record_outcome(model, result).await
    }

    async fn dispatch_push(&self, model: &notification::Model) -> AppResult<notification::Model> {
        let token = model.push_token.as_deref().ok_or_else(|| {
            AppError::Validation("Push notifications require a push token".to_string())
        })?;

        let result = self
            .push
            .send(token, &model.title, &model.content, model.tracking_data.as_ref())
            .await;

        match result {
            Ok(message_id) => self.record_outcome(model, Ok(message_id)).await,
            Err(PushSendError::InvalidRecipient) => {
                // The registration is dead; stop future sends to it.
                let invalidated = self
                    .device_token_repo
                    .mark_invalid(token, "push gateway rejected the endpoint")
                    .await?;
                if invalidated > 0 {
                    warn!(id = %model.id, "Invalidated device token after rejected push");
                }
                let err = AppError::Provider("push endpoint is no longer valid".to_string());
                self.record_outcome(model, Err(err)).await
            }
            Err(PushSendError::Other(err)) => self.record_outcome(model, Err(err)).await,
        }
    }

    /// Persist the provider outcome as a lifecycle transition.
    async fn record_outcome(
        &self,
        model: &notification::Model,
        result: AppResult<String>,
    ) -> AppResult<notification::Model> {
        match result {
            Ok(message_id) => {
                self.notification_repo
                    .mark_sent(&model.id, &message_id)
                    .await
            }
            Err(err) => {
                warn!(id = %model.id, error = %err, "Notification dispatch failed");
                self.notification_repo
                    .mark_failed(&model.id, &err.to_string(), "SEND_ERROR")
                    .await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_db::entities::notification::{NotificationPriority, NotificationStatus};

    fn base_model(channel: NotificationChannel) -> notification::Model {
        notification::Model {
            id: "n1".to_string(),
            user_id: Some("user1".to_string()),
            recipient_email: None,
            recipient_phone: None,
            recipient_name: None,
            channel,
            status: NotificationStatus::Pending,
            priority: NotificationPriority::Normal,
            template_id: None,
            campaign_id: None,
            title: "Title".to_string(),
            content: "Body".to_string(),
            html_content: None,
            subject: None,
            push_token: None,
            platform: None,
            email_message_id: None,
            sms_message_sid: None,
            push_message_id: None,
            bounce_count: 0,
            retry_count: 0,
            max_retry_count: 3,
            scheduled_at: None,
            sent_at: None,
            delivered_at: None,
            failed_at: None,
            opened_at: None,
            clicked_at: None,
            error_message: None,
            error_code: None,
            last_error_at: None,
            metadata: None,
            tracking_data: None,
            created_at: Utc::now().into(),
            updated_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_email_requires_address_and_subject() {
        let mut model = base_model(NotificationChannel::Email);
        assert!(ChannelDispatcher::validate(&model).is_err());

        model.recipient_email = Some("a@example.com".to_string());
        assert!(ChannelDispatcher::validate(&model).is_err());

        model.subject = Some("Hello".to_string());
        assert!(ChannelDispatcher::validate(&model).is_ok());
    }

    #[test]
    fn test_sms_requires_phone() {
        let mut model = base_model(NotificationChannel::Sms);
        assert!(ChannelDispatcher::validate(&model).is_err());

        model.recipient_phone = Some("+15555550100".to_string());
        assert!(ChannelDispatcher::validate(&model).is_ok());
    }

    #[test]
    fn test_push_requires_token_and_platform() {
        let mut model = base_model(NotificationChannel::Push);
        assert!(ChannelDispatcher::validate(&model).is_err());

        model.push_token = Some("tok".to_string());
        assert!(ChannelDispatcher::validate(&model).is_err());

        model.platform = Some("ios".to_string());
        assert!(ChannelDispatcher::validate(&model).is_ok());
    }

    #[test]
    fn test_in_app_needs_no_recipient_fields() {
        let model = base_model(NotificationChannel::InApp);
        assert!(ChannelDispatcher::validate(&model).is_ok());
    }

    #[test]
    fn test_empty_recipient_fields_are_rejected() {
        let mut model = base_model(NotificationChannel::Email);
        model.recipient_email = Some(String::new());
        model.subject = Some("Hello".to_string());
        assert!(ChannelDispatcher::validate(&model).is_err());
    }
}
