//! Notification dispatch engine.
//!
//! Owns the send pipeline: build, template application, channel
//! validation, duplicate suppression, persistence, and synchronous
//! dispatch of immediately-due notifications. Also hosts the sweep
//! entry points the scheduler drives.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use courier_common::config::NotificationConfig;
use courier_common::{AppError, AppResult, id::IdGenerator};
use courier_db::entities::notification::{
    self, NotificationChannel, NotificationPriority, NotificationStatus,
};
use courier_db::repositories::{CampaignRepository, NotificationRepository};
use sea_orm::Set;
use serde::Deserialize;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::services::channel::ChannelDispatcher;
use crate::services::template::TemplateService;

/// Input for sending a single notification.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationInput {
    pub user_id: Option<String>,
    #[validate(email)]
    pub recipient_email: Option<String>,
    #[validate(length(max = 32))]
    pub recipient_phone: Option<String>,
    #[validate(length(max = 255))]
    pub recipient_name: Option<String>,
    pub channel: NotificationChannel,
    #[serde(default = "default_priority")]
    pub priority: NotificationPriority,
    pub template_id: Option<String>,
    pub campaign_id: Option<String>,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub html_content: Option<String>,
    #[validate(length(max = 998))]
    pub subject: Option<String>,
    pub push_token: Option<String>,
    pub platform: Option<String>,
    /// Placeholder values for template rendering.
    pub template_vars: Option<serde_json::Value>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(range(min = 0, max = 10))]
    pub max_retry_count: Option<i32>,
    pub metadata: Option<serde_json::Value>,
    pub tracking_data: Option<serde_json::Value>,
}

const fn default_priority() -> NotificationPriority {
    NotificationPriority::Normal
}

/// Service implementing the notification lifecycle.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    campaign_repo: CampaignRepository,
    template_service: TemplateService,
    dispatcher: ChannelDispatcher,
    config: NotificationConfig,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(
        notification_repo: NotificationRepository,
        campaign_repo: CampaignRepository,
        template_service: TemplateService,
        dispatcher: ChannelDispatcher,
        config: NotificationConfig,
    ) -> Self {
        Self {
            notification_repo,
            campaign_repo,
            template_service,
            dispatcher,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Send a notification.
    ///
    /// The record is persisted PENDING first; if it is due immediately
    /// it is dispatched synchronously, and a dispatch failure leaves the
    /// record FAILED while the error propagates to the caller.
    pub async fn send(&self, input: SendNotificationInput) -> AppResult<notification::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let now = Utc::now();
        let expires_at = input
            .expires_at
            .map(Into::into)
            .or_else(|| Some((now + input.priority.default_ttl()).into()));

        let mut model = notification::Model {
            id: self.id_gen.generate(),
            user_id: input.user_id,
            recipient_email: input.recipient_email,
            recipient_phone: input.recipient_phone,
            recipient_name: input.recipient_name,
            channel: input.channel,
            status: NotificationStatus::Pending,
            priority: input.priority,
            template_id: input.template_id,
            campaign_id: input.campaign_id,
            title: input.title,
            content: input.content,
            html_content: input.html_content,
            subject: input.subject,
            push_token: input.push_token,
            platform: input.platform,
            email_message_id: None,
            sms_message_sid: None,
            push_message_id: None,
            bounce_count: 0,
            retry_count: 0,
            max_retry_count: input
                .max_retry_count
                .unwrap_or(self.config.default_max_retries),
            scheduled_at: input.scheduled_at.map(Into::into),
            sent_at: None,
            delivered_at: None,
            failed_at: None,
            opened_at: None,
            clicked_at: None,
            error_message: None,
            error_code: None,
            last_error_at: None,
            metadata: input.metadata,
            tracking_data: input.tracking_data,
            created_at: now.into(),
            updated_at: None,
            expires_at,
        };

        if model.template_id.is_some() {
            let vars = vars_from_json(input.template_vars.as_ref());
            self.apply_template(&mut model, &vars).await?;
        }

        if model.title.is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }
        if model.content.is_empty() {
            return Err(AppError::Validation(
                "Content must not be empty".to_string(),
            ));
        }

        ChannelDispatcher::validate(&model)?;

        // Anonymous sends carry no user id and skip duplicate suppression.
        if let Some(user_id) = &model.user_id {
            let cutoff = now - Duration::minutes(self.config.duplicate_window_minutes);
            if self
                .notification_repo
                .exists_duplicate_since(user_id, &model.title, &model.content, cutoff)
                .await?
            {
                return Err(AppError::Duplicate(
                    "An identical notification was sent to this user recently".to_string(),
                ));
            }
        }

        let created = self.persist(model).await?;
        debug!(id = %created.id, channel = ?created.channel, "Notification persisted");

        if created.should_send_now() {
            return self.dispatcher.dispatch(&created).await;
        }

        Ok(created)
    }

    /// Send a batch of notifications with per-item isolation.
    ///
    /// Failures are logged and skipped; the successfully sent records
    /// are returned. There is no rollback of earlier items.
    pub async fn send_bulk(
        &self,
        inputs: Vec<SendNotificationInput>,
    ) -> AppResult<Vec<notification::Model>> {
        let total = inputs.len();
        let mut sent = Vec::with_capacity(total);

        for input in inputs {
            match self.send(input).await {
                Ok(model) => sent.push(model),
                Err(e) => warn!(error = %e, "Bulk send item failed, skipping"),
            }
        }

        info!(sent = sent.len(), total, "Bulk send finished");
        Ok(sent)
    }

    /// Apply a template to the in-flight notification.
    ///
    /// Channel-specific bodies are selected first, then the common title
    /// and content templates fill any still-empty fields. Usage is
    /// recorded exactly once, after the render succeeded.
    async fn apply_template(
        &self,
        model: &mut notification::Model,
        vars: &HashMap<String, String>,
    ) -> AppResult<()> {
        let Some(template_id) = model.template_id.clone() else {
            return Ok(());
        };

        let template = self.template_service.get_active(&template_id).await?;

        match model.channel {
            NotificationChannel::Email => {
                if model.subject.is_none() {
                    if let Some(subject_template) = &template.subject_template {
                        model.subject = Some(TemplateService::render(subject_template, vars));
                    }
                }
                if model.html_content.is_none() {
                    if let Some(html_template) = &template.html_template {
                        model.html_content = Some(TemplateService::render(html_template, vars));
                    }
                }
            }
            NotificationChannel::Sms => {
                if let Some(sms_template) = &template.sms_template {
                    model.content = TemplateService::render(sms_template, vars);
                }
            }
            NotificationChannel::Push => {
                if let Some(push_template) = &template.push_template {
                    model.content = TemplateService::render(push_template, vars);
                }
            }
            NotificationChannel::InApp => {}
        }

        if model.title.is_empty() {
            if let Some(title_template) = &template.title_template {
                model.title = TemplateService::render(title_template, vars);
            }
        }
        if model.content.is_empty() {
            model.content = TemplateService::render(&template.content_template, vars);
        }

        self.template_service.record_usage(&template.id).await?;
        Ok(())
    }

    async fn persist(&self, model: notification::Model) -> AppResult<notification::Model> {
        let active = notification::ActiveModel {
            id: Set(model.id),
            user_id: Set(model.user_id),
            recipient_email: Set(model.recipient_email),
            recipient_phone: Set(model.recipient_phone),
            recipient_name: Set(model.recipient_name),
            channel: Set(model.channel),
            status: Set(model.status),
            priority: Set(model.priority),
            template_id: Set(model.template_id),
            campaign_id: Set(model.campaign_id),
            title: Set(model.title),
            content: Set(model.content),
            html_content: Set(model.html_content),
            subject: Set(model.subject),
            push_token: Set(model.push_token),
            platform: Set(model.platform),
            email_message_id: Set(None),
            sms_message_sid: Set(None),
            push_message_id: Set(None),
            bounce_count: Set(0),
            retry_count: Set(0),
            max_retry_count: Set(model.max_retry_count),
            scheduled_at: Set(model.scheduled_at),
            sent_at: Set(None),
            delivered_at: Set(None),
            failed_at: Set(None),
            opened_at: Set(None),
            clicked_at: Set(None),
            error_message: Set(None),
            error_code: Set(None),
            last_error_at: Set(None),
            metadata: Set(model.metadata),
            tracking_data: Set(model.tracking_data),
            created_at: Set(model.created_at),
            updated_at: Set(None),
            expires_at: Set(model.expires_at),
        };

        self.notification_repo.create(active).await
    }

    // ==================== Queries ====================

    /// Get a notification by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<notification::Model> {
        self.notification_repo.get_by_id(id).await
    }

    /// List notifications for a user, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_user(user_id, limit, offset)
            .await
    }

    /// List notifications in a given status.
    pub async fn list_by_status(
        &self,
        status: NotificationStatus,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo.find_by_status(status, limit).await
    }

    /// List notifications belonging to a campaign.
    pub async fn list_by_campaign(
        &self,
        campaign_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_campaign(campaign_id, limit, offset)
            .await
    }

    // ==================== Lifecycle operations ====================

    /// Cancel a pending notification.
    pub async fn cancel(&self, id: &str) -> AppResult<notification::Model> {
        let rows = self.notification_repo.cancel(id).await?;
        if rows == 0 {
            return match self.notification_repo.find_by_id(id).await? {
                None => Err(AppError::NotFound("Notification not found".to_string())),
                Some(_) => Err(AppError::InvalidState(
                    "Only pending notifications can be cancelled".to_string(),
                )),
            };
        }
        self.notification_repo.get_by_id(id).await
    }

    /// Record that the recipient opened the notification.
    ///
    /// Idempotent; the campaign open counter moves only on the first
    /// call so repeated opens cannot inflate it.
    pub async fn mark_opened(&self, id: &str) -> AppResult<notification::Model> {
        let (model, first) = self.notification_repo.mark_opened(id).await?;
        if first {
            if let Some(campaign_id) = &model.campaign_id {
                self.campaign_repo.increment_opened(campaign_id).await?;
            }
        }
        Ok(model)
    }

    /// Record that the recipient clicked through.
    pub async fn mark_clicked(&self, id: &str) -> AppResult<notification::Model> {
        let (model, first) = self.notification_repo.mark_clicked(id).await?;
        if first {
            if let Some(campaign_id) = &model.campaign_id {
                self.campaign_repo.increment_clicked(campaign_id).await?;
            }
        }
        Ok(model)
    }

    /// Record a delivery confirmation (provider callback).
    pub async fn mark_delivered(&self, id: &str) -> AppResult<notification::Model> {
        let model = self.notification_repo.mark_delivered(id).await?;
        if let Some(campaign_id) = &model.campaign_id {
            self.campaign_repo.increment_delivered(campaign_id).await?;
        }
        Ok(model)
    }

    /// Record a bounce (provider callback).
    pub async fn mark_bounced(&self, id: &str) -> AppResult<notification::Model> {
        let model = self.notification_repo.mark_bounced(id).await?;
        if let Some(campaign_id) = &model.campaign_id {
            self.campaign_repo.increment_bounced(campaign_id).await?;
        }
        Ok(model)
    }

    // ==================== Sweep entry points ====================

    /// Dispatch pending notifications whose time has come.
    pub async fn process_pending(&self) -> AppResult<u64> {
        let due = self
            .notification_repo
            .find_pending_due(self.config.sweep_batch_size)
            .await?;

        let mut dispatched = 0u64;
        for model in due {
            match self.dispatcher.dispatch(&model).await {
                Ok(_) => dispatched += 1,
                Err(e) => warn!(id = %model.id, error = %e, "Pending dispatch failed"),
            }
        }
        Ok(dispatched)
    }

    /// Re-dispatch failed notifications whose cool-down has elapsed.
    ///
    /// The retry count is not pre-incremented here; a failed attempt
    /// increments it through the FAILED transition, so a notification
    /// performs at most `1 + max_retry_count` provider attempts.
    pub async fn retry_failed(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::minutes(self.config.retry_cooldown_minutes);
        let retryable = self
            .notification_repo
            .find_retryable(cutoff, self.config.sweep_batch_size)
            .await?;

        let mut retried = 0u64;
        for model in retryable {
            match self.dispatcher.dispatch(&model).await {
                Ok(_) => retried += 1,
                Err(e) => warn!(id = %model.id, error = %e, "Retry dispatch failed"),
            }
        }
        Ok(retried)
    }

    /// Cancel pending notifications that have expired.
    pub async fn cancel_expired(&self) -> AppResult<u64> {
        self.notification_repo.cancel_expired().await
    }

    /// Delete terminal notifications past the retention window.
    pub async fn cleanup_old(&self) -> AppResult<u64> {
        let days = self.config.cleanup_retention_days;
        let completed = self.notification_repo.delete_old_completed(days).await?;
        let exhausted = self.notification_repo.delete_exhausted_failed(days).await?;
        Ok(completed + exhausted)
    }
}

fn vars_from_json(value: Option<&serde_json::Value>) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    if let Some(serde_json::Value::Object(map)) = value {
        for (key, value) in map {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            vars.insert(key.clone(), rendered);
        }
    }
    vars
}
