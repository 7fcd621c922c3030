//! Campaign lifecycle and fan-out execution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_common::config::NotificationConfig;
use courier_common::{AppError, AppResult, id::IdGenerator};
use courier_db::entities::notification::{NotificationChannel, NotificationPriority};
use courier_db::entities::notification_campaign::{self, CampaignStatus, CampaignType};
use courier_db::repositories::{CampaignRepository, NotificationRepository, TemplateRepository};
use rust_decimal::Decimal;
use sea_orm::Set;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::notification::{NotificationService, SendNotificationInput};
use crate::services::targeting::{CampaignTarget, TargetResolver};

/// Input for creating a campaign.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2048))]
    pub description: Option<String>,
    pub campaign_type: CampaignType,
    pub template_id: Option<String>,
    pub target_user_ids: Option<serde_json::Value>,
    pub target_audience: Option<serde_json::Value>,
    pub target_segments: Option<serde_json::Value>,
    pub scheduled_start_at: Option<DateTime<Utc>>,
    pub scheduled_end_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub max_recipients: Option<i32>,
    #[serde(default = "default_campaign_priority")]
    pub priority: String,
    pub budget_limit: Option<Decimal>,
    pub cost_per_notification: Option<Decimal>,
    #[serde(default)]
    pub is_ab_test: bool,
    #[validate(range(min = 1, max = 100))]
    pub ab_test_percentage: Option<i32>,
    pub ab_variant: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub tracking_params: Option<serde_json::Value>,
    pub created_by: Option<String>,
}

fn default_campaign_priority() -> String {
    "normal".to_string()
}

/// Input for updating a DRAFT campaign. `None` leaves a field unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub template_id: Option<Option<String>>,
    pub target_user_ids: Option<serde_json::Value>,
    pub scheduled_start_at: Option<Option<DateTime<Utc>>>,
    pub scheduled_end_at: Option<Option<DateTime<Utc>>>,
    #[validate(range(min = 1))]
    pub max_recipients: Option<i32>,
    pub priority: Option<String>,
    pub budget_limit: Option<Option<Decimal>>,
    pub cost_per_notification: Option<Option<Decimal>>,
    pub metadata: Option<serde_json::Value>,
    pub tracking_params: Option<serde_json::Value>,
}

/// Service orchestrating notification campaigns.
#[derive(Clone)]
pub struct CampaignService {
    campaign_repo: CampaignRepository,
    notification_repo: NotificationRepository,
    template_repo: TemplateRepository,
    notification_service: NotificationService,
    targets: Arc<dyn TargetResolver>,
    config: NotificationConfig,
    id_gen: IdGenerator,
}

impl CampaignService {
    /// Create a new campaign service.
    #[must_use]
    pub fn new(
        campaign_repo: CampaignRepository,
        notification_repo: NotificationRepository,
        template_repo: TemplateRepository,
        notification_service: NotificationService,
        targets: Arc<dyn TargetResolver>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            campaign_repo,
            notification_repo,
            template_repo,
            notification_service,
            targets,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a campaign by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<notification_campaign::Model> {
        self.campaign_repo.get_by_id(id).await
    }

    /// List campaigns, newest first.
    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification_campaign::Model>> {
        self.campaign_repo.list(limit, offset).await
    }

    /// Create a campaign.
    ///
    /// A scheduled start time puts it straight into SCHEDULED so the
    /// sweeper promotes it; otherwise it waits in DRAFT for a manual
    /// start.
    pub async fn create(
        &self,
        input: CreateCampaignInput,
    ) -> AppResult<notification_campaign::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if input.is_ab_test && input.ab_test_percentage.is_none() {
            return Err(AppError::Validation(
                "A/B test campaigns require a test percentage".to_string(),
            ));
        }

        if self.campaign_repo.exists_by_name(&input.name).await? {
            return Err(AppError::Duplicate(format!(
                "A campaign named '{}' already exists",
                input.name
            )));
        }

        if let Some(template_id) = &input.template_id {
            self.template_repo.get_by_id(template_id).await?;
        }

        let status = if input.scheduled_start_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        let model = notification_campaign::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name),
            description: Set(input.description),
            campaign_type: Set(input.campaign_type),
            status: Set(status),
            template_id: Set(input.template_id),
            target_audience: Set(input.target_audience),
            target_user_ids: Set(input.target_user_ids),
            target_segments: Set(input.target_segments),
            scheduled_start_at: Set(input.scheduled_start_at.map(Into::into)),
            scheduled_end_at: Set(input.scheduled_end_at.map(Into::into)),
            started_at: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
            is_active: Set(true),
            is_recurring: Set(false),
            recurrence_pattern: Set(None),
            max_recipients: Set(input.max_recipients),
            priority: Set(input.priority),
            budget_limit: Set(input.budget_limit),
            cost_per_notification: Set(input.cost_per_notification),
            total_recipients: Set(0),
            sent_count: Set(0),
            delivered_count: Set(0),
            failed_count: Set(0),
            opened_count: Set(0),
            clicked_count: Set(0),
            bounced_count: Set(0),
            unsubscribed_count: Set(0),
            total_cost: Set(Decimal::ZERO),
            is_ab_test: Set(input.is_ab_test),
            ab_test_percentage: Set(input.ab_test_percentage),
            ab_variant: Set(input.ab_variant),
            metadata: Set(input.metadata),
            tracking_params: Set(input.tracking_params),
            created_by: Set(input.created_by),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        self.campaign_repo.create(model).await
    }

    /// Update a DRAFT campaign.
    pub async fn update(
        &self,
        id: &str,
        input: UpdateCampaignInput,
    ) -> AppResult<notification_campaign::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let campaign = self.campaign_repo.get_by_id(id).await?;
        if campaign.status != CampaignStatus::Draft {
            return Err(AppError::InvalidState(
                "Only draft campaigns can be edited".to_string(),
            ));
        }

        if let Some(template_id) = input.template_id.as_ref().and_then(|t| t.as_ref()) {
            self.template_repo.get_by_id(template_id).await?;
        }

        let mut active: notification_campaign::ActiveModel = campaign.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(template_id) = input.template_id {
            active.template_id = Set(template_id);
        }
        if let Some(target_user_ids) = input.target_user_ids {
            active.target_user_ids = Set(Some(target_user_ids));
        }
        if let Some(scheduled_start_at) = input.scheduled_start_at {
            active.scheduled_start_at = Set(scheduled_start_at.map(Into::into));
        }
        if let Some(scheduled_end_at) = input.scheduled_end_at {
            active.scheduled_end_at = Set(scheduled_end_at.map(Into::into));
        }
        if let Some(max_recipients) = input.max_recipients {
            active.max_recipients = Set(Some(max_recipients));
        }
        if let Some(priority) = input.priority {
            active.priority = Set(priority);
        }
        if let Some(budget_limit) = input.budget_limit {
            active.budget_limit = Set(budget_limit);
        }
        if let Some(cost_per_notification) = input.cost_per_notification {
            active.cost_per_notification = Set(cost_per_notification);
        }
        if let Some(metadata) = input.metadata {
            active.metadata = Set(Some(metadata));
        }
        if let Some(tracking_params) = input.tracking_params {
            active.tracking_params = Set(Some(tracking_params));
        }

        active.updated_at = Set(Some(Utc::now().into()));

        self.campaign_repo.update(active).await
    }

    /// Delete a campaign that never ran.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let campaign = self.campaign_repo.get_by_id(id).await?;
        if !matches!(
            campaign.status,
            CampaignStatus::Draft | CampaignStatus::Cancelled
        ) {
            return Err(AppError::InvalidState(
                "Only draft or cancelled campaigns can be deleted".to_string(),
            ));
        }
        self.campaign_repo.delete(id).await
    }

    /// Start a campaign, marking it RUNNING.
    ///
    /// Fan-out happens separately through [`Self::execute`].
    pub async fn start(&self, id: &str) -> AppResult<notification_campaign::Model> {
        let campaign = self.campaign_repo.get_by_id(id).await?;
        if !campaign.can_start() {
            return Err(AppError::InvalidState(
                "Only draft or scheduled campaigns can be started".to_string(),
            ));
        }

        let mut targets = self.targets.resolve(&campaign).await?;
        cap_targets(&mut targets, campaign.max_recipients);
        let total = i32::try_from(targets.len()).unwrap_or(i32::MAX);

        let rows = self.campaign_repo.mark_started(id, total).await?;
        if rows == 0 {
            return Err(AppError::InvalidState(
                "Campaign was started concurrently".to_string(),
            ));
        }

        info!(id = %id, recipients = total, "Campaign started");
        self.campaign_repo.get_by_id(id).await
    }

    /// Fan a RUNNING campaign out to its targets.
    ///
    /// The campaign row is refetched before every target so the budget
    /// admission check sees costs added concurrently; crossing the
    /// budget pauses the campaign instead of overrunning it. Returns the
    /// number of notifications submitted.
    pub async fn execute(&self, id: &str) -> AppResult<u64> {
        let campaign = self.campaign_repo.get_by_id(id).await?;
        if !campaign.is_running() {
            return Err(AppError::InvalidState(
                "Only running campaigns can be executed".to_string(),
            ));
        }

        let mut targets = self.targets.resolve(&campaign).await?;
        cap_targets(&mut targets, campaign.max_recipients);

        if targets.is_empty() {
            self.campaign_repo.mark_completed(id).await?;
            info!(id = %id, "Campaign completed with no targets");
            return Ok(0);
        }

        let cost = campaign.cost_per_notification.unwrap_or(Decimal::ZERO);
        let mut submitted = 0u64;

        for target in targets {
            let current = self.campaign_repo.get_by_id(id).await?;
            if !current.is_running() {
                info!(id = %id, "Campaign no longer running, stopping fan-out");
                return Ok(submitted);
            }

            if !current.within_budget(cost) {
                self.campaign_repo.mark_paused(id).await?;
                warn!(id = %id, "Campaign paused: budget limit reached");
                return Ok(submitted);
            }

            let input = build_send_input(&current, &target);
            match self.notification_service.send(input).await {
                Ok(_) => {
                    self.campaign_repo.increment_sent(id).await?;
                    if cost > Decimal::ZERO {
                        self.campaign_repo.add_cost(id, cost).await?;
                    }
                    submitted += 1;
                }
                Err(e) => {
                    warn!(id = %id, user_id = %target.user_id, error = %e, "Campaign send failed");
                    self.campaign_repo.increment_failed(id).await?;
                }
            }
        }

        let finished = self.campaign_repo.get_by_id(id).await?;
        if finished.is_running() {
            self.campaign_repo.mark_completed(id).await?;
            info!(id = %id, submitted, "Campaign completed");
        }
        Ok(submitted)
    }

    /// Pause a running campaign.
    pub async fn pause(&self, id: &str) -> AppResult<notification_campaign::Model> {
        let rows = self.campaign_repo.mark_paused(id).await?;
        self.require_transition(id, rows, "Only running campaigns can be paused")
            .await
    }

    /// Resume a paused campaign.
    ///
    /// The caller re-runs [`Self::execute`] afterwards; the target list
    /// is re-resolved in full.
    pub async fn resume(&self, id: &str) -> AppResult<notification_campaign::Model> {
        let rows = self.campaign_repo.mark_resumed(id).await?;
        self.require_transition(id, rows, "Only paused campaigns can be resumed")
            .await
    }

    /// Complete a campaign.
    pub async fn complete(&self, id: &str) -> AppResult<notification_campaign::Model> {
        let rows = self.campaign_repo.mark_completed(id).await?;
        self.require_transition(id, rows, "Only running or paused campaigns can be completed")
            .await
    }

    /// Cancel a campaign and its still-pending notifications.
    pub async fn cancel(&self, id: &str) -> AppResult<notification_campaign::Model> {
        let rows = self.campaign_repo.mark_cancelled(id).await?;
        let campaign = self
            .require_transition(id, rows, "This campaign can no longer be cancelled")
            .await?;

        let cancelled = self.notification_repo.cancel_by_campaign(id).await?;
        if cancelled > 0 {
            info!(id = %id, cancelled, "Cancelled pending campaign notifications");
        }
        Ok(campaign)
    }

    async fn require_transition(
        &self,
        id: &str,
        rows: u64,
        message: &str,
    ) -> AppResult<notification_campaign::Model> {
        if rows == 0 {
            return match self.campaign_repo.find_by_id(id).await? {
                None => Err(AppError::NotFound("Campaign not found".to_string())),
                Some(_) => Err(AppError::InvalidState(message.to_string())),
            };
        }
        self.campaign_repo.get_by_id(id).await
    }

    // ==================== Counter passthroughs ====================

    /// Record a delivery confirmation against the campaign.
    pub async fn record_delivered(&self, id: &str) -> AppResult<()> {
        self.campaign_repo.increment_delivered(id).await
    }

    /// Record an open against the campaign.
    pub async fn record_opened(&self, id: &str) -> AppResult<()> {
        self.campaign_repo.increment_opened(id).await
    }

    /// Record a click against the campaign.
    pub async fn record_clicked(&self, id: &str) -> AppResult<()> {
        self.campaign_repo.increment_clicked(id).await
    }

    /// Record a bounce against the campaign.
    pub async fn record_bounced(&self, id: &str) -> AppResult<()> {
        self.campaign_repo.increment_bounced(id).await
    }

    /// Record an unsubscribe against the campaign.
    pub async fn record_unsubscribed(&self, id: &str) -> AppResult<()> {
        self.campaign_repo.increment_unsubscribed(id).await
    }

    // ==================== Sweep entry points ====================

    /// Promote due SCHEDULED campaigns and close out RUNNING campaigns
    /// past their end time. Per-campaign failures are isolated.
    pub async fn process_scheduled(&self) -> AppResult<u64> {
        let batch = self.config.sweep_batch_size;
        let mut processed = 0u64;

        for campaign in self.campaign_repo.find_ready_to_start(batch).await? {
            match self.start(&campaign.id).await {
                Ok(_) => {
                    if let Err(e) = self.execute(&campaign.id).await {
                        warn!(id = %campaign.id, error = %e, "Campaign execution failed");
                    }
                    processed += 1;
                }
                Err(e) => warn!(id = %campaign.id, error = %e, "Campaign promotion failed"),
            }
        }

        for campaign in self.campaign_repo.find_past_end(batch).await? {
            match self.campaign_repo.mark_completed(&campaign.id).await {
                Ok(rows) if rows > 0 => {
                    info!(id = %campaign.id, "Campaign completed at scheduled end");
                    processed += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(id = %campaign.id, error = %e, "Campaign completion failed"),
            }
        }

        Ok(processed)
    }

    /// Delete terminal campaigns past the retention window.
    pub async fn cleanup_old(&self) -> AppResult<u64> {
        self.campaign_repo
            .delete_old_terminal(self.config.cleanup_retention_days)
            .await
    }
}

fn cap_targets(targets: &mut Vec<CampaignTarget>, max_recipients: Option<i32>) {
    if let Some(max) = max_recipients {
        let max = usize::try_from(max).unwrap_or(0);
        if targets.len() > max {
            targets.truncate(max);
        }
    }
}

/// Channel a campaign's notifications go out on.
const fn channel_for(campaign_type: CampaignType) -> NotificationChannel {
    match campaign_type {
        CampaignType::EmailMarketing | CampaignType::Newsletter | CampaignType::ReEngagement => {
            NotificationChannel::Email
        }
        CampaignType::SmsMarketing => NotificationChannel::Sms,
        CampaignType::PushMarketing => NotificationChannel::Push,
        CampaignType::Announcement => NotificationChannel::InApp,
    }
}

fn parse_priority(priority: &str) -> NotificationPriority {
    match priority {
        "low" => NotificationPriority::Low,
        "high" => NotificationPriority::High,
        "urgent" => NotificationPriority::Urgent,
        _ => NotificationPriority::Normal,
    }
}

fn build_send_input(
    campaign: &notification_campaign::Model,
    target: &CampaignTarget,
) -> SendNotificationInput {
    // Without a template, the campaign name doubles as the subject line.
    let subject = if campaign.template_id.is_some() {
        None
    } else {
        Some(campaign.name.clone())
    };

    SendNotificationInput {
        user_id: Some(target.user_id.clone()),
        recipient_email: target.email.clone(),
        recipient_phone: target.phone.clone(),
        recipient_name: None,
        channel: channel_for(campaign.campaign_type),
        priority: parse_priority(&campaign.priority),
        template_id: campaign.template_id.clone(),
        campaign_id: Some(campaign.id.clone()),
        title: campaign.name.clone(),
        content: campaign
            .description
            .clone()
            .unwrap_or_else(|| format!("Update from the {} campaign", campaign.name)),
        html_content: None,
        subject,
        push_token: target.push_token.clone(),
        platform: target.platform.clone(),
        template_vars: Some(serde_json::json!({
            "campaign_name": campaign.name,
            "user_id": target.user_id,
        })),
        scheduled_at: None,
        expires_at: campaign.scheduled_end_at.map(|d| d.with_timezone(&Utc)),
        max_retry_count: None,
        metadata: None,
        tracking_data: campaign.tracking_params.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::channel::ChannelDispatcher;
    use crate::services::providers::{NoOpEmail, NoOpPush, NoOpSms};
    use crate::services::targeting::StaticListResolver;
    use crate::services::template::TemplateService;
    use courier_db::repositories::DeviceTokenRepository;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use serde_json::json;

    fn service(db: Arc<DatabaseConnection>) -> CampaignService {
        let dispatcher = ChannelDispatcher::new(
            NotificationRepository::new(db.clone()),
            CampaignRepository::new(db.clone()),
            DeviceTokenRepository::new(db.clone()),
            Arc::new(NoOpEmail),
            Arc::new(NoOpSms),
            Arc::new(NoOpPush),
        );
        let notification_service = NotificationService::new(
            NotificationRepository::new(db.clone()),
            CampaignRepository::new(db.clone()),
            TemplateService::new(TemplateRepository::new(db.clone())),
            dispatcher,
            NotificationConfig::default(),
        );
        CampaignService::new(
            CampaignRepository::new(db.clone()),
            NotificationRepository::new(db.clone()),
            TemplateRepository::new(db),
            notification_service,
            Arc::new(StaticListResolver),
            NotificationConfig::default(),
        )
    }

    fn test_campaign(id: &str, status: CampaignStatus) -> notification_campaign::Model {
        notification_campaign::Model {
            id: id.to_string(),
            name: "Spring launch".to_string(),
            description: Some("It's here".to_string()),
            campaign_type: CampaignType::Announcement,
            status,
            template_id: None,
            target_audience: None,
            target_user_ids: None,
            target_segments: None,
            scheduled_start_at: None,
            scheduled_end_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            is_active: true,
            is_recurring: false,
            recurrence_pattern: None,
            max_recipients: None,
            priority: "normal".to_string(),
            budget_limit: None,
            cost_per_notification: None,
            total_recipients: 0,
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            opened_count: 0,
            clicked_count: 0,
            bounced_count: 0,
            unsubscribed_count: 0,
            total_cost: Decimal::ZERO,
            is_ab_test: false,
            ab_test_percentage: None,
            ab_variant: None,
            metadata: None,
            tracking_params: None,
            created_by: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1)),
                }]])
                .into_connection(),
        );
        let svc = service(db);

        let input = CreateCampaignInput {
            name: "Spring launch".to_string(),
            description: None,
            campaign_type: CampaignType::Announcement,
            template_id: None,
            target_user_ids: None,
            target_audience: None,
            target_segments: None,
            scheduled_start_at: None,
            scheduled_end_at: None,
            max_recipients: None,
            priority: "normal".to_string(),
            budget_limit: None,
            cost_per_notification: None,
            is_ab_test: false,
            ab_test_percentage: None,
            ab_variant: None,
            metadata: None,
            tracking_params: None,
            created_by: None,
        };

        let result = svc.create(input).await;
        assert!(matches!(result, Err(AppError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_start_rejects_running_campaign() {
        let campaign = test_campaign("c1", CampaignStatus::Running);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[campaign]])
                .into_connection(),
        );
        let svc = service(db);

        let result = svc.start("c1").await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_execute_completes_immediately_without_targets() {
        let campaign = test_campaign("c1", CampaignStatus::Running);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[campaign]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let svc = service(db);

        let submitted = svc.execute("c1").await.unwrap();
        assert_eq!(submitted, 0);
    }

    #[tokio::test]
    async fn test_execute_pauses_when_budget_would_be_exceeded() {
        let mut campaign = test_campaign("c1", CampaignStatus::Running);
        campaign.target_user_ids = Some(json!(["u1", "u2"]));
        campaign.budget_limit = Some(Decimal::new(10, 0));
        campaign.cost_per_notification = Some(Decimal::new(6, 0));
        campaign.total_cost = Decimal::new(6, 0);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // initial fetch, then per-target refetch
                .append_query_results([[campaign.clone()], [campaign]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let svc = service(db);

        let submitted = svc.execute("c1").await.unwrap();
        assert_eq!(submitted, 0);
    }

    #[tokio::test]
    async fn test_delete_rejects_running_campaign() {
        let campaign = test_campaign("c1", CampaignStatus::Running);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[campaign]])
                .into_connection(),
        );
        let svc = service(db);

        let result = svc.delete("c1").await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }
}
