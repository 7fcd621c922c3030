//! Notification campaign repository.

use std::sync::Arc;

use chrono::Utc;
use courier_common::{AppError, AppResult};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::entities::notification_campaign::CampaignStatus;
use crate::entities::{NotificationCampaign, notification_campaign};

/// Campaign repository for database operations.
///
/// State transitions are conditional UPDATEs keyed on the current
/// status; counter mutations are single-statement atomic increments so
/// concurrent dispatches never lose updates.
#[derive(Clone)]
pub struct CampaignRepository {
    db: Arc<DatabaseConnection>,
}

impl CampaignRepository {
    /// Create a new campaign repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a campaign by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification_campaign::Model>> {
        NotificationCampaign::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a campaign by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<notification_campaign::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {id} not found")))
    }

    /// Whether a campaign with the given name already exists.
    pub async fn exists_by_name(&self, name: &str) -> AppResult<bool> {
        let count = NotificationCampaign::find()
            .filter(notification_campaign::Column::Name.eq(name))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// List campaigns, newest first.
    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification_campaign::Model>> {
        NotificationCampaign::find()
            .order_by_desc(notification_campaign::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List campaigns with a given status.
    pub async fn find_by_status(
        &self,
        status: CampaignStatus,
        limit: u64,
    ) -> AppResult<Vec<notification_campaign::Model>> {
        NotificationCampaign::find()
            .filter(notification_campaign::Column::Status.eq(status))
            .order_by_asc(notification_campaign::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find scheduled campaigns whose start time has arrived.
    pub async fn find_ready_to_start(
        &self,
        limit: u64,
    ) -> AppResult<Vec<notification_campaign::Model>> {
        let now = Utc::now();

        NotificationCampaign::find()
            .filter(notification_campaign::Column::Status.eq(CampaignStatus::Scheduled))
            .filter(notification_campaign::Column::IsActive.eq(true))
            .filter(notification_campaign::Column::ScheduledStartAt.lte(now))
            .order_by_asc(notification_campaign::Column::ScheduledStartAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find running campaigns whose end time has passed.
    pub async fn find_past_end(&self, limit: u64) -> AppResult<Vec<notification_campaign::Model>> {
        let now = Utc::now();

        NotificationCampaign::find()
            .filter(notification_campaign::Column::Status.eq(CampaignStatus::Running))
            .filter(notification_campaign::Column::ScheduledEndAt.lte(now))
            .order_by_asc(notification_campaign::Column::ScheduledEndAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new campaign.
    pub async fn create(
        &self,
        model: notification_campaign::ActiveModel,
    ) -> AppResult<notification_campaign::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a campaign.
    pub async fn update(
        &self,
        model: notification_campaign::ActiveModel,
    ) -> AppResult<notification_campaign::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a campaign row.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        NotificationCampaign::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Transition DRAFT|SCHEDULED -> RUNNING, recording the target count.
    ///
    /// Returns rows affected; zero means the campaign was not startable.
    pub async fn mark_started(&self, id: &str, total_recipients: i32) -> AppResult<u64> {
        let now = Utc::now();

        let result = NotificationCampaign::update_many()
            .col_expr(
                notification_campaign::Column::Status,
                Expr::value(CampaignStatus::Running),
            )
            .col_expr(notification_campaign::Column::StartedAt, Expr::value(now))
            .col_expr(
                notification_campaign::Column::TotalRecipients,
                Expr::value(total_recipients),
            )
            .col_expr(notification_campaign::Column::UpdatedAt, Expr::value(now))
            .filter(notification_campaign::Column::Id.eq(id))
            .filter(
                notification_campaign::Column::Status
                    .eq(CampaignStatus::Draft)
                    .or(notification_campaign::Column::Status.eq(CampaignStatus::Scheduled)),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Transition RUNNING -> PAUSED.
    pub async fn mark_paused(&self, id: &str) -> AppResult<u64> {
        let result = NotificationCampaign::update_many()
            .col_expr(
                notification_campaign::Column::Status,
                Expr::value(CampaignStatus::Paused),
            )
            .col_expr(
                notification_campaign::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(notification_campaign::Column::Id.eq(id))
            .filter(notification_campaign::Column::Status.eq(CampaignStatus::Running))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Transition PAUSED -> RUNNING.
    pub async fn mark_resumed(&self, id: &str) -> AppResult<u64> {
        let result = NotificationCampaign::update_many()
            .col_expr(
                notification_campaign::Column::Status,
                Expr::value(CampaignStatus::Running),
            )
            .col_expr(
                notification_campaign::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(notification_campaign::Column::Id.eq(id))
            .filter(notification_campaign::Column::Status.eq(CampaignStatus::Paused))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Transition RUNNING|PAUSED -> COMPLETED.
    pub async fn mark_completed(&self, id: &str) -> AppResult<u64> {
        let now = Utc::now();

        let result = NotificationCampaign::update_many()
            .col_expr(
                notification_campaign::Column::Status,
                Expr::value(CampaignStatus::Completed),
            )
            .col_expr(notification_campaign::Column::CompletedAt, Expr::value(now))
            .col_expr(notification_campaign::Column::UpdatedAt, Expr::value(now))
            .filter(notification_campaign::Column::Id.eq(id))
            .filter(
                notification_campaign::Column::Status
                    .eq(CampaignStatus::Running)
                    .or(notification_campaign::Column::Status.eq(CampaignStatus::Paused)),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Transition any non-terminal status -> CANCELLED.
    pub async fn mark_cancelled(&self, id: &str) -> AppResult<u64> {
        let now = Utc::now();

        let result = NotificationCampaign::update_many()
            .col_expr(
                notification_campaign::Column::Status,
                Expr::value(CampaignStatus::Cancelled),
            )
            .col_expr(notification_campaign::Column::CancelledAt, Expr::value(now))
            .col_expr(notification_campaign::Column::UpdatedAt, Expr::value(now))
            .filter(notification_campaign::Column::Id.eq(id))
            .filter(
                notification_campaign::Column::Status.is_in([
                    CampaignStatus::Draft,
                    CampaignStatus::Scheduled,
                    CampaignStatus::Running,
                    CampaignStatus::Paused,
                ]),
            )
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    async fn increment(
        &self,
        id: &str,
        column: notification_campaign::Column,
    ) -> AppResult<()> {
        NotificationCampaign::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(notification_campaign::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Atomically increment the sent counter.
    pub async fn increment_sent(&self, id: &str) -> AppResult<()> {
        self.increment(id, notification_campaign::Column::SentCount)
            .await
    }

    /// Atomically increment the delivered counter.
    pub async fn increment_delivered(&self, id: &str) -> AppResult<()> {
        self.increment(id, notification_campaign::Column::DeliveredCount)
            .await
    }

    /// Atomically increment the failed counter.
    pub async fn increment_failed(&self, id: &str) -> AppResult<()> {
        self.increment(id, notification_campaign::Column::FailedCount)
            .await
    }

    /// Atomically increment the opened counter.
    pub async fn increment_opened(&self, id: &str) -> AppResult<()> {
        self.increment(id, notification_campaign::Column::OpenedCount)
            .await
    }

    /// Atomically increment the clicked counter.
    pub async fn increment_clicked(&self, id: &str) -> AppResult<()> {
        self.increment(id, notification_campaign::Column::ClickedCount)
            .await
    }

    /// Atomically increment the bounced counter.
    pub async fn increment_bounced(&self, id: &str) -> AppResult<()> {
        self.increment(id, notification_campaign::Column::BouncedCount)
            .await
    }

    /// Atomically increment the unsubscribed counter.
    pub async fn increment_unsubscribed(&self, id: &str) -> AppResult<()> {
        self.increment(id, notification_campaign::Column::UnsubscribedCount)
            .await
    }

    /// Atomically add to the accumulated spend.
    pub async fn add_cost(&self, id: &str, amount: Decimal) -> AppResult<()> {
        NotificationCampaign::update_many()
            .col_expr(
                notification_campaign::Column::TotalCost,
                Expr::col(notification_campaign::Column::TotalCost).add(amount),
            )
            .filter(notification_campaign::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete old terminal campaigns (cleanup).
    pub async fn delete_old_terminal(&self, older_than_days: i64) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);

        let result = NotificationCampaign::delete_many()
            .filter(notification_campaign::Column::Status.is_in([
                CampaignStatus::Completed,
                CampaignStatus::Cancelled,
                CampaignStatus::Failed,
            ]))
            .filter(notification_campaign::Column::CreatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
