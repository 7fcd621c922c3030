//! Notification repository.

use std::sync::Arc;

use chrono::Utc;
use courier_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::notification::{NotificationChannel, NotificationStatus};
use crate::entities::{Notification, notification};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a notification by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<notification::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {id} not found")))
    }

    /// Find notifications for a user, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find notifications by status, oldest first.
    pub async fn find_by_status(
        &self,
        status: NotificationStatus,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::Status.eq(status))
            .order_by_asc(notification::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find notifications belonging to a campaign.
    pub async fn find_by_campaign(
        &self,
        campaign_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::CampaignId.eq(campaign_id))
            .order_by_asc(notification::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count notifications for a user.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether an identical notification to the same user exists since `cutoff`.
    pub async fn exists_duplicate_since(
        &self,
        user_id: &str,
        title: &str,
        content: &str,
        cutoff: chrono::DateTime<Utc>,
    ) -> AppResult<bool> {
        let count = Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Title.eq(title))
            .filter(notification::Column::Content.eq(content))
            .filter(notification::Column::CreatedAt.gte(cutoff))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Find pending notifications that are due for dispatch.
    ///
    /// A notification is due when its scheduled time (if any) has passed
    /// and it has not expired.
    pub async fn find_pending_due(&self, limit: u64) -> AppResult<Vec<notification::Model>> {
        let now = Utc::now();

        Notification::find()
            .filter(notification::Column::Status.eq(NotificationStatus::Pending))
            .filter(
                Condition::any()
                    .add(notification::Column::ScheduledAt.is_null())
                    .add(notification::Column::ScheduledAt.lte(now)),
            )
            .filter(
                Condition::any()
                    .add(notification::Column::ExpiresAt.is_null())
                    .add(notification::Column::ExpiresAt.gt(now)),
            )
            .order_by_asc(notification::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find failed notifications eligible for retry.
    ///
    /// Eligible rows have retries left, a last failure older than
    /// `cooldown_cutoff`, and have not expired.
    pub async fn find_retryable(
        &self,
        cooldown_cutoff: chrono::DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        let now = Utc::now();

        Notification::find()
            .filter(notification::Column::Status.eq(NotificationStatus::Failed))
            .filter(
                Expr::col(notification::Column::RetryCount)
                    .lt(Expr::col(notification::Column::MaxRetryCount)),
            )
            .filter(
                Condition::any()
                    .add(notification::Column::LastErrorAt.is_null())
                    .add(notification::Column::LastErrorAt.lte(cooldown_cutoff)),
            )
            .filter(
                Condition::any()
                    .add(notification::Column::ExpiresAt.is_null())
                    .add(notification::Column::ExpiresAt.gt(now)),
            )
            .order_by_asc(notification::Column::FailedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new notification.
    pub async fn create(&self, model: notification::ActiveModel) -> AppResult<notification::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a notification.
    pub async fn update(&self, model: notification::ActiveModel) -> AppResult<notification::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a notification as sent, recording the provider message id.
    ///
    /// Only PENDING and FAILED notifications may transition to SENT; the
    /// guard lives in the UPDATE itself, so a concurrent sender (sync send
    /// path vs the pending sweep) cannot both win.
    pub async fn mark_sent(
        &self,
        id: &str,
        provider_message_id: &str,
    ) -> AppResult<notification::Model> {
        // The fetch only picks the per-channel message-id column; legality
        // is enforced by the status filter on the UPDATE below.
        let record = self.get_by_id(id).await?;
        let message_id_column = match record.channel {
            NotificationChannel::Email => notification::Column::EmailMessageId,
            NotificationChannel::Sms => notification::Column::SmsMessageSid,
            NotificationChannel::Push | NotificationChannel::InApp => {
                notification::Column::PushMessageId
            }
        };
        let now = Utc::now();

        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Sent),
            )
            .col_expr(message_id_column, Expr::value(provider_message_id))
            .col_expr(notification::Column::SentAt, Expr::value(now))
            .col_expr(notification::Column::UpdatedAt, Expr::value(now))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::Status.is_in([
                NotificationStatus::Pending,
                NotificationStatus::Failed,
            ]))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            let current = self.get_by_id(id).await?;
            return Err(AppError::InvalidState(format!(
                "Notification {id} cannot be sent from {:?}",
                current.status
            )));
        }

        self.get_by_id(id).await
    }

    /// Mark a notification as delivered. Only SENT may transition; the
    /// status guard is part of the UPDATE.
    pub async fn mark_delivered(&self, id: &str) -> AppResult<notification::Model> {
        let now = Utc::now();

        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Delivered),
            )
            .col_expr(notification::Column::DeliveredAt, Expr::value(now))
            .col_expr(notification::Column::UpdatedAt, Expr::value(now))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::Status.eq(NotificationStatus::Sent))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            let current = self.get_by_id(id).await?;
            return Err(AppError::InvalidState(format!(
                "Notification {id} cannot be delivered from {:?}",
                current.status
            )));
        }

        self.get_by_id(id).await
    }

    /// Mark a notification as failed.
    ///
    /// This is the single place where `retry_count` is incremented, so
    /// a notification performs at most `1 + max_retry_count` attempts.
    /// The increment happens in the database, so concurrent failures do
    /// not lose counts.
    pub async fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        error_code: &str,
    ) -> AppResult<notification::Model> {
        let now = Utc::now();

        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Failed),
            )
            .col_expr(
                notification::Column::ErrorMessage,
                Expr::value(error_message),
            )
            .col_expr(notification::Column::ErrorCode, Expr::value(error_code))
            .col_expr(
                notification::Column::RetryCount,
                Expr::col(notification::Column::RetryCount).add(1),
            )
            .col_expr(notification::Column::FailedAt, Expr::value(now))
            .col_expr(notification::Column::LastErrorAt, Expr::value(now))
            .col_expr(notification::Column::UpdatedAt, Expr::value(now))
            .filter(notification::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Notification {id} not found")));
        }

        self.get_by_id(id).await
    }

    /// Mark a notification as bounced, incrementing the bounce counter
    /// in the database.
    pub async fn mark_bounced(&self, id: &str) -> AppResult<notification::Model> {
        let now = Utc::now();

        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Bounced),
            )
            .col_expr(
                notification::Column::BounceCount,
                Expr::col(notification::Column::BounceCount).add(1),
            )
            .col_expr(notification::Column::UpdatedAt, Expr::value(now))
            .filter(notification::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Notification {id} not found")));
        }

        self.get_by_id(id).await
    }

    /// Cancel a pending notification.
    ///
    /// Issues a conditional UPDATE; returns the number of rows affected.
    /// Zero means the notification does not exist or is not PENDING.
    pub async fn cancel(&self, id: &str) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Cancelled),
            )
            .col_expr(notification::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::Status.eq(NotificationStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Cancel all pending notifications of a campaign.
    pub async fn cancel_by_campaign(&self, campaign_id: &str) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Cancelled),
            )
            .col_expr(notification::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(notification::Column::CampaignId.eq(campaign_id))
            .filter(notification::Column::Status.eq(NotificationStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Record an open. Safe to call repeatedly: every call refreshes the
    /// timestamp, so the stored value is the most recent open.
    ///
    /// Returns the record and whether this call was the first open.
    pub async fn mark_opened(&self, id: &str) -> AppResult<(notification::Model, bool)> {
        let record = self.get_by_id(id).await?;
        let first = record.opened_at.is_none();
        let now = Utc::now();

        let mut active: notification::ActiveModel = record.into();
        active.opened_at = Set(Some(now.into()));
        active.updated_at = Set(Some(now.into()));
        let updated = self.update(active).await?;
        Ok((updated, first))
    }

    /// Record a click-through. Last call wins, like [`Self::mark_opened`].
    pub async fn mark_clicked(&self, id: &str) -> AppResult<(notification::Model, bool)> {
        let record = self.get_by_id(id).await?;
        let first = record.clicked_at.is_none();
        let now = Utc::now();

        let mut active: notification::ActiveModel = record.into();
        active.clicked_at = Set(Some(now.into()));
        active.updated_at = Set(Some(now.into()));
        let updated = self.update(active).await?;
        Ok((updated, first))
    }

    /// Cancel pending notifications whose expiry has passed.
    pub async fn cancel_expired(&self) -> AppResult<u64> {
        let now = Utc::now();

        let result = Notification::update_many()
            .col_expr(
                notification::Column::Status,
                Expr::value(NotificationStatus::Cancelled),
            )
            .col_expr(notification::Column::UpdatedAt, Expr::value(now))
            .filter(notification::Column::Status.eq(NotificationStatus::Pending))
            .filter(notification::Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete old delivered/cancelled notifications (cleanup).
    pub async fn delete_old_completed(&self, older_than_days: i64) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);

        let result = Notification::delete_many()
            .filter(
                notification::Column::Status
                    .eq(NotificationStatus::Delivered)
                    .or(notification::Column::Status.eq(NotificationStatus::Cancelled)),
            )
            .filter(notification::Column::CreatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete old failed notifications that exhausted their retries.
    pub async fn delete_exhausted_failed(&self, older_than_days: i64) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);

        let result = Notification::delete_many()
            .filter(notification::Column::Status.eq(NotificationStatus::Failed))
            .filter(
                Expr::col(notification::Column::RetryCount)
                    .gte(Expr::col(notification::Column::MaxRetryCount)),
            )
            .filter(notification::Column::CreatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::notification::NotificationPriority;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_notification(id: &str, status: NotificationStatus) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            user_id: Some("user1".to_string()),
            recipient_email: Some("a@example.com".to_string()),
            recipient_phone: None,
            recipient_name: None,
            channel: NotificationChannel::Email,
            status,
            priority: NotificationPriority::Normal,
            template_id: None,
            campaign_id: None,
            title: "Title".to_string(),
            content: "Body".to_string(),
            html_content: None,
            subject: Some("Subject".to_string()),
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

    #[tokio::test]
    async fn test_find_by_id() {
        let record = create_test_notification("n1", NotificationStatus::Pending);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[record.clone()]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.find_by_id("n1").await.unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().id, "n1");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<notification::Model>::new()])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.get_by_id("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_exists_duplicate_since() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1))
                }]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let exists = repo
            .exists_duplicate_since("user1", "Title", "Body", Utc::now())
            .await
            .unwrap();
        assert!(exists);
    }

    #[tokio::test]
    async fn test_mark_sent_from_pending() {
        let pending = create_test_notification("n1", NotificationStatus::Pending);
        let mut sent = pending.clone();
        sent.status = NotificationStatus::Sent;
        sent.email_message_id = Some("msg-1".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![pending], vec![sent]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.mark_sent("n1", "msg-1").await.unwrap();
        assert_eq!(result.status, NotificationStatus::Sent);
        assert_eq!(result.email_message_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_mark_sent_rejects_cancelled() {
        let record = create_test_notification("n1", NotificationStatus::Cancelled);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![record.clone()], vec![record]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.mark_sent("n1", "msg-1").await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_mark_sent_detects_concurrent_transition() {
        // The record is PENDING at fetch time, but another worker sends
        // it before our conditional UPDATE lands: zero rows affected.
        let pending = create_test_notification("n1", NotificationStatus::Pending);
        let mut sent = pending.clone();
        sent.status = NotificationStatus::Sent;
        sent.email_message_id = Some("other".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![pending], vec![sent]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.mark_sent("n1", "msg-1").await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_mark_delivered_requires_sent() {
        let record = create_test_notification("n1", NotificationStatus::Pending);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .append_query_results([[record]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.mark_delivered("n1").await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_mark_failed_increments_retry_count() {
        let mut failed = create_test_notification("n1", NotificationStatus::Failed);
        failed.retry_count = 1;
        failed.error_code = Some("SEND_ERROR".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[failed]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let result = repo.mark_failed("n1", "boom", "SEND_ERROR").await.unwrap();
        assert_eq!(result.status, NotificationStatus::Failed);
        assert_eq!(result.retry_count, 1);
    }

    #[tokio::test]
    async fn test_cancel_returns_rows_affected() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let rows = repo.cancel("n1").await.unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_mark_opened_flags_first_open() {
        let record = create_test_notification("n1", NotificationStatus::Delivered);
        let mut opened = record.clone();
        opened.opened_at = Some(Utc::now().into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![record], vec![opened]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let (returned, first) = repo.mark_opened("n1").await.unwrap();
        assert!(first);
        assert!(returned.opened_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_opened_refreshes_timestamp() {
        // An hour-old open gets overwritten by a later one.
        let first_open: sea_orm::prelude::DateTimeWithTimeZone =
            (Utc::now() - chrono::Duration::hours(1)).into();
        let mut record = create_test_notification("n1", NotificationStatus::Delivered);
        record.opened_at = Some(first_open);
        let mut reopened = record.clone();
        reopened.opened_at = Some(Utc::now().into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![record], vec![reopened]])
                .into_connection(),
        );

        let repo = NotificationRepository::new(db);
        let (returned, first) = repo.mark_opened("n1").await.unwrap();
        assert!(!first);
        assert!(returned.opened_at.unwrap() > first_open);
    }
}
