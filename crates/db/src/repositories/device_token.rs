//! Device token repository.

use std::sync::Arc;

use chrono::Utc;
use courier_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::{DeviceToken, device_token};

/// Device token repository for database operations.
#[derive(Clone)]
pub struct DeviceTokenRepository {
    db: Arc<DatabaseConnection>,
}

impl DeviceTokenRepository {
    /// Create a new device token repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a registration by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<device_token::Model>> {
        DeviceToken::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a registration by its raw token value.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<device_token::Model>> {
        DeviceToken::find()
            .filter(device_token::Column::DeviceToken.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List active, valid registrations for a user.
    pub async fn find_active_by_user(&self, user_id: &str) -> AppResult<Vec<device_token::Model>> {
        DeviceToken::find()
            .filter(device_token::Column::UserId.eq(user_id))
            .filter(device_token::Column::IsActive.eq(true))
            .filter(device_token::Column::IsValid.eq(true))
            .order_by_desc(device_token::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new registration.
    pub async fn create(&self, model: device_token::ActiveModel) -> AppResult<device_token::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a registration.
    pub async fn update(&self, model: device_token::ActiveModel) -> AppResult<device_token::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Deactivate a registration.
    pub async fn deactivate(&self, id: &str) -> AppResult<device_token::Model> {
        let record = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device token {id} not found")))?;

        let mut active: device_token::ActiveModel = record.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now().into()));
        self.update(active).await
    }

    /// Mark a registration invalid, recording the reason.
    ///
    /// Used when the push gateway reports the endpoint as gone.
    pub async fn mark_invalid(&self, token: &str, reason: &str) -> AppResult<u64> {
        let result = DeviceToken::update_many()
            .col_expr(device_token::Column::IsValid, Expr::value(false))
            .col_expr(
                device_token::Column::InvalidatedReason,
                Expr::value(reason),
            )
            .col_expr(device_token::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(device_token::Column::DeviceToken.eq(token))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Record a push sent through this token.
    pub async fn touch(&self, id: &str) -> AppResult<()> {
        DeviceToken::update_many()
            .col_expr(device_token::Column::LastUsedAt, Expr::value(Utc::now()))
            .filter(device_token::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete expired and invalidated registrations (cleanup).
    pub async fn delete_unusable(&self) -> AppResult<u64> {
        let now = Utc::now();

        let result = DeviceToken::delete_many()
            .filter(
                Condition::any()
                    .add(device_token::Column::IsValid.eq(false))
                    .add(device_token::Column::ExpiresAt.lte(now)),
            )
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
    use crate::entities::device_token::DevicePlatform;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_token(id: &str, token: &str) -> device_token::Model {
        device_token::Model {
            id: id.to_string(),
            user_id: "user1".to_string(),
            device_token: token.to_string(),
            platform: DevicePlatform::Android,
            endpoint_arn: None,
            is_active: true,
            is_valid: true,
            last_used_at: None,
            invalidated_reason: None,
            app_version: None,
            device_model: None,
            created_at: Utc::now().into(),
            updated_at: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_token() {
        let record = create_test_token("d1", "tok-1");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[record.clone()]])
                .into_connection(),
        );

        let repo = DeviceTokenRepository::new(db);
        let result = repo.find_by_token("tok-1").await.unwrap();
        assert_eq!(result.unwrap().id, "d1");
    }

    #[tokio::test]
    async fn test_mark_invalid() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = DeviceTokenRepository::new(db);
        let rows = repo.mark_invalid("tok-1", "endpoint gone").await.unwrap();
        assert_eq!(rows, 1);
    }
}
