//! Notification template repository.

use std::sync::Arc;

use chrono::Utc;
use courier_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::entities::notification_template::TemplateType;
use crate::entities::{NotificationTemplate, notification_template};

/// Template repository for database operations.
#[derive(Clone)]
pub struct TemplateRepository {
    db: Arc<DatabaseConnection>,
}

impl TemplateRepository {
    /// Create a new template repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a template by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification_template::Model>> {
        NotificationTemplate::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a template by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<notification_template::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Template {id} not found")))
    }

    /// Find a template by its unique name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<notification_template::Model>> {
        NotificationTemplate::find()
            .filter(notification_template::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether a template with the given name already exists.
    pub async fn exists_by_name(&self, name: &str) -> AppResult<bool> {
        let count = NotificationTemplate::find()
            .filter(notification_template::Column::Name.eq(name))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// List templates, newest first.
    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification_template::Model>> {
        NotificationTemplate::find()
            .order_by_desc(notification_template::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List active templates of a given type.
    pub async fn find_active_by_type(
        &self,
        template_type: TemplateType,
    ) -> AppResult<Vec<notification_template::Model>> {
        NotificationTemplate::find()
            .filter(notification_template::Column::TemplateType.eq(template_type))
            .filter(notification_template::Column::IsActive.eq(true))
            .order_by_asc(notification_template::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the active default template for a (type, language) pair.
    pub async fn find_default(
        &self,
        template_type: TemplateType,
        language: &str,
    ) -> AppResult<Option<notification_template::Model>> {
        NotificationTemplate::find()
            .filter(notification_template::Column::TemplateType.eq(template_type))
            .filter(notification_template::Column::Language.eq(language))
            .filter(notification_template::Column::IsDefault.eq(true))
            .filter(notification_template::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new template.
    pub async fn create(
        &self,
        model: notification_template::ActiveModel,
    ) -> AppResult<notification_template::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a template.
    pub async fn update(
        &self,
        model: notification_template::ActiveModel,
    ) -> AppResult<notification_template::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a template.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        NotificationTemplate::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Unset the current default for a (type, language) pair.
    ///
    /// Called before promoting a new default so that at most one active
    /// default exists per pair.
    pub async fn unset_default(
        &self,
        template_type: TemplateType,
        language: &str,
    ) -> AppResult<u64> {
        let result = NotificationTemplate::update_many()
            .col_expr(notification_template::Column::IsDefault, Expr::value(false))
            .col_expr(
                notification_template::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(notification_template::Column::TemplateType.eq(template_type))
            .filter(notification_template::Column::Language.eq(language))
            .filter(notification_template::Column::IsDefault.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Atomically record one application of the template.
    pub async fn record_usage(&self, id: &str) -> AppResult<()> {
        NotificationTemplate::update_many()
            .col_expr(
                notification_template::Column::UsageCount,
                Expr::col(notification_template::Column::UsageCount).add(1),
            )
            .col_expr(
                notification_template::Column::LastUsedAt,
                Expr::value(Utc::now()),
            )
            .filter(notification_template::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
