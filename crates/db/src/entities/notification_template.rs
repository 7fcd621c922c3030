//! Notification template entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of content a template produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "camelCase")]
pub enum TemplateType {
    #[sea_orm(string_value = "transactional")]
    Transactional,
    #[sea_orm(string_value = "marketing")]
    Marketing,
    #[sea_orm(string_value = "system")]
    System,
    #[sea_orm(string_value = "digest")]
    Digest,
}

/// A reusable notification template with `{{variable}}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_template")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Unique template name.
    #[sea_orm(unique)]
    pub name: String,

    /// Template kind.
    pub template_type: TemplateType,

    /// Human description.
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Email subject template.
    #[sea_orm(nullable)]
    pub subject_template: Option<String>,

    /// Title template (all channels).
    #[sea_orm(nullable)]
    pub title_template: Option<String>,

    /// Body template (all channels).
    #[sea_orm(column_type = "Text")]
    pub content_template: String,

    /// HTML body template (email).
    #[sea_orm(column_type = "Text", nullable)]
    pub html_template: Option<String>,

    /// SMS body template.
    #[sea_orm(column_type = "Text", nullable)]
    pub sms_template: Option<String>,

    /// Push body template.
    #[sea_orm(column_type = "Text", nullable)]
    pub push_template: Option<String>,

    /// Variable names referenced by the templates.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub variables: Option<Json>,

    /// Sample variable values for previewing.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub sample_data: Option<Json>,

    /// Whether the template may be applied to new notifications.
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Whether this is the default template for its (type, language).
    #[sea_orm(default_value = false)]
    pub is_default: bool,

    /// Monotonic edit version.
    #[sea_orm(default_value = 1)]
    pub version: i32,

    /// BCP 47 language tag.
    pub language: String,

    /// Free-form category label.
    #[sea_orm(nullable)]
    pub category: Option<String>,

    /// Number of notifications rendered from this template.
    #[sea_orm(default_value = 0)]
    pub usage_count: i64,

    /// When the template was last applied.
    #[sea_orm(nullable)]
    pub last_used_at: Option<DateTimeWithTimeZone>,

    /// When this template was created.
    pub created_at: DateTimeWithTimeZone,

    /// When this template was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
