//! Notification entity.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery channel for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum NotificationChannel {
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "sms")]
    Sms,
    #[sea_orm(string_value = "push")]
    Push,
    #[sea_orm(string_value = "in_app")]
    InApp,
}

/// Lifecycle status of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum NotificationStatus {
    /// Waiting to be dispatched.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted by the provider.
    #[sea_orm(string_value = "sent")]
    Sent,
    /// Confirmed delivered to the recipient.
    #[sea_orm(string_value = "delivered")]
    Delivered,
    /// Last dispatch attempt failed.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Rejected by the recipient's endpoint.
    #[sea_orm(string_value = "bounced")]
    Bounced,
    /// Cancelled before dispatch.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl NotificationStatus {
    /// Whether this status is terminal for the dispatch pipeline.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Bounced | Self::Cancelled)
    }
}

/// Priority of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum NotificationPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

impl NotificationPriority {
    /// Default time-to-live before an undispatched notification expires.
    ///
    /// Urgent notifications are stale after a day; everything else keeps
    /// for a week.
    #[must_use]
    pub const fn default_ttl(self) -> chrono::Duration {
        match self {
            Self::Urgent => chrono::Duration::days(1),
            _ => chrono::Duration::days(7),
        }
    }
}

/// A single notification to a single recipient.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Recipient user, when known. Anonymous sends carry only an address.
    #[sea_orm(indexed, nullable)]
    pub user_id: Option<String>,

    /// Recipient email address (EMAIL channel).
    #[sea_orm(nullable)]
    pub recipient_email: Option<String>,

    /// Recipient phone number (SMS channel).
    #[sea_orm(nullable)]
    pub recipient_phone: Option<String>,

    /// Recipient display name.
    #[sea_orm(nullable)]
    pub recipient_name: Option<String>,

    /// Delivery channel.
    pub channel: NotificationChannel,

    /// Current lifecycle status.
    pub status: NotificationStatus,

    /// Priority.
    pub priority: NotificationPriority,

    /// Template used to render this notification, if any.
    #[sea_orm(nullable)]
    pub template_id: Option<String>,

    /// Campaign this notification belongs to, if any.
    #[sea_orm(indexed, nullable)]
    pub campaign_id: Option<String>,

    /// Notification title.
    pub title: String,

    /// Notification body.
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// HTML body (EMAIL channel).
    #[sea_orm(column_type = "Text", nullable)]
    pub html_content: Option<String>,

    /// Email subject line (EMAIL channel).
    #[sea_orm(nullable)]
    pub subject: Option<String>,

    /// Push token (PUSH channel).
    #[sea_orm(nullable)]
    pub push_token: Option<String>,

    /// Device platform (PUSH channel).
    #[sea_orm(nullable)]
    pub platform: Option<String>,

    /// Provider message id for an email send.
    #[sea_orm(nullable)]
    pub email_message_id: Option<String>,

    /// Provider message SID for an SMS send.
    #[sea_orm(nullable)]
    pub sms_message_sid: Option<String>,

    /// Provider message id for a push send.
    #[sea_orm(nullable)]
    pub push_message_id: Option<String>,

    /// Number of bounces recorded against this notification.
    #[sea_orm(default_value = 0)]
    pub bounce_count: i32,

    /// Number of failed dispatch attempts.
    #[sea_orm(default_value = 0)]
    pub retry_count: i32,

    /// Maximum retries before the notification is abandoned.
    #[sea_orm(default_value = 3)]
    pub max_retry_count: i32,

    /// Earliest time this notification may be dispatched.
    #[sea_orm(nullable)]
    pub scheduled_at: Option<DateTimeWithTimeZone>,

    /// When the provider accepted the message.
    #[sea_orm(nullable)]
    pub sent_at: Option<DateTimeWithTimeZone>,

    /// When delivery was confirmed.
    #[sea_orm(nullable)]
    pub delivered_at: Option<DateTimeWithTimeZone>,

    /// When the last dispatch attempt failed.
    #[sea_orm(nullable)]
    pub failed_at: Option<DateTimeWithTimeZone>,

    /// When the recipient first opened the notification.
    #[sea_orm(nullable)]
    pub opened_at: Option<DateTimeWithTimeZone>,

    /// When the recipient first clicked through.
    #[sea_orm(nullable)]
    pub clicked_at: Option<DateTimeWithTimeZone>,

    /// Error message from the last failed attempt.
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    /// Error code from the last failed attempt.
    #[sea_orm(nullable)]
    pub error_code: Option<String>,

    /// Timestamp of the last failure, used for retry cool-down.
    #[sea_orm(nullable)]
    pub last_error_at: Option<DateTimeWithTimeZone>,

    /// Arbitrary caller metadata.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,

    /// Tracking parameters (campaign attribution etc.).
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub tracking_data: Option<Json>,

    /// When this notification was created.
    pub created_at: DateTimeWithTimeZone,

    /// When this notification was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    /// When this notification expires if still undispatched.
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether the notification has passed its expiry time.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|e| e < Utc::now())
    }

    /// Whether the notification is still waiting for dispatch.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == NotificationStatus::Pending
    }

    /// Whether the notification is deferred to a future time.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled_at.is_some_and(|s| s > Utc::now())
    }

    /// Whether the notification should be dispatched right now.
    #[must_use]
    pub fn should_send_now(&self) -> bool {
        self.is_pending() && !self.is_scheduled() && !self.is_expired()
    }

    /// Whether a failed notification is still eligible for retry.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.status == NotificationStatus::Failed
            && self.retry_count < self.max_retry_count
            && !self.is_expired()
    }

    /// Provider message id for this notification's channel.
    #[must_use]
    pub fn provider_message_id(&self) -> Option<&str> {
        match self.channel {
            NotificationChannel::Email => self.email_message_id.as_deref(),
            NotificationChannel::Sms => self.sms_message_sid.as_deref(),
            NotificationChannel::Push | NotificationChannel::InApp => {
                self.push_message_id.as_deref()
            }
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_model() -> Model {
        Model {
            id: "n1".to_string(),
            user_id: Some("user1".to_string()),
            recipient_email: Some("a@example.com".to_string()),
            recipient_phone: None,
            recipient_name: None,
            channel: NotificationChannel::Email,
            status: NotificationStatus::Pending,
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

    #[test]
    fn test_should_send_now() {
        let model = base_model();
        assert!(model.should_send_now());
    }

    #[test]
    fn test_scheduled_is_not_sent_now() {
        let mut model = base_model();
        model.scheduled_at = Some((Utc::now() + chrono::Duration::hours(1)).into());
        assert!(model.is_scheduled());
        assert!(!model.should_send_now());
    }

    #[test]
    fn test_past_schedule_is_due() {
        let mut model = base_model();
        model.scheduled_at = Some((Utc::now() - chrono::Duration::minutes(1)).into());
        assert!(!model.is_scheduled());
        assert!(model.should_send_now());
    }

    #[test]
    fn test_expired_is_not_sent_now() {
        let mut model = base_model();
        model.expires_at = Some((Utc::now() - chrono::Duration::minutes(1)).into());
        assert!(model.is_expired());
        assert!(!model.should_send_now());
    }

    #[test]
    fn test_can_retry_bounds() {
        let mut model = base_model();
        model.status = NotificationStatus::Failed;
        model.retry_count = 2;
        assert!(model.can_retry());

        model.retry_count = 3;
        assert!(!model.can_retry());
    }

    #[test]
    fn test_can_retry_requires_failed() {
        let mut model = base_model();
        model.retry_count = 0;
        assert!(!model.can_retry());
    }

    #[test]
    fn test_default_ttl() {
        assert_eq!(
            NotificationPriority::Urgent.default_ttl(),
            chrono::Duration::days(1)
        );
        assert_eq!(
            NotificationPriority::Normal.default_ttl(),
            chrono::Duration::days(7)
        );
    }

    #[test]
    fn test_provider_message_id_by_channel() {
        let mut model = base_model();
        model.email_message_id = Some("em-1".to_string());
        model.sms_message_sid = Some("sm-1".to_string());
        assert_eq!(model.provider_message_id(), Some("em-1"));

        model.channel = NotificationChannel::Sms;
        assert_eq!(model.provider_message_id(), Some("sm-1"));
    }
}
