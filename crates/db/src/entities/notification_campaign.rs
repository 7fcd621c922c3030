//! Notification campaign entity.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "camelCase")]
pub enum CampaignType {
    #[sea_orm(string_value = "email_marketing")]
    EmailMarketing,
    #[sea_orm(string_value = "sms_marketing")]
    SmsMarketing,
    #[sea_orm(string_value = "push_marketing")]
    PushMarketing,
    #[sea_orm(string_value = "newsletter")]
    Newsletter,
    #[sea_orm(string_value = "re_engagement")]
    ReEngagement,
    #[sea_orm(string_value = "announcement")]
    Announcement,
}

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum CampaignStatus {
    /// Being edited; not yet schedulable.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Waiting for its start time.
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    /// Fan-out in progress.
    #[sea_orm(string_value = "running")]
    Running,
    /// Suspended (manually or by budget exhaustion).
    #[sea_orm(string_value = "paused")]
    Paused,
    /// All targets processed.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled before completion.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Aborted by an unrecoverable error.
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl CampaignStatus {
    /// Whether the campaign can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// A bulk notification campaign.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_campaign")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Unique campaign name.
    #[sea_orm(unique)]
    pub name: String,

    /// Human description.
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Campaign kind; determines the notification channel.
    pub campaign_type: CampaignType,

    /// Current lifecycle status.
    pub status: CampaignStatus,

    /// Template applied to every notification, if any.
    #[sea_orm(nullable)]
    pub template_id: Option<String>,

    /// Audience description (free-form criteria).
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub target_audience: Option<Json>,

    /// Explicit target user id list.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub target_user_ids: Option<Json>,

    /// Target segment labels.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub target_segments: Option<Json>,

    /// Scheduled start of the campaign window.
    #[sea_orm(nullable)]
    pub scheduled_start_at: Option<DateTimeWithTimeZone>,

    /// Scheduled end of the campaign window.
    #[sea_orm(nullable)]
    pub scheduled_end_at: Option<DateTimeWithTimeZone>,

    /// When execution actually started.
    #[sea_orm(nullable)]
    pub started_at: Option<DateTimeWithTimeZone>,

    /// When execution completed.
    #[sea_orm(nullable)]
    pub completed_at: Option<DateTimeWithTimeZone>,

    /// When the campaign was cancelled.
    #[sea_orm(nullable)]
    pub cancelled_at: Option<DateTimeWithTimeZone>,

    /// Soft enable/disable flag.
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Whether the campaign recurs.
    #[sea_orm(default_value = false)]
    pub is_recurring: bool,

    /// Recurrence pattern (cron-style), when recurring.
    #[sea_orm(nullable)]
    pub recurrence_pattern: Option<String>,

    /// Cap on the number of recipients per run.
    #[sea_orm(nullable)]
    pub max_recipients: Option<i32>,

    /// Priority applied to generated notifications.
    pub priority: String,

    /// Spending cap; no cap when absent.
    #[sea_orm(nullable)]
    pub budget_limit: Option<Decimal>,

    /// Cost charged per generated notification.
    #[sea_orm(nullable)]
    pub cost_per_notification: Option<Decimal>,

    /// Number of resolved targets at start.
    #[sea_orm(default_value = 0)]
    pub total_recipients: i32,

    /// Notifications successfully submitted.
    #[sea_orm(default_value = 0)]
    pub sent_count: i32,

    /// Notifications confirmed delivered.
    #[sea_orm(default_value = 0)]
    pub delivered_count: i32,

    /// Notifications that failed submission.
    #[sea_orm(default_value = 0)]
    pub failed_count: i32,

    /// Notifications opened.
    #[sea_orm(default_value = 0)]
    pub opened_count: i32,

    /// Notifications clicked through.
    #[sea_orm(default_value = 0)]
    pub clicked_count: i32,

    /// Notifications bounced.
    #[sea_orm(default_value = 0)]
    pub bounced_count: i32,

    /// Recipients who unsubscribed.
    #[sea_orm(default_value = 0)]
    pub unsubscribed_count: i32,

    /// Accumulated spend.
    pub total_cost: Decimal,

    /// Whether this run is an A/B test.
    #[sea_orm(default_value = false)]
    pub is_ab_test: bool,

    /// Percentage of the audience in the test variant.
    #[sea_orm(nullable)]
    pub ab_test_percentage: Option<i32>,

    /// Variant label for this campaign.
    #[sea_orm(nullable)]
    pub ab_variant: Option<String>,

    /// Arbitrary metadata.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,

    /// Tracking parameters stamped onto generated notifications.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub tracking_params: Option<Json>,

    /// Who created the campaign.
    #[sea_orm(nullable)]
    pub created_by: Option<String>,

    /// When this campaign was created.
    pub created_at: DateTimeWithTimeZone,

    /// When this campaign was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether the campaign may transition to RUNNING.
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(
            self.status,
            CampaignStatus::Draft | CampaignStatus::Scheduled
        )
    }

    /// Whether fan-out is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == CampaignStatus::Running
    }

    /// Whether spending `additional` would stay within the budget.
    ///
    /// Campaigns without a budget limit always admit.
    #[must_use]
    pub fn within_budget(&self, additional: Decimal) -> bool {
        self.budget_limit
            .is_none_or(|limit| self.total_cost + additional <= limit)
    }

    /// Fraction of sent notifications confirmed delivered.
    #[must_use]
    pub fn delivery_rate(&self) -> f64 {
        Self::rate(self.delivered_count, self.sent_count)
    }

    /// Fraction of delivered notifications opened.
    #[must_use]
    pub fn open_rate(&self) -> f64 {
        Self::rate(self.opened_count, self.delivered_count)
    }

    /// Fraction of opened notifications clicked through.
    #[must_use]
    pub fn click_rate(&self) -> f64 {
        Self::rate(self.clicked_count, self.opened_count)
    }

    /// Fraction of sent notifications that bounced.
    #[must_use]
    pub fn bounce_rate(&self) -> f64 {
        Self::rate(self.bounced_count, self.sent_count)
    }

    fn rate(num: i32, denom: i32) -> f64 {
        if denom <= 0 {
            0.0
        } else {
            f64::from(num) / f64::from(denom)
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn base_campaign() -> Model {
        Model {
            id: "c1".to_string(),
            name: "Spring launch".to_string(),
            description: None,
            campaign_type: CampaignType::EmailMarketing,
            status: CampaignStatus::Draft,
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

    #[test]
    fn test_can_start() {
        let mut campaign = base_campaign();
        assert!(campaign.can_start());

        campaign.status = CampaignStatus::Scheduled;
        assert!(campaign.can_start());

        campaign.status = CampaignStatus::Running;
        assert!(!campaign.can_start());

        campaign.status = CampaignStatus::Completed;
        assert!(!campaign.can_start());
    }

    #[test]
    fn test_within_budget_unlimited() {
        let campaign = base_campaign();
        assert!(campaign.within_budget(Decimal::new(1_000_000, 0)));
    }

    #[test]
    fn test_within_budget_boundary() {
        let mut campaign = base_campaign();
        campaign.budget_limit = Some(Decimal::new(100, 0));
        campaign.total_cost = Decimal::new(99, 0);

        // Exactly reaching the limit is admitted; exceeding is not.
        assert!(campaign.within_budget(Decimal::ONE));
        assert!(!campaign.within_budget(Decimal::new(2, 0)));
    }

    #[test]
    fn test_rates() {
        let mut campaign = base_campaign();
        assert!((campaign.delivery_rate() - 0.0).abs() < f64::EPSILON);

        campaign.sent_count = 10;
        campaign.delivered_count = 5;
        assert!((campaign.delivery_rate() - 0.5).abs() < f64::EPSILON);
    }
}
