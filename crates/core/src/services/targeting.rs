//! Campaign target resolution.
//!
//! Resolving a campaign's audience is a capability so deployments can
//! plug in a user directory without the campaign executor knowing about
//! it. The default implementation reads the campaign's explicit target
//! list.

use async_trait::async_trait;
use courier_common::{AppError, AppResult};
use courier_db::entities::notification_campaign;
use serde::Deserialize;
use std::sync::Arc;

/// A single resolved campaign recipient.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTarget {
    /// Recipient user id.
    pub user_id: String,
    /// Email address, when the resolver knows it.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number, when the resolver knows it.
    #[serde(default)]
    pub phone: Option<String>,
    /// Push token, when the resolver knows it.
    #[serde(default)]
    pub push_token: Option<String>,
    /// Device platform for the push token.
    #[serde(default)]
    pub platform: Option<String>,
}

impl CampaignTarget {
    /// A target identified only by user id.
    #[must_use]
    pub fn from_user_id(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: None,
            phone: None,
            push_token: None,
            platform: None,
        }
    }
}

/// Capability for resolving a campaign's recipients.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Resolve the full recipient list for a campaign.
    async fn resolve(
        &self,
        campaign: &notification_campaign::Model,
    ) -> AppResult<Vec<CampaignTarget>>;
}

/// Resolver that reads the campaign's explicit `target_user_ids` list.
///
/// Entries are either bare user-id strings or objects carrying contact
/// details (`{"userId": "...", "email": "..."}`).
#[derive(Clone, Default)]
pub struct StaticListResolver;

#[async_trait]
impl TargetResolver for StaticListResolver {
    async fn resolve(
        &self,
        campaign: &notification_campaign::Model,
    ) -> AppResult<Vec<CampaignTarget>> {
        let Some(raw) = &campaign.target_user_ids else {
            return Ok(Vec::new());
        };

        let entries = raw.as_array().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Campaign {} has a malformed target list",
                campaign.id
            ))
        })?;

        let mut targets = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(user_id) = entry.as_str() {
                targets.push(CampaignTarget::from_user_id(user_id));
            } else {
                let target: CampaignTarget =
                    serde_json::from_value(entry.clone()).map_err(|e| {
                        AppError::BadRequest(format!(
                            "Campaign {} has a malformed target entry: {e}",
                            campaign.id
                        ))
                    })?;
                targets.push(target);
            }
        }
        Ok(targets)
    }
}

/// Resolver that never yields recipients.
#[derive(Clone, Default)]
pub struct NoOpResolver;

#[async_trait]
impl TargetResolver for NoOpResolver {
    async fn resolve(
        &self,
        _campaign: &notification_campaign::Model,
    ) -> AppResult<Vec<CampaignTarget>> {
        Ok(Vec::new())
    }
}

/// Shared resolver handle.
pub type TargetResolverRef = Arc<dyn TargetResolver>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_db::entities::notification_campaign::{CampaignStatus, CampaignType};
    use rust_decimal::Decimal;
    use serde_json::json;

    fn campaign_with_targets(targets: Option<serde_json::Value>) -> notification_campaign::Model {
        notification_campaign::Model {
            id: "c1".to_string(),
            name: "Spring launch".to_string(),
            description: None,
            campaign_type: CampaignType::EmailMarketing,
            status: CampaignStatus::Running,
            template_id: None,
            target_audience: None,
            target_user_ids: targets,
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
    async fn test_resolves_bare_user_ids() {
        let campaign = campaign_with_targets(Some(json!(["u1", "u2"])));
        let targets = StaticListResolver.resolve(&campaign).await.unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].user_id, "u1");
        assert!(targets[0].email.is_none());
    }

    #[tokio::test]
    async fn test_resolves_object_entries_with_contacts() {
        let campaign = campaign_with_targets(Some(json!([
            {"userId": "u1", "email": "u1@example.com"},
        ])));
        let targets = StaticListResolver.resolve(&campaign).await.unwrap();
        assert_eq!(targets[0].email.as_deref(), Some("u1@example.com"));
    }

    #[tokio::test]
    async fn test_missing_target_list_is_empty() {
        let campaign = campaign_with_targets(None);
        let targets = StaticListResolver.resolve(&campaign).await.unwrap();
        assert!(targets.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_target_list_is_rejected() {
        let campaign = campaign_with_targets(Some(json!("not-a-list")));
        let result = StaticListResolver.resolve(&campaign).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
