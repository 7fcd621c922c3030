//! Campaign endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use courier_common::AppResult;
use courier_core::services::campaign::{CreateCampaignInput, UpdateCampaignInput};
use courier_db::entities::notification_campaign::{self, CampaignStatus, CampaignType};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::endpoints::notifications::NotificationResponse;
use crate::{middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Campaign response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub campaign_type: String,
    pub status: String,
    pub template_id: Option<String>,
    pub target_user_ids: Option<serde_json::Value>,
    pub scheduled_start_at: Option<String>,
    pub scheduled_end_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub max_recipients: Option<i32>,
    pub priority: String,
    pub budget_limit: Option<String>,
    pub cost_per_notification: Option<String>,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub delivered_count: i32,
    pub failed_count: i32,
    pub opened_count: i32,
    pub clicked_count: i32,
    pub bounced_count: i32,
    pub unsubscribed_count: i32,
    pub total_cost: String,
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub is_ab_test: bool,
    pub ab_test_percentage: Option<i32>,
    pub ab_variant: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<notification_campaign::Model> for CampaignResponse {
    fn from(c: notification_campaign::Model) -> Self {
        Self {
            campaign_type: match c.campaign_type {
                CampaignType::EmailMarketing => "email_marketing".to_string(),
                CampaignType::SmsMarketing => "sms_marketing".to_string(),
                CampaignType::PushMarketing => "push_marketing".to_string(),
                CampaignType::Newsletter => "newsletter".to_string(),
                CampaignType::ReEngagement => "re_engagement".to_string(),
                CampaignType::Announcement => "announcement".to_string(),
            },
            status: match c.status {
                CampaignStatus::Draft => "draft".to_string(),
                CampaignStatus::Scheduled => "scheduled".to_string(),
                CampaignStatus::Running => "running".to_string(),
                CampaignStatus::Paused => "paused".to_string(),
                CampaignStatus::Completed => "completed".to_string(),
                CampaignStatus::Cancelled => "cancelled".to_string(),
                CampaignStatus::Failed => "failed".to_string(),
            },
            delivery_rate: c.delivery_rate(),
            open_rate: c.open_rate(),
            click_rate: c.click_rate(),
            id: c.id,
            name: c.name,
            description: c.description,
            template_id: c.template_id,
            target_user_ids: c.target_user_ids,
            scheduled_start_at: c.scheduled_start_at.map(|dt| dt.to_rfc3339()),
            scheduled_end_at: c.scheduled_end_at.map(|dt| dt.to_rfc3339()),
            started_at: c.started_at.map(|dt| dt.to_rfc3339()),
            completed_at: c.completed_at.map(|dt| dt.to_rfc3339()),
            cancelled_at: c.cancelled_at.map(|dt| dt.to_rfc3339()),
            max_recipients: c.max_recipients,
            priority: c.priority,
            budget_limit: c.budget_limit.map(|d| d.to_string()),
            cost_per_notification: c.cost_per_notification.map(|d| d.to_string()),
            total_recipients: c.total_recipients,
            sent_count: c.sent_count,
            delivered_count: c.delivered_count,
            failed_count: c.failed_count,
            opened_count: c.opened_count,
            clicked_count: c.clicked_count,
            bounced_count: c.bounced_count,
            unsubscribed_count: c.unsubscribed_count,
            total_cost: c.total_cost.to_string(),
            is_ab_test: c.is_ab_test,
            ab_test_percentage: c.ab_test_percentage,
            ab_variant: c.ab_variant,
            created_by: c.created_by,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Pagination query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

// ==================== Handlers ====================

/// Create a campaign.
async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateCampaignInput>,
) -> AppResult<ApiResponse<CampaignResponse>> {
    let campaign = state.campaign_service.create(input).await?;

    Ok(ApiResponse::ok(campaign.into()))
}

/// List campaigns, newest first.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<CampaignResponse>>> {
    let limit = query.limit.min(100);
    let campaigns = state.campaign_service.list(limit, query.offset).await?;

    Ok(ApiResponse::ok(
        campaigns.into_iter().map(Into::into).collect(),
    ))
}

/// Show a campaign.
async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CampaignResponse>> {
    let campaign = state.campaign_service.get_by_id(&id).await?;

    Ok(ApiResponse::ok(campaign.into()))
}

/// Update a draft campaign.
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateCampaignInput>,
) -> AppResult<ApiResponse<CampaignResponse>> {
    let campaign = state.campaign_service.update(&id, input).await?;

    Ok(ApiResponse::ok(campaign.into()))
}

/// Delete a draft or cancelled campaign.
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.campaign_service.delete(&id).await?;

    Ok(ApiResponse::ok(()))
}

/// Start a campaign. Fan-out runs in the background.
async fn start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CampaignResponse>> {
    let campaign = state.campaign_service.start(&id).await?;

    let service = state.campaign_service.clone();
    let campaign_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = service.execute(&campaign_id).await {
            warn!(campaign_id = %campaign_id, error = %e, "Campaign execution failed");
        }
    });

    Ok(ApiResponse::ok(campaign.into()))
}

/// Pause a running campaign.
async fn pause(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CampaignResponse>> {
    let campaign = state.campaign_service.pause(&id).await?;

    Ok(ApiResponse::ok(campaign.into()))
}

/// Resume a paused campaign. Fan-out picks up in the background.
async fn resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CampaignResponse>> {
    let campaign = state.campaign_service.resume(&id).await?;

    let service = state.campaign_service.clone();
    let campaign_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = service.execute(&campaign_id).await {
            warn!(campaign_id = %campaign_id, error = %e, "Campaign execution failed");
        }
    });

    Ok(ApiResponse::ok(campaign.into()))
}

/// Cancel a campaign and its pending notifications.
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CampaignResponse>> {
    let campaign = state.campaign_service.cancel(&id).await?;

    Ok(ApiResponse::ok(campaign.into()))
}

/// List notifications generated by a campaign.
async fn notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let limit = query.limit.min(100);
    let notifications = state
        .notification_service
        .list_by_campaign(&id, limit, query.offset)
        .await?;

    Ok(ApiResponse::ok(
        notifications.into_iter().map(Into::into).collect(),
    ))
}

// ==================== Router ====================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/start", post(start))
        .route("/{id}/pause", post(pause))
        .route("/{id}/resume", post(resume))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/notifications", get(notifications))
}
