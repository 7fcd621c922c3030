//! Notification endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use courier_common::AppResult;
use courier_core::services::notification::SendNotificationInput;
use courier_db::entities::notification::{
    self, NotificationChannel, NotificationPriority, NotificationStatus,
};
use serde::{Deserialize, Serialize};

use crate::{middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Notification response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    pub recipient_name: Option<String>,
    pub channel: String,
    pub status: String,
    pub priority: String,
    pub template_id: Option<String>,
    pub campaign_id: Option<String>,
    pub title: String,
    pub content: String,
    pub subject: Option<String>,
    pub provider_message_id: Option<String>,
    pub retry_count: i32,
    pub max_retry_count: i32,
    pub scheduled_at: Option<String>,
    pub sent_at: Option<String>,
    pub delivered_at: Option<String>,
    pub failed_at: Option<String>,
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<notification::Model> for NotificationResponse {
    fn from(n: notification::Model) -> Self {
        let provider_message_id = n.provider_message_id().map(str::to_string);
        Self {
            channel: match n.channel {
                NotificationChannel::Email => "email".to_string(),
                NotificationChannel::Sms => "sms".to_string(),
                NotificationChannel::Push => "push".to_string(),
                NotificationChannel::InApp => "in_app".to_string(),
            },
            status: match n.status {
                NotificationStatus::Pending => "pending".to_string(),
                NotificationStatus::Sent => "sent".to_string(),
                NotificationStatus::Delivered => "delivered".to_string(),
                NotificationStatus::Failed => "failed".to_string(),
                NotificationStatus::Bounced => "bounced".to_string(),
                NotificationStatus::Cancelled => "cancelled".to_string(),
            },
            priority: match n.priority {
                NotificationPriority::Low => "low".to_string(),
                NotificationPriority::Normal => "normal".to_string(),
                NotificationPriority::High => "high".to_string(),
                NotificationPriority::Urgent => "urgent".to_string(),
            },
            provider_message_id,
            id: n.id,
            user_id: n.user_id,
            recipient_email: n.recipient_email,
            recipient_phone: n.recipient_phone,
            recipient_name: n.recipient_name,
            template_id: n.template_id,
            campaign_id: n.campaign_id,
            title: n.title,
            content: n.content,
            subject: n.subject,
            retry_count: n.retry_count,
            max_retry_count: n.max_retry_count,
            scheduled_at: n.scheduled_at.map(|dt| dt.to_rfc3339()),
            sent_at: n.sent_at.map(|dt| dt.to_rfc3339()),
            delivered_at: n.delivered_at.map(|dt| dt.to_rfc3339()),
            failed_at: n.failed_at.map(|dt| dt.to_rfc3339()),
            opened_at: n.opened_at.map(|dt| dt.to_rfc3339()),
            clicked_at: n.clicked_at.map(|dt| dt.to_rfc3339()),
            error_message: n.error_message,
            error_code: n.error_code,
            expires_at: n.expires_at.map(|dt| dt.to_rfc3339()),
            created_at: n.created_at.to_rfc3339(),
            updated_at: n.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Bulk send request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBulkRequest {
    pub notifications: Vec<SendNotificationInput>,
}

/// Bulk send result.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBulkResponse {
    pub requested: usize,
    pub sent: Vec<NotificationResponse>,
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

/// Send a single notification.
async fn send(
    State(state): State<AppState>,
    Json(input): Json<SendNotificationInput>,
) -> AppResult<ApiResponse<NotificationResponse>> {
    let notification = state.notification_service.send(input).await?;

    Ok(ApiResponse::ok(notification.into()))
}

/// Send a batch of notifications. Failed items are skipped.
async fn send_bulk(
    State(state): State<AppState>,
    Json(req): Json<SendBulkRequest>,
) -> AppResult<ApiResponse<SendBulkResponse>> {
    let requested = req.notifications.len();
    let sent = state.notification_service.send_bulk(req.notifications).await?;

    Ok(ApiResponse::ok(SendBulkResponse {
        requested,
        sent: sent.into_iter().map(Into::into).collect(),
    }))
}

/// Show a notification.
async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<NotificationResponse>> {
    let notification = state.notification_service.get_by_id(&id).await?;

    Ok(ApiResponse::ok(notification.into()))
}

/// List notifications for a user, newest first.
async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let limit = query.limit.min(100);
    let notifications = state
        .notification_service
        .list_for_user(&user_id, limit, query.offset)
        .await?;

    Ok(ApiResponse::ok(
        notifications.into_iter().map(Into::into).collect(),
    ))
}

/// Cancel a pending notification.
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<NotificationResponse>> {
    let notification = state.notification_service.cancel(&id).await?;

    Ok(ApiResponse::ok(notification.into()))
}

/// Record an open event.
async fn opened(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<NotificationResponse>> {
    let notification = state.notification_service.mark_opened(&id).await?;

    Ok(ApiResponse::ok(notification.into()))
}

/// Record a click event.
async fn clicked(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<NotificationResponse>> {
    let notification = state.notification_service.mark_clicked(&id).await?;

    Ok(ApiResponse::ok(notification.into()))
}

// ==================== Router ====================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send))
        .route("/send-bulk", post(send_bulk))
        .route("/{id}", get(show))
        .route("/user/{user_id}", get(list_for_user))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/opened", post(opened))
        .route("/{id}/clicked", post(clicked))
}
