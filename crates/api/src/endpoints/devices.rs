//! Device token endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use courier_common::AppResult;
use courier_core::services::device_token::RegisterDeviceTokenInput;
use courier_db::entities::device_token::{self, DevicePlatform};
use serde::{Deserialize, Serialize};

use crate::{middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Device token response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTokenResponse {
    pub id: String,
    pub user_id: String,
    pub device_token: String,
    pub platform: String,
    pub is_active: bool,
    pub is_valid: bool,
    pub last_used_at: Option<String>,
    pub invalidated_reason: Option<String>,
    pub app_version: Option<String>,
    pub device_model: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<device_token::Model> for DeviceTokenResponse {
    fn from(t: device_token::Model) -> Self {
        Self {
            platform: match t.platform {
                DevicePlatform::Ios => "ios".to_string(),
                DevicePlatform::Android => "android".to_string(),
                DevicePlatform::Web => "web".to_string(),
            },
            id: t.id,
            user_id: t.user_id,
            device_token: t.device_token,
            is_active: t.is_active,
            is_valid: t.is_valid,
            last_used_at: t.last_used_at.map(|dt| dt.to_rfc3339()),
            invalidated_reason: t.invalidated_reason,
            app_version: t.app_version,
            device_model: t.device_model,
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Deactivation request. The token must belong to this user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateRequest {
    pub user_id: String,
}

// ==================== Handlers ====================

/// Register a device token. Re-registering an existing token revives it.
async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterDeviceTokenInput>,
) -> AppResult<ApiResponse<DeviceTokenResponse>> {
    let token = state.device_token_service.register(input).await?;

    Ok(ApiResponse::ok(token.into()))
}

/// List active tokens for a user.
async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<Vec<DeviceTokenResponse>>> {
    let tokens = state.device_token_service.list_for_user(&user_id).await?;

    Ok(ApiResponse::ok(tokens.into_iter().map(Into::into).collect()))
}

/// Deactivate a device token.
async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DeactivateRequest>,
) -> AppResult<ApiResponse<DeviceTokenResponse>> {
    let token = state
        .device_token_service
        .deactivate(&id, &req.user_id)
        .await?;

    Ok(ApiResponse::ok(token.into()))
}

// ==================== Router ====================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/user/{user_id}", get(list_for_user))
        .route("/{id}", delete(deactivate))
}
