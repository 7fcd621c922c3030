//! Template endpoints.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use courier_common::AppResult;
use courier_core::services::template::{CreateTemplateInput, UpdateTemplateInput};
use courier_db::entities::notification_template::{self, TemplateType};
use serde::{Deserialize, Serialize};

use crate::{middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Template response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub template_type: String,
    pub description: Option<String>,
    pub subject_template: Option<String>,
    pub title_template: Option<String>,
    pub content_template: String,
    pub html_template: Option<String>,
    pub sms_template: Option<String>,
    pub push_template: Option<String>,
    pub variables: Option<serde_json::Value>,
    pub sample_data: Option<serde_json::Value>,
    pub is_active: bool,
    pub is_default: bool,
    pub version: i32,
    pub language: String,
    pub category: Option<String>,
    pub usage_count: i64,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<notification_template::Model> for TemplateResponse {
    fn from(t: notification_template::Model) -> Self {
        Self {
            template_type: match t.template_type {
                TemplateType::Transactional => "transactional".to_string(),
                TemplateType::Marketing => "marketing".to_string(),
                TemplateType::System => "system".to_string(),
                TemplateType::Digest => "digest".to_string(),
            },
            id: t.id,
            name: t.name,
            description: t.description,
            subject_template: t.subject_template,
            title_template: t.title_template,
            content_template: t.content_template,
            html_template: t.html_template,
            sms_template: t.sms_template,
            push_template: t.push_template,
            variables: t.variables,
            sample_data: t.sample_data,
            is_active: t.is_active,
            is_default: t.is_default,
            version: t.version,
            language: t.language,
            category: t.category,
            usage_count: t.usage_count,
            last_used_at: t.last_used_at.map(|dt| dt.to_rfc3339()),
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.map(|dt| dt.to_rfc3339()),
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

/// Preview request. Missing variables are left as-is in the output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

// ==================== Handlers ====================

/// Create a template.
async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateTemplateInput>,
) -> AppResult<ApiResponse<TemplateResponse>> {
    let template = state.template_service.create(input).await?;

    Ok(ApiResponse::ok(template.into()))
}

/// List templates, newest first.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<TemplateResponse>>> {
    let limit = query.limit.min(100);
    let templates = state.template_service.list(limit, query.offset).await?;

    Ok(ApiResponse::ok(
        templates.into_iter().map(Into::into).collect(),
    ))
}

/// Show a template.
async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<TemplateResponse>> {
    let template = state.template_service.get_by_id(&id).await?;

    Ok(ApiResponse::ok(template.into()))
}

/// Update a template. Bumps the version.
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateTemplateInput>,
) -> AppResult<ApiResponse<TemplateResponse>> {
    let template = state.template_service.update(&id, input).await?;

    Ok(ApiResponse::ok(template.into()))
}

/// Delete a template.
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.template_service.delete(&id).await?;

    Ok(ApiResponse::ok(()))
}

/// Activate a template.
async fn activate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<TemplateResponse>> {
    let template = state.template_service.activate(&id).await?;

    Ok(ApiResponse::ok(template.into()))
}

/// Deactivate a template.
async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<TemplateResponse>> {
    let template = state.template_service.deactivate(&id).await?;

    Ok(ApiResponse::ok(template.into()))
}

/// Promote a template to the default for its (type, language) pair.
async fn set_default(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<TemplateResponse>> {
    let template = state.template_service.set_default(&id).await?;

    Ok(ApiResponse::ok(template.into()))
}

/// Render a template without recording usage.
async fn preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PreviewRequest>,
) -> AppResult<ApiResponse<HashMap<String, String>>> {
    let rendered = state.template_service.preview(&id, &req.variables).await?;

    Ok(ApiResponse::ok(rendered))
}

// ==================== Router ====================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/activate", post(activate))
        .route("/{id}/deactivate", post(deactivate))
        .route("/{id}/default", post(set_default))
        .route("/{id}/preview", post(preview))
}
