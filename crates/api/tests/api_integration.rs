//! API integration tests.
//!
//! These tests drive the router end to end against a mock database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use courier_api::{middleware::AppState, router as api_router};
use courier_common::config::NotificationConfig;
use courier_core::{
    CampaignService, ChannelDispatcher, DeviceTokenService, NoOpEmail, NoOpPush, NoOpSms,
    NotificationService, StaticListResolver, TemplateService,
};
use courier_db::entities::notification_template::{self, TemplateType};
use courier_db::repositories::{
    CampaignRepository, DeviceTokenRepository, NotificationRepository, TemplateRepository,
};
use sea_orm::{DatabaseConnection, MockDatabase};
use std::sync::Arc;
use tower::ServiceExt;

/// Build app state on top of the given connection.
fn create_test_state(db: DatabaseConnection) -> AppState {
    let db = Arc::new(db);
    let notification_repo = NotificationRepository::new(Arc::clone(&db));
    let campaign_repo = CampaignRepository::new(Arc::clone(&db));
    let template_repo = TemplateRepository::new(Arc::clone(&db));
    let device_token_repo = DeviceTokenRepository::new(Arc::clone(&db));

    let dispatcher = ChannelDispatcher::new(
        notification_repo.clone(),
        campaign_repo.clone(),
        device_token_repo.clone(),
        Arc::new(NoOpEmail),
        Arc::new(NoOpSms),
        Arc::new(NoOpPush),
    );
    let template_service = TemplateService::new(template_repo.clone());
    let notification_service = NotificationService::new(
        notification_repo.clone(),
        campaign_repo.clone(),
        template_service.clone(),
        dispatcher,
        NotificationConfig::default(),
    );
    let campaign_service = CampaignService::new(
        campaign_repo,
        notification_repo,
        template_repo,
        notification_service.clone(),
        Arc::new(StaticListResolver),
        NotificationConfig::default(),
    );
    let device_token_service = DeviceTokenService::new(device_token_repo, Arc::new(NoOpPush));

    AppState {
        notification_service,
        template_service,
        campaign_service,
        device_token_service,
    }
}

fn create_test_router(db: DatabaseConnection) -> Router {
    Router::new()
        .nest("/api", api_router())
        .with_state(create_test_state(db))
}

fn empty_mock_db() -> DatabaseConnection {
    MockDatabase::new(sea_orm::DatabaseBackend::Postgres)
        .append_query_results([Vec::<notification_template::Model>::new()])
        .into_connection()
}

fn sample_template(id: &str, name: &str) -> notification_template::Model {
    notification_template::Model {
        id: id.to_string(),
        name: name.to_string(),
        template_type: TemplateType::Transactional,
        description: None,
        subject_template: Some("Hello {{name}}".to_string()),
        title_template: None,
        content_template: "Welcome, {{name}}!".to_string(),
        html_template: None,
        sms_template: None,
        push_template: None,
        variables: None,
        sample_data: None,
        is_active: true,
        is_default: false,
        version: 1,
        language: "en".to_string(),
        category: None,
        usage_count: 0,
        last_used_at: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = create_test_router(empty_mock_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent/endpoint")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_with_invalid_json_returns_error() {
    let app = create_test_router(empty_mock_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/notifications/send")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from("invalid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_show_missing_notification_returns_404() {
    let db = MockDatabase::new(sea_orm::DatabaseBackend::Postgres)
        .append_query_results([Vec::<courier_db::entities::notification::Model>::new()])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/notifications/ntf_missing")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_templates_returns_data_envelope() {
    let db = MockDatabase::new(sea_orm::DatabaseBackend::Postgres)
        .append_query_results([vec![
            sample_template("t1", "welcome"),
            sample_template("t2", "password-reset"),
        ]])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/templates?limit=10")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let data = body["data"].as_array().expect("data array");
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], "t1");
    assert_eq!(data[0]["templateType"], "transactional");
}

#[tokio::test]
async fn test_create_template_with_empty_name_returns_400() {
    let app = create_test_router(empty_mock_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/templates")
                .method("POST")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"name":"","templateType":"transactional","contentTemplate":"Hi {{name}}"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_show_missing_campaign_returns_404() {
    let db = MockDatabase::new(sea_orm::DatabaseBackend::Postgres)
        .append_query_results([Vec::<courier_db::entities::notification_campaign::Model>::new()])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/campaigns/cmp_missing")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deactivate_missing_device_token_returns_404() {
    let db = MockDatabase::new(sea_orm::DatabaseBackend::Postgres)
        .append_query_results([Vec::<courier_db::entities::device_token::Model>::new()])
        .into_connection();
    let app = create_test_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/devices/tok_missing")
                .method("DELETE")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"userId":"user1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
