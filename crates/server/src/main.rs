//! Courier server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use courier_api::{middleware::AppState, router as api_router};
use courier_common::Config;
use courier_core::{
    CampaignService, ChannelDispatcher, DeviceTokenService, NotificationService,
    StaticListResolver, TemplateService, email_provider_from_config, push_provider_from_config,
    sms_provider_from_config,
};
use courier_db::repositories::{
    CampaignRepository, DeviceTokenRepository, NotificationRepository, TemplateRepository,
};
use courier_queue::{SchedulerConfig, SweepExecutor, run_scheduler};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bridges the periodic sweeps to the notification and campaign services.
struct Sweeper {
    notification_service: NotificationService,
    campaign_service: CampaignService,
}

#[async_trait::async_trait]
impl SweepExecutor for Sweeper {
    async fn process_pending_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.notification_service.process_pending().await?)
    }

    async fn retry_failed_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.notification_service.retry_failed().await?)
    }

    async fn cancel_expired_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.notification_service.cancel_expired().await?)
    }

    async fn cleanup_old_notifications(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.notification_service.cleanup_old().await?)
    }

    async fn process_scheduled_campaigns(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.campaign_service.process_scheduled().await?)
    }

    async fn cleanup_old_campaigns(
        &self,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.campaign_service.cleanup_old().await?)
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting courier server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = courier_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    courier_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let notification_repo = NotificationRepository::new(Arc::clone(&db));
    let campaign_repo = CampaignRepository::new(Arc::clone(&db));
    let template_repo = TemplateRepository::new(Arc::clone(&db));
    let device_token_repo = DeviceTokenRepository::new(Arc::clone(&db));

    // Initialize delivery providers
    let email = email_provider_from_config(&config.providers);
    let sms = sms_provider_from_config(&config.providers);
    let push = push_provider_from_config(&config.providers);

    // Initialize services
    let dispatcher = ChannelDispatcher::new(
        notification_repo.clone(),
        campaign_repo.clone(),
        device_token_repo.clone(),
        email,
        sms,
        push.clone(),
    );
    let template_service = TemplateService::new(template_repo.clone());
    let notification_service = NotificationService::new(
        notification_repo.clone(),
        campaign_repo.clone(),
        template_service.clone(),
        dispatcher,
        config.notification.clone(),
    );
    let campaign_service = CampaignService::new(
        campaign_repo,
        notification_repo,
        template_repo,
        notification_service.clone(),
        Arc::new(StaticListResolver),
        config.notification.clone(),
    );
    let device_token_service = DeviceTokenService::new(device_token_repo, push);

    // Start the sweep scheduler
    let sweeper = Arc::new(Sweeper {
        notification_service: notification_service.clone(),
        campaign_service: campaign_service.clone(),
    });
    let scheduler_config = SchedulerConfig::from(&config.sweep);
    run_scheduler(scheduler_config, sweeper).await;
    info!("Sweep scheduler started");

    let state = AppState {
        notification_service,
        template_service,
        campaign_service,
        device_token_service,
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
