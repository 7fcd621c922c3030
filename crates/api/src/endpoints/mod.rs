//! API endpoints.

mod campaigns;
mod devices;
mod notifications;
mod templates;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/notifications", notifications::router())
        .nest("/templates", templates::router())
        .nest("/campaigns", campaigns::router())
        .nest("/devices", devices::router())
}
