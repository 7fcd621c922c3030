//! API middleware.

#![allow(missing_docs)]

use courier_core::{CampaignService, DeviceTokenService, NotificationService, TemplateService};

/// Application state shared across all endpoints.
#[derive(Clone)]
pub struct AppState {
    pub notification_service: NotificationService,
    pub template_service: TemplateService,
    pub campaign_service: CampaignService,
    pub device_token_service: DeviceTokenService,
}
