//! Database repositories.

#![allow(missing_docs)]

pub mod campaign;
pub mod device_token;
pub mod notification;
pub mod template;

pub use campaign::CampaignRepository;
pub use device_token::DeviceTokenRepository;
pub use notification::NotificationRepository;
pub use template::TemplateRepository;
