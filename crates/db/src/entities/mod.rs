//! Database entities.

#![allow(missing_docs)]

pub mod device_token;
pub mod notification;
pub mod notification_campaign;
pub mod notification_template;

pub use device_token::Entity as DeviceToken;
pub use notification::Entity as Notification;
pub use notification_campaign::Entity as NotificationCampaign;
pub use notification_template::Entity as NotificationTemplate;
