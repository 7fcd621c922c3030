//! Business logic services.

#![allow(missing_docs)]

pub mod campaign;
pub mod channel;
pub mod device_token;
pub mod notification;
pub mod providers;
pub mod targeting;
pub mod template;

pub use campaign::{CampaignService, CreateCampaignInput, UpdateCampaignInput};
pub use channel::ChannelDispatcher;
pub use device_token::{DeviceTokenService, RegisterDeviceTokenInput};
pub use notification::{NotificationService, SendNotificationInput};
pub use providers::{
    EmailProvider, HttpPushGateway, MailgunEmail, NoOpEmail, NoOpPush, NoOpSms, PushProvider,
    PushSendError, SendGridEmail, SmsProvider, TwilioSms, email_provider_from_config,
    push_provider_from_config, sms_provider_from_config,
};
pub use targeting::{
    CampaignTarget, NoOpResolver, StaticListResolver, TargetResolver, TargetResolverRef,
};
pub use template::{CreateTemplateInput, TemplateService, UpdateTemplateInput};
