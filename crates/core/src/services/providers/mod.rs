//! Outbound provider capabilities.
//!
//! Each channel talks to its provider through a narrow trait so services
//! can be tested with no-op doubles and deployments can run with any
//! subset of providers configured.

mod email;
mod push;
mod sms;

pub use email::{EmailProvider, MailgunEmail, NoOpEmail, SendGridEmail, email_provider_from_config};
pub use push::{HttpPushGateway, NoOpPush, PushProvider, PushSendError, push_provider_from_config};
pub use sms::{NoOpSms, SmsProvider, TwilioSms, sms_provider_from_config};

use std::time::Duration;

/// Attempts per provider call before the failure is surfaced.
pub(crate) const SEND_ATTEMPTS: u32 = 3;

/// Delay before the first provider-call retry; doubles each attempt.
pub(crate) const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
