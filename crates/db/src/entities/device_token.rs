//! Device token entity.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Device platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum DevicePlatform {
    #[sea_orm(string_value = "ios")]
    Ios,
    #[sea_orm(string_value = "android")]
    Android,
    #[sea_orm(string_value = "web")]
    Web,
}

/// A registered push device token.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning user.
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Raw device token issued by the platform.
    #[sea_orm(unique)]
    pub device_token: String,

    /// Device platform.
    pub platform: DevicePlatform,

    /// Push-gateway endpoint id, once registered.
    #[sea_orm(nullable)]
    pub endpoint_arn: Option<String>,

    /// Whether the registration is active.
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Whether the gateway still accepts this token.
    #[sea_orm(default_value = true)]
    pub is_valid: bool,

    /// When a push was last sent through this token.
    #[sea_orm(nullable)]
    pub last_used_at: Option<DateTimeWithTimeZone>,

    /// Why the token was invalidated, when it was.
    #[sea_orm(nullable)]
    pub invalidated_reason: Option<String>,

    /// App version reported at registration.
    #[sea_orm(nullable)]
    pub app_version: Option<String>,

    /// Device model reported at registration.
    #[sea_orm(nullable)]
    pub device_model: Option<String>,

    /// When this token was registered.
    pub created_at: DateTimeWithTimeZone,

    /// When this row was last updated.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    /// When this registration expires.
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether pushes may be sent through this token.
    #[must_use]
    pub fn can_receive(&self) -> bool {
        self.is_active && self.is_valid && !self.expires_at.is_some_and(|e| e < Utc::now())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_token() -> Model {
        Model {
            id: "d1".to_string(),
            user_id: "user1".to_string(),
            device_token: "tok-1".to_string(),
            platform: DevicePlatform::Ios,
            endpoint_arn: Some("arn:endpoint/1".to_string()),
            is_active: true,
            is_valid: true,
            last_used_at: None,
            invalidated_reason: None,
            app_version: None,
            device_model: None,
            created_at: Utc::now().into(),
            updated_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_can_receive() {
        let token = base_token();
        assert!(token.can_receive());
    }

    #[test]
    fn test_cannot_receive_when_invalid() {
        let mut token = base_token();
        token.is_valid = false;
        assert!(!token.can_receive());
    }

    #[test]
    fn test_cannot_receive_when_expired() {
        let mut token = base_token();
        token.expires_at = Some((Utc::now() - chrono::Duration::hours(1)).into());
        assert!(!token.can_receive());
    }
}
