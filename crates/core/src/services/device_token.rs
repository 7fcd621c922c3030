//! Device token registration management.

use std::sync::Arc;

use chrono::Utc;
use courier_common::{AppError, AppResult, id::IdGenerator};
use courier_db::entities::device_token::{self, DevicePlatform};
use courier_db::repositories::DeviceTokenRepository;
use sea_orm::{ActiveEnum, Set};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::providers::PushProvider;

/// Input for registering a device token.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceTokenInput {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(length(min = 1, max = 512))]
    pub device_token: String,
    pub platform: DevicePlatform,
    #[validate(length(max = 32))]
    pub app_version: Option<String>,
    #[validate(length(max = 128))]
    pub device_model: Option<String>,
}

/// Service managing push device registrations.
#[derive(Clone)]
pub struct DeviceTokenService {
    device_token_repo: DeviceTokenRepository,
    push: Arc<dyn PushProvider>,
    id_gen: IdGenerator,
}

impl DeviceTokenService {
    /// Create a new device token service.
    #[must_use]
    pub fn new(device_token_repo: DeviceTokenRepository, push: Arc<dyn PushProvider>) -> Self {
        Self {
            device_token_repo,
            push,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a device token, upserting on the token value.
    ///
    /// Re-registering a known token revives it (and can move it to a
    /// different user, e.g. after a device handover). A push-gateway
    /// endpoint is registered best-effort; a gateway failure leaves the
    /// row usable without one.
    pub async fn register(
        &self,
        input: RegisterDeviceTokenInput,
    ) -> AppResult<device_token::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let endpoint_arn = match self
            .push
            .register_endpoint(&input.device_token, &input.platform.to_value())
            .await
        {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!(error = %e, "Push endpoint registration failed, storing token without one");
                None
            }
        };

        let now = Utc::now();

        if let Some(existing) = self
            .device_token_repo
            .find_by_token(&input.device_token)
            .await?
        {
            let id = existing.id.clone();
            let mut active: device_token::ActiveModel = existing.into();
            active.user_id = Set(input.user_id);
            active.platform = Set(input.platform);
            active.is_active = Set(true);
            active.is_valid = Set(true);
            active.invalidated_reason = Set(None);
            active.app_version = Set(input.app_version);
            active.device_model = Set(input.device_model);
            if let Some(endpoint) = endpoint_arn {
                active.endpoint_arn = Set(Some(endpoint));
            }
            active.last_used_at = Set(Some(now.into()));
            active.updated_at = Set(Some(now.into()));

            info!(id = %id, "Revived existing device token");
            return self.device_token_repo.update(active).await;
        }

        let model = device_token::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(input.user_id),
            device_token: Set(input.device_token),
            platform: Set(input.platform),
            endpoint_arn: Set(endpoint_arn),
            is_active: Set(true),
            is_valid: Set(true),
            last_used_at: Set(Some(now.into())),
            invalidated_reason: Set(None),
            app_version: Set(input.app_version),
            device_model: Set(input.device_model),
            created_at: Set(now.into()),
            updated_at: Set(None),
            expires_at: Set(None),
        };

        self.device_token_repo.create(model).await
    }

    /// List a user's usable device tokens.
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<device_token::Model>> {
        self.device_token_repo.find_active_by_user(user_id).await
    }

    /// Deactivate a device token owned by the given user.
    pub async fn deactivate(&self, id: &str, user_id: &str) -> AppResult<device_token::Model> {
        let token = self
            .device_token_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Device token not found".to_string()))?;

        // Ownership mismatches are reported as missing rather than leaking
        // another user's registration.
        if token.user_id != user_id {
            return Err(AppError::NotFound("Device token not found".to_string()));
        }

        self.device_token_repo.deactivate(id).await
    }

    /// Mark a token invalid by its token value.
    pub async fn mark_invalid(&self, token: &str, reason: &str) -> AppResult<()> {
        let rows = self.device_token_repo.mark_invalid(token, reason).await?;
        if rows == 0 {
            return Err(AppError::NotFound("Device token not found".to_string()));
        }
        Ok(())
    }

    /// Delete invalid and expired registrations.
    pub async fn cleanup(&self) -> AppResult<u64> {
        self.device_token_repo.delete_unusable().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::providers::NoOpPush;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn test_token(id: &str, user_id: &str) -> device_token::Model {
        device_token::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            device_token: "tok-1".to_string(),
            platform: DevicePlatform::Ios,
            endpoint_arn: None,
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

    #[tokio::test]
    async fn test_deactivate_requires_ownership() {
        let token = test_token("d1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[token]])
                .into_connection(),
        );
        let svc = DeviceTokenService::new(DeviceTokenRepository::new(db), Arc::new(NoOpPush));

        let result = svc.deactivate("d1", "someone-else").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_invalid_unknown_token_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );
        let svc = DeviceTokenService::new(DeviceTokenRepository::new(db), Arc::new(NoOpPush));

        let result = svc.mark_invalid("missing", "expired").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
