//! Create `notification` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notification::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notification::UserId).string_len(32))
                    .col(ColumnDef::new(Notification::RecipientEmail).string_len(320))
                    .col(ColumnDef::new(Notification::RecipientPhone).string_len(32))
                    .col(ColumnDef::new(Notification::RecipientName).string_len(256))
                    .col(
                        ColumnDef::new(Notification::Channel)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notification::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Notification::Priority)
                            .string_len(16)
                            .not_null()
                            .default("normal"),
                    )
                    .col(ColumnDef::new(Notification::TemplateId).string_len(32))
                    .col(ColumnDef::new(Notification::CampaignId).string_len(32))
                    .col(
                        ColumnDef::new(Notification::Title)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notification::Content).text().not_null())
                    .col(ColumnDef::new(Notification::HtmlContent).text())
                    .col(ColumnDef::new(Notification::Subject).string_len(512))
                    .col(ColumnDef::new(Notification::PushToken).string_len(512))
                    .col(ColumnDef::new(Notification::Platform).string_len(16))
                    .col(ColumnDef::new(Notification::EmailMessageId).string_len(256))
                    .col(ColumnDef::new(Notification::SmsMessageSid).string_len(256))
                    .col(ColumnDef::new(Notification::PushMessageId).string_len(256))
                    .col(
                        ColumnDef::new(Notification::BounceCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Notification::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Notification::MaxRetryCount)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(Notification::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::SentAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::DeliveredAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::FailedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::OpenedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::ClickedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::ErrorMessage).text())
                    .col(ColumnDef::new(Notification::ErrorCode).string_len(64))
                    .col(ColumnDef::new(Notification::LastErrorAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::Metadata).json_binary())
                    .col(ColumnDef::new(Notification::TrackingData).json_binary())
                    .col(
                        ColumnDef::new(Notification::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Notification::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::ExpiresAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index on user_id for listing a user's notifications
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user_id")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .to_owned(),
            )
            .await?;

        // Index on campaign_id for campaign fan-out queries
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_campaign_id")
                    .table(Notification::Table)
                    .col(Notification::CampaignId)
                    .to_owned(),
            )
            .await?;

        // Composite index for the pending/retry sweep queries
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_status_scheduled_at")
                    .table(Notification::Table)
                    .col(Notification::Status)
                    .col(Notification::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        // Composite index for the duplicate-suppression lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user_created_at")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .col(Notification::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    UserId,
    RecipientEmail,
    RecipientPhone,
    RecipientName,
    Channel,
    Status,
    Priority,
    TemplateId,
    CampaignId,
    Title,
    Content,
    HtmlContent,
    Subject,
    PushToken,
    Platform,
    EmailMessageId,
    SmsMessageSid,
    PushMessageId,
    BounceCount,
    RetryCount,
    MaxRetryCount,
    ScheduledAt,
    SentAt,
    DeliveredAt,
    FailedAt,
    OpenedAt,
    ClickedAt,
    ErrorMessage,
    ErrorCode,
    LastErrorAt,
    Metadata,
    TrackingData,
    CreatedAt,
    UpdatedAt,
    ExpiresAt,
}
