//! Create `notification_campaign` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationCampaign::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationCampaign::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::Name)
                            .string_len(256)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(NotificationCampaign::Description).text())
                    .col(
                        ColumnDef::new(NotificationCampaign::CampaignType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(NotificationCampaign::TemplateId).string_len(32))
                    .col(ColumnDef::new(NotificationCampaign::TargetAudience).json_binary())
                    .col(ColumnDef::new(NotificationCampaign::TargetUserIds).json_binary())
                    .col(ColumnDef::new(NotificationCampaign::TargetSegments).json_binary())
                    .col(
                        ColumnDef::new(NotificationCampaign::ScheduledStartAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::ScheduledEndAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(NotificationCampaign::StartedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(NotificationCampaign::CompletedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::CancelledAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::IsRecurring)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(NotificationCampaign::RecurrencePattern).string_len(128))
                    .col(ColumnDef::new(NotificationCampaign::MaxRecipients).integer())
                    .col(
                        ColumnDef::new(NotificationCampaign::Priority)
                            .string_len(16)
                            .not_null()
                            .default("normal"),
                    )
                    .col(ColumnDef::new(NotificationCampaign::BudgetLimit).decimal_len(12, 4))
                    .col(
                        ColumnDef::new(NotificationCampaign::CostPerNotification)
                            .decimal_len(12, 4),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::TotalRecipients)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::SentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::DeliveredCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::FailedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::OpenedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::ClickedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::BouncedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::UnsubscribedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::TotalCost)
                            .decimal_len(12, 4)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::IsAbTest)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(NotificationCampaign::AbTestPercentage).integer())
                    .col(ColumnDef::new(NotificationCampaign::AbVariant).string_len(32))
                    .col(ColumnDef::new(NotificationCampaign::Metadata).json_binary())
                    .col(ColumnDef::new(NotificationCampaign::TrackingParams).json_binary())
                    .col(ColumnDef::new(NotificationCampaign::CreatedBy).string_len(32))
                    .col(
                        ColumnDef::new(NotificationCampaign::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(NotificationCampaign::UpdatedAt)
                            .timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await?;

        // Composite index for the scheduled-campaign promotion sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_campaign_status_scheduled_start")
                    .table(NotificationCampaign::Table)
                    .col(NotificationCampaign::Status)
                    .col(NotificationCampaign::ScheduledStartAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationCampaign::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum NotificationCampaign {
    Table,
    Id,
    Name,
    Description,
    CampaignType,
    Status,
    TemplateId,
    TargetAudience,
    TargetUserIds,
    TargetSegments,
    ScheduledStartAt,
    ScheduledEndAt,
    StartedAt,
    CompletedAt,
    CancelledAt,
    IsActive,
    IsRecurring,
    RecurrencePattern,
    MaxRecipients,
    Priority,
    BudgetLimit,
    CostPerNotification,
    TotalRecipients,
    SentCount,
    DeliveredCount,
    FailedCount,
    OpenedCount,
    ClickedCount,
    BouncedCount,
    UnsubscribedCount,
    TotalCost,
    IsAbTest,
    AbTestPercentage,
    AbVariant,
    Metadata,
    TrackingParams,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
