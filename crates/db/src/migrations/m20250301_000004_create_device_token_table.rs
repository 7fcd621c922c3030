//! Create `device_token` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeviceToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceToken::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceToken::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceToken::DeviceToken)
                            .string_len(512)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceToken::Platform)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeviceToken::EndpointArn).string_len(512))
                    .col(
                        ColumnDef::new(DeviceToken::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(DeviceToken::IsValid)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(DeviceToken::LastUsedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(DeviceToken::InvalidatedReason).string_len(256))
                    .col(ColumnDef::new(DeviceToken::AppVersion).string_len(64))
                    .col(ColumnDef::new(DeviceToken::DeviceModel).string_len(128))
                    .col(
                        ColumnDef::new(DeviceToken::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(DeviceToken::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(DeviceToken::ExpiresAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index on user_id for listing a user's devices
        manager
            .create_index(
                Index::create()
                    .name("idx_device_token_user_id")
                    .table(DeviceToken::Table)
                    .col(DeviceToken::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceToken::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DeviceToken {
    Table,
    Id,
    UserId,
    DeviceToken,
    Platform,
    EndpointArn,
    IsActive,
    IsValid,
    LastUsedAt,
    InvalidatedReason,
    AppVersion,
    DeviceModel,
    CreatedAt,
    UpdatedAt,
    ExpiresAt,
}
