//! Create `notification_template` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationTemplate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationTemplate::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationTemplate::Name)
                            .string_len(256)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(NotificationTemplate::TemplateType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationTemplate::Description).text())
                    .col(ColumnDef::new(NotificationTemplate::SubjectTemplate).string_len(512))
                    .col(ColumnDef::new(NotificationTemplate::TitleTemplate).string_len(512))
                    .col(
                        ColumnDef::new(NotificationTemplate::ContentTemplate)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(NotificationTemplate::HtmlTemplate).text())
                    .col(ColumnDef::new(NotificationTemplate::SmsTemplate).text())
                    .col(ColumnDef::new(NotificationTemplate::PushTemplate).text())
                    .col(ColumnDef::new(NotificationTemplate::Variables).json_binary())
                    .col(ColumnDef::new(NotificationTemplate::SampleData).json_binary())
                    .col(
                        ColumnDef::new(NotificationTemplate::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(NotificationTemplate::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(NotificationTemplate::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(NotificationTemplate::Language)
                            .string_len(16)
                            .not_null()
                            .default("en"),
                    )
                    .col(ColumnDef::new(NotificationTemplate::Category).string_len(64))
                    .col(
                        ColumnDef::new(NotificationTemplate::UsageCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(NotificationTemplate::LastUsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(NotificationTemplate::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(NotificationTemplate::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Composite index for default-template lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_template_type_language")
                    .table(NotificationTemplate::Table)
                    .col(NotificationTemplate::TemplateType)
                    .col(NotificationTemplate::Language)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationTemplate::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum NotificationTemplate {
    Table,
    Id,
    Name,
    TemplateType,
    Description,
    SubjectTemplate,
    TitleTemplate,
    ContentTemplate,
    HtmlTemplate,
    SmsTemplate,
    PushTemplate,
    Variables,
    SampleData,
    IsActive,
    IsDefault,
    Version,
    Language,
    Category,
    UsageCount,
    LastUsedAt,
    CreatedAt,
    UpdatedAt,
}
