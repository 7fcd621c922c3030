//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250301_000001_create_notification_table;
mod m20250301_000002_create_notification_template_table;
mod m20250301_000003_create_notification_campaign_table;
mod m20250301_000004_create_device_token_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_notification_table::Migration),
            Box::new(m20250301_000002_create_notification_template_table::Migration),
            Box::new(m20250301_000003_create_notification_campaign_table::Migration),
            Box::new(m20250301_000004_create_device_token_table::Migration),
        ]
    }
}
