//! Migration: Create experiment_notes table.

use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_employees_table::Employees;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExperimentNotes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExperimentNotes::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::CodeOfProject)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ExperimentNotes::Title).string_len(255).not_null())
                    .col(ColumnDef::new(ExperimentNotes::Comments).text().null())
                    .col(
                        ColumnDef::new(ExperimentNotes::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::VersionOfProtocol)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::LatexStartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::LatexCompletedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::IsLatexLoss)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // 10.00 needs four digits of precision
                    .col(
                        ColumnDef::new(ExperimentNotes::OpticalDensity)
                            .decimal_len(4, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::SignalLevel)
                            .decimal_len(3, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::StorageBufferPh)
                            .decimal_len(4, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ExperimentNotes::Picture).string().null())
                    .col(
                        ColumnDef::new(ExperimentNotes::ReminderDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(ExperimentNotes::OwnerId).uuid().not_null())
                    .col(
                        ColumnDef::new(ExperimentNotes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExperimentNotes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_experiment_notes_owner")
                            .from(ExperimentNotes::Table, ExperimentNotes::OwnerId)
                            .to(Employees::Table, Employees::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Owner-scoped listings ordered by update time
        manager
            .create_index(
                Index::create()
                    .name("idx_experiment_notes_owner_updated")
                    .table(ExperimentNotes::Table)
                    .col(ExperimentNotes::OwnerId)
                    .col(ExperimentNotes::UpdatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExperimentNotes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ExperimentNotes {
    Table,
    Id,
    CodeOfProject,
    Title,
    Comments,
    Status,
    VersionOfProtocol,
    LatexStartedAt,
    LatexCompletedAt,
    IsLatexLoss,
    OpticalDensity,
    SignalLevel,
    StorageBufferPh,
    Picture,
    ReminderDate,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}
