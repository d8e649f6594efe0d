//! Experiment note database entity for SeaORM.

use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::domain::ExperimentNote;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "experiment_notes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code_of_project: String,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,
    pub status: String,
    pub version_of_protocol: i32,
    pub latex_started_at: DateTimeUtc,
    pub latex_completed_at: DateTimeUtc,
    pub is_latex_loss: bool,
    #[sea_orm(column_type = "Decimal(Some((4, 2)))")]
    pub optical_density: Decimal,
    #[sea_orm(column_type = "Decimal(Some((3, 2)))")]
    pub signal_level: Decimal,
    #[sea_orm(column_type = "Decimal(Some((4, 2)))")]
    pub storage_buffer_ph: Decimal,
    pub picture: Option<String>,
    pub reminder_date: Option<DateTimeUtc>,
    pub owner_id: Uuid,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::OwnerId",
        to = "super::employee::Column::Id",
        on_delete = "Restrict"
    )]
    Owner,
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ExperimentNote {
    fn from(model: Model) -> Self {
        ExperimentNote {
            id: model.id,
            code_of_project: model.code_of_project,
            title: model.title,
            comments: model.comments,
            status: model.status,
            version_of_protocol: model.version_of_protocol,
            latex_started_at: model.latex_started_at,
            latex_completed_at: model.latex_completed_at,
            is_latex_loss: model.is_latex_loss,
            optical_density: model.optical_density,
            signal_level: model.signal_level,
            storage_buffer_ph: model.storage_buffer_ph,
            picture: model.picture,
            reminder_date: model.reminder_date,
            owner_id: model.owner_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Every column set, for inserts and full-row updates.
impl From<&ExperimentNote> for ActiveModel {
    fn from(note: &ExperimentNote) -> Self {
        ActiveModel {
            id: Set(note.id),
            code_of_project: Set(note.code_of_project.clone()),
            title: Set(note.title.clone()),
            comments: Set(note.comments.clone()),
            status: Set(note.status.clone()),
            version_of_protocol: Set(note.version_of_protocol),
            latex_started_at: Set(note.latex_started_at),
            latex_completed_at: Set(note.latex_completed_at),
            is_latex_loss: Set(note.is_latex_loss),
            optical_density: Set(note.optical_density),
            signal_level: Set(note.signal_level),
            storage_buffer_ph: Set(note.storage_buffer_ph),
            picture: Set(note.picture.clone()),
            reminder_date: Set(note.reminder_date),
            owner_id: Set(note.owner_id),
            created_at: Set(note.created_at),
            updated_at: Set(note.updated_at),
        }
    }
}
