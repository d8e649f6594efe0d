//! Experiment note repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

use super::entities::experiment_note::{self, ActiveModel, Entity as NoteEntity};
use crate::domain::{ExperimentNote, NoteOrdering, NoteQuery, SearchScope};
use crate::errors::{AppError, AppResult};
use crate::types::{PageRequest, Paginated};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Experiment note repository trait for dependency injection.
///
/// The store does not authorize; callers check ownership.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ExperimentNote>>;

    /// Whether another note already uses `code`
    async fn code_taken(&self, code: &str, exclude: Option<Uuid>) -> AppResult<bool>;

    /// Whether another note of `owner_id` already has this reminder time
    async fn reminder_taken(
        &self,
        owner_id: Uuid,
        reminder: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> AppResult<bool>;

    async fn insert(&self, note: &ExperimentNote) -> AppResult<ExperimentNote>;

    /// Overwrite every column of an existing note
    async fn update(&self, note: &ExperimentNote) -> AppResult<ExperimentNote>;

    async fn delete(&self, id: Uuid) -> AppResult<()>;

    /// One page of the notes matching `query`, clamped to the last page
    async fn fetch_page(
        &self,
        query: &NoteQuery,
        page: PageRequest,
    ) -> AppResult<Paginated<ExperimentNote>>;

    /// Notes of `owner_id` updated within `[from, to)`
    async fn count_updated_between(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<u64>;

    async fn count_by_owner(&self, owner_id: Uuid) -> AppResult<u64>;
}

/// SeaORM-backed note repository
pub struct NoteStore {
    db: DatabaseConnection,
}

impl NoteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Escape LIKE wildcards so user text matches literally.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Owner filter, optional search and ordering for `query`.
fn select_for(query: &NoteQuery) -> Select<NoteEntity> {
    let mut select = NoteEntity::find().filter(experiment_note::Column::OwnerId.eq(query.owner_id));

    if let Some(search) = &query.search {
        let pattern = like_pattern(&search.text);
        let other = match search.scope {
            SearchScope::TitleOrCode => experiment_note::Column::CodeOfProject,
            SearchScope::TitleOrComments => experiment_note::Column::Comments,
        };
        select = select.filter(
            Condition::any()
                .add(
                    Expr::expr(Func::lower(Expr::col(experiment_note::Column::Title)))
                        .like(pattern.as_str()),
                )
                .add(Expr::expr(Func::lower(Expr::col(other))).like(pattern.as_str())),
        );
    }

    match query.ordering {
        NoteOrdering::RecentlyUpdated => select
            .order_by_desc(experiment_note::Column::UpdatedAt)
            .order_by_asc(experiment_note::Column::Title),
        NoteOrdering::Default => select
            .order_by_asc(experiment_note::Column::OwnerId)
            .order_by_asc(experiment_note::Column::UpdatedAt)
            .order_by_asc(experiment_note::Column::Title),
    }
}

#[async_trait]
impl NoteRepository for NoteStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ExperimentNote>> {
        let result = NoteEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(ExperimentNote::from))
    }

    async fn code_taken(&self, code: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let mut select = NoteEntity::find().filter(experiment_note::Column::CodeOfProject.eq(code));
        if let Some(id) = exclude {
            select = select.filter(experiment_note::Column::Id.ne(id));
        }
        Ok(select.count(&self.db).await? > 0)
    }

    async fn reminder_taken(
        &self,
        owner_id: Uuid,
        reminder: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let mut select = NoteEntity::find()
            .filter(experiment_note::Column::OwnerId.eq(owner_id))
            .filter(experiment_note::Column::ReminderDate.eq(reminder));
        if let Some(id) = exclude {
            select = select.filter(experiment_note::Column::Id.ne(id));
        }
        Ok(select.count(&self.db).await? > 0)
    }

    async fn insert(&self, note: &ExperimentNote) -> AppResult<ExperimentNote> {
        let model = ActiveModel::from(note).insert(&self.db).await?;
        Ok(ExperimentNote::from(model))
    }

    async fn update(&self, note: &ExperimentNote) -> AppResult<ExperimentNote> {
        let model = ActiveModel::from(note).update(&self.db).await.map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => AppError::NotFound,
            other => AppError::from(other),
        })?;
        Ok(ExperimentNote::from(model))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = NoteEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    async fn fetch_page(
        &self,
        query: &NoteQuery,
        page: PageRequest,
    ) -> AppResult<Paginated<ExperimentNote>> {
        let select = select_for(query);
        let total = select.clone().count(&self.db).await?;
        let page = page.resolve(total);

        let models = select
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;

        Ok(Paginated::new(
            models.into_iter().map(ExperimentNote::from).collect(),
            page.page,
            page.per_page,
            total,
        ))
    }

    async fn count_updated_between(
        &self,
        owner_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<u64> {
        let count = NoteEntity::find()
            .filter(experiment_note::Column::OwnerId.eq(owner_id))
            .filter(experiment_note::Column::UpdatedAt.gte(from))
            .filter(experiment_note::Column::UpdatedAt.lt(to))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn count_by_owner(&self, owner_id: Uuid) -> AppResult<u64> {
        let count = NoteEntity::find()
            .filter(experiment_note::Column::OwnerId.eq(owner_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}
