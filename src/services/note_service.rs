//! Note service - owner-scoped experiment note management.
//!
//! Every operation on an existing note goes through `owned_note`, so a
//! note is never read or written on behalf of anyone but its owner.
//! Listings are cached per owner under a generation that every write bumps.

use async_trait::async_trait;
use chrono::{Duration, NaiveTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MEDIA_DIR_NOTE_PICTURES;
use crate::domain::{
    ExperimentNote, HomeStats, ImageUpload, NoteDraft, NoteOrdering, NotePatch, NoteQuery,
    SearchScope,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::{MediaStorage, NoteCache, UnitOfWork};
use crate::types::{PageRequest, Paginated};

#[async_trait]
pub trait NoteService: Send + Sync {
    async fn create(&self, owner: Uuid, draft: NoteDraft) -> AppResult<ExperimentNote>;

    async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<ExperimentNote>;

    /// Full replacement (PUT).
    async fn update(&self, owner: Uuid, id: Uuid, draft: NoteDraft) -> AppResult<ExperimentNote>;

    /// Partial update (PATCH).
    async fn patch(&self, owner: Uuid, id: Uuid, patch: NotePatch) -> AppResult<ExperimentNote>;

    async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<()>;

    async fn list(
        &self,
        owner: Uuid,
        ordering: NoteOrdering,
        page: PageRequest,
    ) -> AppResult<Paginated<ExperimentNote>>;

    /// Case-insensitive substring search; blank text lists everything.
    async fn search(
        &self,
        owner: Uuid,
        text: &str,
        scope: SearchScope,
        page: PageRequest,
    ) -> AppResult<Paginated<ExperimentNote>>;

    /// Notes of `owner` updated on the current UTC date.
    async fn home_stats(&self, owner: Uuid) -> AppResult<HomeStats>;

    async fn attach_picture(
        &self,
        owner: Uuid,
        id: Uuid,
        upload: ImageUpload,
    ) -> AppResult<ExperimentNote>;
}

pub struct NoteManager<U: UnitOfWork> {
    uow: Arc<U>,
    cache: Arc<dyn NoteCache>,
    media: Arc<dyn MediaStorage>,
}

impl<U: UnitOfWork> NoteManager<U> {
    pub fn new(uow: Arc<U>, cache: Arc<dyn NoteCache>, media: Arc<dyn MediaStorage>) -> Self {
        Self { uow, cache, media }
    }

    /// Load a note and check it belongs to `owner`.
    async fn owned_note(&self, owner: Uuid, id: Uuid) -> AppResult<ExperimentNote> {
        let note = self.uow.notes().find_by_id(id).await?.ok_or_not_found()?;
        note.ensure_owned_by(owner)?;
        Ok(note)
    }

    /// Field validation followed by the uniqueness rules.
    async fn check_writable(&self, note: &ExperimentNote, existing: Option<Uuid>) -> AppResult<()> {
        note.validate()?;

        let notes = self.uow.notes();
        if notes.code_taken(&note.code_of_project, existing).await? {
            return Err(AppError::duplicate("code_of_project"));
        }
        if let Some(reminder) = note.reminder_date {
            if notes.reminder_taken(note.owner_id, reminder, existing).await? {
                return Err(AppError::Integrity {
                    field: "reminder_date".to_string(),
                    message: "Another note already has a reminder at this time".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn save_existing(&self, note: ExperimentNote) -> AppResult<ExperimentNote> {
        self.check_writable(&note, Some(note.id)).await?;
        let saved = self.uow.notes().update(&note).await?;
        self.invalidate(saved.owner_id).await;
        Ok(saved)
    }

    async fn invalidate(&self, owner: Uuid) {
        if let Err(e) = self.cache.invalidate_owner(owner).await {
            tracing::warn!(owner = %owner, error = %e, "Failed to invalidate note cache");
        }
    }

    async fn discard_media(&self, path: &str) {
        if let Err(e) = self.media.remove(path).await {
            tracing::warn!(path = %path, error = %e, "Failed to remove media file");
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> NoteService for NoteManager<U> {
    async fn create(&self, owner: Uuid, draft: NoteDraft) -> AppResult<ExperimentNote> {
        let note = ExperimentNote::new(owner, draft, Utc::now());
        self.check_writable(&note, None).await?;

        let created = self.uow.notes().insert(&note).await?;
        self.invalidate(owner).await;

        tracing::info!(note = %created.id, owner = %owner, "Experiment note created");
        Ok(created)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<ExperimentNote> {
        self.owned_note(owner, id).await
    }

    async fn update(&self, owner: Uuid, id: Uuid, draft: NoteDraft) -> AppResult<ExperimentNote> {
        let mut note = self.owned_note(owner, id).await?;
        note.replace(draft, Utc::now());
        self.save_existing(note).await
    }

    async fn patch(&self, owner: Uuid, id: Uuid, patch: NotePatch) -> AppResult<ExperimentNote> {
        let mut note = self.owned_note(owner, id).await?;
        note.apply(patch, Utc::now());
        self.save_existing(note).await
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<()> {
        let note = self.owned_note(owner, id).await?;
        self.uow.notes().delete(note.id).await?;
        self.invalidate(owner).await;

        if let Some(picture) = note.picture {
            self.discard_media(&picture).await;
        }
        tracing::info!(note = %id, owner = %owner, "Experiment note deleted");
        Ok(())
    }

    async fn list(
        &self,
        owner: Uuid,
        ordering: NoteOrdering,
        page: PageRequest,
    ) -> AppResult<Paginated<ExperimentNote>> {
        // read before the store, so a concurrent write orphans what we cache
        let generation = match self.cache.generation(owner).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!(owner = %owner, error = %e, "Note cache generation read failed");
                None
            }
        };

        if let Some(generation) = generation {
            match self.cache.get_page(owner, generation, ordering, page).await {
                Ok(Some(cached)) => return Ok(cached),
                Ok(None) => {}
                Err(e) => tracing::warn!(owner = %owner, error = %e, "Note cache read failed"),
            }
        }

        let result = self
            .uow
            .notes()
            .fetch_page(&NoteQuery::list(owner, ordering), page)
            .await?;

        if let Some(generation) = generation {
            if let Err(e) = self
                .cache
                .put_page(owner, generation, ordering, page, &result)
                .await
            {
                tracing::warn!(owner = %owner, error = %e, "Note cache write failed");
            }
        }
        Ok(result)
    }

    async fn search(
        &self,
        owner: Uuid,
        text: &str,
        scope: SearchScope,
        page: PageRequest,
    ) -> AppResult<Paginated<ExperimentNote>> {
        let query = NoteQuery::search(owner, text, scope);
        if query.search.is_none() {
            return self.list(owner, query.ordering, page).await;
        }
        self.uow.notes().fetch_page(&query, page).await
    }

    async fn home_stats(&self, owner: Uuid) -> AppResult<HomeStats> {
        let start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1);

        let count_entries = self
            .uow
            .notes()
            .count_updated_between(owner, start, end)
            .await?;
        Ok(HomeStats { count_entries })
    }

    async fn attach_picture(
        &self,
        owner: Uuid,
        id: Uuid,
        upload: ImageUpload,
    ) -> AppResult<ExperimentNote> {
        let extension = upload.extension_for("picture")?;
        let mut note = self.owned_note(owner, id).await?;

        let path = self
            .media
            .save(MEDIA_DIR_NOTE_PICTURES, &extension, upload.bytes)
            .await?;
        let previous = note.picture.replace(path.clone());
        note.touch(Utc::now());

        let saved = match self.uow.notes().update(&note).await {
            Ok(saved) => saved,
            Err(e) => {
                self.discard_media(&path).await;
                return Err(e);
            }
        };
        self.invalidate(owner).await;

        if let Some(previous) = previous {
            self.discard_media(&previous).await;
        }
        Ok(saved)
    }
}
