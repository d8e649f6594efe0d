//! Experiment note handlers. Every route acts on the caller's notes only.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extractors::{ImageFile, ValidatedJson};
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{ExperimentNote, HomeStats, NoteDraft, NoteOrdering, NotePatch, SearchScope};
use crate::errors::AppResult;
use crate::types::{Created, NoContent, PageRequest, Paginated, PaginationParams};

/// `?search_query=&page=&per_page=`
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search_query: String,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl SearchParams {
    fn page_request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.per_page.as_deref())
    }
}

pub fn note_routes() -> Router<AppState> {
    Router::new()
        .route("/notes/", get(list_notes).post(create_note))
        .route("/notes/search/", get(search_notes))
        .route("/notes/home-stats/", get(home_stats))
        .route(
            "/notes/:id/",
            get(get_note)
                .put(update_note)
                .patch(patch_note)
                .delete(delete_note),
        )
        .route("/notes/:id/picture/", post(upload_picture))
        // browsing views
        .route("/experiment-notes/", get(browse_notes))
        .route("/search-entries/", get(search_entries))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Paginated<ExperimentNote>>> {
    let page = state
        .note_service
        .list(user.id, NoteOrdering::RecentlyUpdated, params.to_request())
        .await?;
    Ok(Json(page))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ValidatedJson(draft): ValidatedJson<NoteDraft>,
) -> AppResult<Created<ExperimentNote>> {
    let note = state.note_service.create(user.id, draft).await?;
    Ok(Created(note))
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ExperimentNote>> {
    Ok(Json(state.note_service.get(user.id, id).await?))
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(draft): ValidatedJson<NoteDraft>,
) -> AppResult<Json<ExperimentNote>> {
    Ok(Json(state.note_service.update(user.id, id, draft).await?))
}

pub async fn patch_note(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(patch): ValidatedJson<NotePatch>,
) -> AppResult<Json<ExperimentNote>> {
    Ok(Json(state.note_service.patch(user.id, id, patch).await?))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.note_service.delete(user.id, id).await?;
    Ok(NoContent)
}

pub async fn upload_picture(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ImageFile(upload): ImageFile,
) -> AppResult<Json<ExperimentNote>> {
    let note = state
        .note_service
        .attach_picture(user.id, id, upload)
        .await?;
    Ok(Json(note))
}

/// Title or project code, most recently updated first.
pub async fn search_notes(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Paginated<ExperimentNote>>> {
    let page = state
        .note_service
        .search(
            user.id,
            &params.search_query,
            SearchScope::TitleOrCode,
            params.page_request(),
        )
        .await?;
    Ok(Json(page))
}

pub async fn home_stats(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<HomeStats>> {
    Ok(Json(state.note_service.home_stats(user.id).await?))
}

pub async fn browse_notes(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Paginated<ExperimentNote>>> {
    let page = state
        .note_service
        .list(user.id, NoteOrdering::Default, params.to_request())
        .await?;
    Ok(Json(page))
}

/// Title or comments, default ordering.
pub async fn search_entries(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Paginated<ExperimentNote>>> {
    let page = state
        .note_service
        .search(
            user.id,
            &params.search_query,
            SearchScope::TitleOrComments,
            params.page_request(),
        )
        .await?;
    Ok(Json(page))
}
