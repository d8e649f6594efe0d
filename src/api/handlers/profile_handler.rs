//! Profile handlers. Employees see and edit only their own account;
//! staff may list everyone.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extractors::{ImageFile, ValidatedJson};
use crate::api::middleware::{require_staff, CurrentUser};
use crate::api::AppState;
use crate::domain::{EmployeeResponse, ProfileChanges};
use crate::errors::AppResult;
use crate::types::NoContent;

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub force: bool,
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/", get(own_profile))
        .route(
            "/profile/:id/",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/profile/:id/avatar/", post(upload_avatar))
        .route("/users/", get(list_profiles))
}

pub async fn own_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state.account_service.get_profile(user.id, user.id).await?;
    Ok(Json(EmployeeResponse::from(employee)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state.account_service.get_profile(user.id, id).await?;
    Ok(Json(EmployeeResponse::from(employee)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(changes): ValidatedJson<ProfileChanges>,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state
        .account_service
        .update_profile(user.id, id, changes)
        .await?;
    Ok(Json(EmployeeResponse::from(employee)))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> AppResult<NoContent> {
    state
        .account_service
        .delete_profile(user.id, id, params.force)
        .await?;
    Ok(NoContent)
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ImageFile(upload): ImageFile,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state
        .account_service
        .attach_avatar(user.id, id, upload)
        .await?;
    Ok(Json(EmployeeResponse::from(employee)))
}

pub async fn list_profiles(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<EmployeeResponse>>> {
    require_staff(&user)?;
    let employees = state.account_service.list_profiles(user.id).await?;
    Ok(Json(
        employees.into_iter().map(EmployeeResponse::from).collect(),
    ))
}
