//! Application route configuration.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use super::handlers::{activation_routes, auth_routes, note_routes, profile_routes};
use super::middleware::{auth_middleware, rate_limit_auth_middleware, rate_limit_middleware};
use super::AppState;
use crate::config::MAX_IMAGE_SIZE_BYTES;

/// Uploads slightly over the image limit still reach the validator, which
/// reports them per field instead of a bare 413.
const MAX_BODY_BYTES: usize = 2 * MAX_IMAGE_SIZE_BYTES as usize;

pub fn create_router(state: AppState) -> Router {
    let public = auth_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit_auth_middleware,
    ));

    let activation = activation_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit_middleware,
    ));

    // auth runs before the general limiter
    let protected = Router::new()
        .merge(profile_routes())
        .merge(note_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public)
        .merge(activation)
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Labbook API"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    services: ServiceHealth,
}

#[derive(Serialize)]
struct ServiceHealth {
    database: ServiceStatus,
    redis: ServiceStatus,
}

#[derive(Serialize)]
struct ServiceStatus {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ServiceStatus {
    fn from_check<E: std::fmt::Display>(result: Option<Result<(), E>>) -> Self {
        match result {
            Some(Ok(())) => Self {
                status: "healthy",
                error: None,
            },
            Some(Err(e)) => Self {
                status: "unhealthy",
                error: Some(e.to_string()),
            },
            None => Self {
                status: "unconfigured",
                error: None,
            },
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Database and Redis connectivity.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.database {
        Some(db) => Some(db.ping().await),
        None => None,
    };
    let redis = match &state.cache {
        Some(cache) => Some(cache.exists("health:ping").await.map(|_| ())),
        None => None,
    };

    let services = ServiceHealth {
        database: ServiceStatus::from_check(database),
        redis: ServiceStatus::from_check(redis),
    };
    let all_healthy = services.database.is_healthy() && services.redis.is_healthy();

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if all_healthy { "healthy" } else { "degraded" },
            services,
        }),
    )
}
