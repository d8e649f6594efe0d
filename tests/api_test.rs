//! HTTP tests that drive the router with in-memory services, without a
//! database or Redis.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{test_config, InMemoryStore, TEST_PASSWORD};
use labbook::api::middleware::RateLimitError;
use labbook::api::{create_router, AppState};
use labbook::domain::FieldErrors;
use labbook::errors::AppError;
use labbook::infra::{MemoryMailer, MockMediaStorage, MockRateLimiter, NoCache, RateLimiter};
use labbook::services::{AccountManager, Authenticator, NoteManager, Services};

struct TestApp {
    store: InMemoryStore,
    mailer: Arc<MemoryMailer>,
    router: Router,
}

fn allow_all() -> MockRateLimiter {
    let mut limiter = MockRateLimiter::new();
    limiter.expect_hit().returning(|_, _, _| Ok((1, true)));
    limiter
}

fn app_with(limiter: impl RateLimiter + 'static) -> TestApp {
    let store = InMemoryStore::new();
    let mailer = Arc::new(MemoryMailer::new());
    let uow = Arc::new(store.clone());
    let media = Arc::new(MockMediaStorage::new());

    let services = Services::new(
        Arc::new(Authenticator::new(uow.clone(), test_config())),
        Arc::new(AccountManager::new(
            uow.clone(),
            mailer.clone(),
            media.clone(),
            test_config(),
        )),
        Arc::new(NoteManager::new(uow, Arc::new(NoCache), media)),
    );

    TestApp {
        store,
        mailer,
        router: create_router(AppState::new(&services, Arc::new(limiter))),
    }
}

fn app() -> TestApp {
    app_with(allow_all())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Seed an active employee and log in as them.
    async fn login(&self, email: &str, phone: &str) -> String {
        self.store.seed_employee(email, phone);
        let (status, body) = self
            .json(
                "POST",
                "/authorization/",
                None,
                Some(json!({"email": email, "password": TEST_PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }
}

fn note_body(code: &str, title: &str) -> Value {
    json!({
        "code_of_project": code,
        "title": title,
        "optical_density": "1.25",
        "signal_level": 0.5,
    })
}

#[tokio::test]
async fn test_root_endpoint() {
    let response = app()
        .send(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_without_infrastructure_is_degraded() {
    let (status, body) = app().json("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["database"]["status"], "unconfigured");
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let app = app();
    let (status, body) = app.json("GET", "/notes/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app.json("GET", "/notes/", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_and_email_confirmation() {
    let app = app();
    let (status, body) = app
        .json(
            "POST",
            "/registration/",
            None,
            Some(json!({
                "email": "ada@lab.org",
                "phone": "+79991234567",
                "password": "s3cret-pass",
                "first_name": "Ada",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_active"], false);
    assert!(body.get("password_hash").is_none());
    assert!(body.get("token").is_none());

    let token = app.store.employees()[0].token.clone().unwrap();
    assert!(app.mailer.sent()[0].body.contains(&token));

    let uri = format!("/profile/email-confirm/{}/", token);
    let (status, body) = app.json("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);

    let (status, body) = app.json("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_registration_validation_errors_are_keyed_by_field() {
    let (status, body) = app()
        .json(
            "POST",
            "/registration/",
            None,
            Some(json!({"email": "nope", "phone": "+79991234567", "password": "s3cret-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["email"].is_array());
}

#[tokio::test]
async fn test_password_change_requires_matching_confirmation() {
    let (status, body) = app()
        .json(
            "POST",
            "/password-change/",
            None,
            Some(json!({
                "token": "abc123",
                "password": "brand-new-pass",
                "password_confirm": "brand-new-pasz"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["password_confirm"].is_array());
}

#[tokio::test]
async fn test_password_reset_link_changes_password_over_http() {
    let app = app();
    app.store.seed_employee("ada@lab.org", "+79991234567");

    let (status, _) = app
        .json(
            "POST",
            "/password-reset/",
            None,
            Some(json!({"email": "ada@lab.org"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.mailer.sent();
    let token = sent[0]
        .body
        .lines()
        .find_map(|l| l.split_once("/password-change/?token="))
        .map(|(_, token)| token.trim().to_string())
        .unwrap();
    let change = json!({
        "token": token,
        "password": "brand-new-pass",
        "password_confirm": "brand-new-pass"
    });

    let (status, _) = app
        .json("POST", "/password-change/", None, Some(change.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json("POST", "/password-change/", None, Some(change))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            "POST",
            "/authorization/",
            None,
            Some(json!({"email": "ada@lab.org", "password": TEST_PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = app();
    app.store.seed_employee("ada@lab.org", "+79991234567");
    let (status, body) = app
        .json(
            "POST",
            "/authorization/",
            None,
            Some(json!({"email": "ada@lab.org", "password": "nope-nope"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_note_crud_is_owner_scoped() {
    let app = app();
    let ada = app.login("ada@lab.org", "+79991234567").await;
    let bob = app.login("bob@lab.org", "+79997654321").await;

    let mut body = note_body("P-1", "Western blot");
    body["owner_id"] = json!(uuid::Uuid::new_v4());
    let (status, created) = app.json("POST", "/notes/", Some(&ada), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let ada_id = app.store.employees().iter().find(|e| e.email == "ada@lab.org").unwrap().id;
    assert_eq!(created["owner_id"], json!(ada_id));
    assert_eq!(created["optical_density"], "1.25");

    let uri = format!("/notes/{}/", created["id"].as_str().unwrap());
    let (status, _) = app.json("GET", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, patched) = app
        .json("PATCH", &uri, Some(&ada), Some(json!({"title": "Renamed"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["title"], "Renamed");
    assert_eq!(patched["code_of_project"], "P-1");

    let (status, listing) = app.json("GET", "/notes/", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["meta"]["total"], 0);

    let (status, _) = app.json("DELETE", &uri, Some(&ada), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.json("GET", &uri, Some(&ada), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_code_is_integrity_error() {
    let app = app();
    let ada = app.login("ada@lab.org", "+79991234567").await;
    app.json("POST", "/notes/", Some(&ada), Some(note_body("P-1", "One")))
        .await;

    let (status, body) = app
        .json("POST", "/notes/", Some(&ada), Some(note_body("P-1", "Two")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INTEGRITY_ERROR");
}

#[tokio::test]
async fn test_search_pagination_and_stats_endpoints() {
    let app = app();
    let ada = app.login("ada@lab.org", "+79991234567").await;
    for i in 0..12 {
        let (status, _) = app
            .json(
                "POST",
                "/notes/",
                Some(&ada),
                Some(note_body(&format!("GEL-{}", i), &format!("Gel {}", i))),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, page) = app.json("GET", "/notes/?page=abc", Some(&ada), None).await;
    assert_eq!(page["meta"]["page"], 1);
    assert_eq!(page["data"].as_array().unwrap().len(), 10);

    let (_, page) = app.json("GET", "/experiment-notes/?page=99", Some(&ada), None).await;
    assert_eq!(page["meta"]["page"], 2);

    let (_, found) = app
        .json("GET", "/notes/search/?search_query=gel-1", Some(&ada), None)
        .await;
    // GEL-1, GEL-10, GEL-11
    assert_eq!(found["meta"]["total"], 3);

    let (_, found) = app
        .json("GET", "/search-entries/?search_query=nothing", Some(&ada), None)
        .await;
    assert_eq!(found["meta"]["total"], 0);

    let (status, stats) = app.json("GET", "/notes/home-stats/", Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["count_entries"], 12);
}

#[tokio::test]
async fn test_profile_endpoints() {
    let app = app();
    let ada = app.login("ada@lab.org", "+79991234567").await;
    app.store.seed_employee("bob@lab.org", "+79997654321");
    let bob_id = app.store.employees().iter().find(|e| e.email == "bob@lab.org").unwrap().id;

    let (status, me) = app.json("GET", "/profile/", Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@lab.org");

    let (status, _) = app
        .json("GET", &format!("/profile/{}/", bob_id), Some(&ada), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.json("GET", "/users/", Some(&ada), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rate_limited_requests_get_429() {
    let mut limiter = MockRateLimiter::new();
    limiter.expect_hit().returning(|_, _, _| Ok((11, false)));
    let app = app_with(limiter);

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/authorization/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"a@lab.org","password":"x"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_rate_limiter_failure_fails_closed() {
    let mut limiter = MockRateLimiter::new();
    limiter
        .expect_hit()
        .returning(|_, _, _| Err(AppError::internal("redis down")));
    let (status, _) = app_with(limiter)
        .json(
            "POST",
            "/password-recovery/",
            None,
            Some(json!({"email": "a@lab.org"})),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[test]
fn test_app_error_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
        (AppError::Forbidden, StatusCode::FORBIDDEN),
        (AppError::NotFound, StatusCode::NOT_FOUND),
        (
            AppError::Validation(FieldErrors::single("title", "blank")),
            StatusCode::BAD_REQUEST,
        ),
        (AppError::duplicate("email"), StatusCode::BAD_REQUEST),
        (AppError::mail("smtp down"), StatusCode::BAD_GATEWAY),
        (AppError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (error, expected) in cases {
        assert_eq!(error.into_response().status(), expected);
    }
}

#[test]
fn test_rate_limit_error_is_429() {
    let response = RateLimitError { retry_after: 30 }.into_response();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
