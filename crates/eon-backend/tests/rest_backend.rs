//! Drives `RestBackend` against a stand-in project served by axum.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use uuid::Uuid;

use eon_backend::{Backend, BackendError, RestBackend};
use eon_types::events::AuthEvent;
use eon_types::models::{ItemRef, SelectionSet, SparkId};

const ANON: &str = "anon-key";
const USER_ID: &str = "6f1c2c7e-0000-4000-8000-0000000000aa";
const POST_ID: &str = "6f1c2c7e-0000-4000-8000-000000000001";

#[derive(Default)]
struct Seen {
    selections: Option<Value>,
    upsert_prefer: Option<String>,
    patch_filters: HashMap<String, String>,
    likes: Vec<Value>,
    bearers: Vec<String>,
    refreshes: usize,
}

type Shared = Arc<Mutex<Seen>>;

fn user() -> Value {
    json!({
        "id": USER_ID,
        "email": "ana@example.com",
        "user_metadata": { "nickname": "ana" },
        "created_at": "2025-03-01T09:00:00Z"
    })
}

fn session_body(access: &str, refresh: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": expires_in,
        "user": user()
    })
}

fn has_anon_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON)
}

fn auth_error(error_code: &str, msg: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "code": 400, "error_code": error_code, "msg": msg })),
    )
}

async fn token(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !has_anon_key(&headers) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "msg": "bad request" })));
    }
    match q.get("grant_type").map(String::as_str) {
        Some("password") => match body["password"].as_str() {
            Some("hunter22") => (StatusCode::OK, Json(session_body("token-1", "refresh-1", 3600))),
            // Sessions that are already past their expiry when handed out.
            Some("stale22") => (StatusCode::OK, Json(session_body("token-1", "refresh-1", -60))),
            Some("revoked22") => (
                StatusCode::OK,
                Json(session_body("token-1", "refresh-revoked", -60)),
            ),
            _ => auth_error("invalid_credentials", "Invalid login credentials"),
        },
        Some("refresh_token") => {
            seen.lock().unwrap().refreshes += 1;
            match body["refresh_token"].as_str() {
                Some("refresh-1") => (StatusCode::OK, Json(session_body("token-2", "refresh-2", 3600))),
                _ => auth_error(
                    "refresh_token_not_found",
                    "Invalid Refresh Token: Refresh Token Not Found",
                ),
            }
        }
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "msg": "bad request" }))),
    }
}

async fn signup(Json(body): Json<Value>) -> impl IntoResponse {
    match body["email"].as_str() {
        Some("ana@example.com") => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "code": 422, "error_code": "user_already_exists", "msg": "User already registered" })),
        ),
        // Confirmation required: bare user, no session.
        _ => {
            let mut u = user();
            u["email"] = body["email"].clone();
            u["user_metadata"]["nickname"] = body["data"]["nickname"].clone();
            (StatusCode::OK, Json(u))
        }
    }
}

async fn logout(headers: HeaderMap) -> StatusCode {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer token-1") => StatusCode::NO_CONTENT,
        _ => StatusCode::FORBIDDEN,
    }
}

async fn posts(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    assert!(has_anon_key(&headers));
    assert_eq!(q.get("order").map(String::as_str), Some("created_at.desc"));
    assert!(q.get("select").is_some_and(|s| s.contains("replies(")));
    Json(json!([{
        "id": POST_ID,
        "content": "first",
        "author_id": USER_ID,
        "created_at": "2025-03-02T10:00:00Z",
        "profiles": { "nickname": "ana" },
        "likes": [],
        "replies": []
    }]))
}

async fn patch_posts(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    assert_eq!(
        headers.get("prefer").and_then(|v| v.to_str().ok()),
        Some("return=representation")
    );
    seen.lock().unwrap().patch_filters = q.clone();
    // Row-level filtering hides rows owned by someone else.
    if q.get("author_id") == Some(&format!("eq.{}", USER_ID)) {
        Json(json!([{ "id": POST_ID, "content": "edited" }]))
    } else {
        Json(json!([]))
    }
}

async fn get_selections(State(seen): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    let mut seen = seen.lock().unwrap();
    if let Some(bearer) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        seen.bearers.push(bearer.to_string());
    }
    match seen.selections.clone() {
        Some(s) => Json(json!([{ "selections": s }])),
        None => Json(json!([])),
    }
}

async fn post_selections(
    State(seen): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut seen = seen.lock().unwrap();
    seen.upsert_prefer = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.selections = Some(body["selections"].clone());
    StatusCode::CREATED
}

async fn post_like(State(seen): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    let mut seen = seen.lock().unwrap();
    if seen.likes.contains(&body) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "code": "23505", "message": "duplicate key value violates unique constraint" })),
        );
    }
    seen.likes.push(body);
    (StatusCode::CREATED, Json(json!(null)))
}

async fn project() -> (String, Shared) {
    let seen: Shared = Arc::default();
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/posts", get(posts).patch(patch_posts))
        .route("/rest/v1/user_selections", get(get_selections).post(post_selections))
        .route("/rest/v1/likes", post(post_like))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

async fn backend() -> (RestBackend, Shared) {
    let (url, seen) = project().await;
    let backend = RestBackend::new(reqwest::Client::new(), &url, ANON).unwrap();
    (backend, seen)
}

#[tokio::test]
async fn password_sign_in_opens_and_broadcasts_a_session() {
    let (backend, _) = backend().await;
    let mut events = backend.subscribe_auth();

    let err = backend
        .sign_in_with_password("ana@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::InvalidCredentials));
    assert!(backend.get_session().await.unwrap().is_none());

    let session = backend
        .sign_in_with_password("ana@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(session.account.nickname, "ana");
    assert!(session.expires_at.is_some());

    match events.recv().await.unwrap() {
        AuthEvent::SignedIn { session } => assert_eq!(session.access_token, "token-1"),
        other => panic!("unexpected event {:?}", other),
    }

    backend.sign_out().await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    assert!(backend.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn sign_up_handles_confirmation_and_duplicates() {
    let (backend, _) = backend().await;

    let err = backend
        .sign_up("ana@example.com", "hunter22", "ana")
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::AlreadyRegistered));

    let created = backend
        .sign_up("ben@example.com", "hunter22", "ben")
        .await
        .unwrap();
    assert_eq!(created.account.nickname, "ben");
    assert!(created.session.is_none());
    assert!(backend.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn board_reads_and_filtered_writes() {
    let (backend, seen) = backend().await;
    let posts = backend.fetch_posts().await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].author_nickname.as_deref(), Some("ana"));

    let post = ItemRef::Post(POST_ID.parse().unwrap());
    let mine: Uuid = USER_ID.parse().unwrap();
    assert_eq!(backend.update_content(post, mine, "edited").await.unwrap(), 1);
    assert_eq!(
        seen.lock().unwrap().patch_filters.get("id").map(String::as_str),
        Some(format!("eq.{}", POST_ID).as_str())
    );
    assert_eq!(
        backend
            .update_content(post, Uuid::new_v4(), "hijack")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn duplicate_like_maps_to_conflict() {
    let (backend, _) = backend().await;
    let post = ItemRef::Post(POST_ID.parse().unwrap());
    let me: Uuid = USER_ID.parse().unwrap();

    backend.insert_like(me, post).await.unwrap();
    let err = backend.insert_like(me, post).await.unwrap_err();
    assert!(matches!(err, BackendError::Conflict(_)));
}

#[tokio::test]
async fn selections_upsert_merges_on_user() {
    let (backend, seen) = backend().await;
    let me: Uuid = USER_ID.parse().unwrap();
    assert_eq!(backend.fetch_selections(me).await.unwrap(), None);

    let set = SelectionSet::from_ids([SparkId(3), SparkId(1)]);
    backend.upsert_selections(me, &set).await.unwrap();

    assert!(
        seen.lock()
            .unwrap()
            .upsert_prefer
            .as_deref()
            .is_some_and(|p| p.contains("merge-duplicates"))
    );
    assert_eq!(backend.fetch_selections(me).await.unwrap(), Some(set));
}

#[tokio::test]
async fn expired_session_is_refreshed_before_table_requests() {
    let (backend, seen) = backend().await;
    let mut events = backend.subscribe_auth();
    let me: Uuid = USER_ID.parse().unwrap();

    backend
        .sign_in_with_password("ana@example.com", "stale22")
        .await
        .unwrap();
    backend.fetch_selections(me).await.unwrap();
    backend.fetch_selections(me).await.unwrap();

    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.bearers, ["Bearer token-2", "Bearer token-2"]);
        assert_eq!(seen.refreshes, 1);
    }

    assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn { .. }));
    match events.recv().await.unwrap() {
        AuthEvent::TokenRefreshed { session } => {
            assert_eq!(session.access_token, "token-2");
            assert_eq!(session.refresh_token.as_deref(), Some("refresh-2"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    let live = backend.get_session().await.unwrap().unwrap();
    assert_eq!(live.access_token, "token-2");
}

#[tokio::test]
async fn rejected_refresh_ends_the_session() {
    let (backend, seen) = backend().await;
    let mut events = backend.subscribe_auth();
    let me: Uuid = USER_ID.parse().unwrap();

    backend
        .sign_in_with_password("ana@example.com", "revoked22")
        .await
        .unwrap();
    backend.fetch_selections(me).await.unwrap();

    assert_eq!(seen.lock().unwrap().bearers, [format!("Bearer {}", ANON)]);
    assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn { .. }));
    assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
    assert!(backend.get_session().await.unwrap().is_none());
}
