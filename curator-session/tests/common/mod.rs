//! In-process mock of the Curator backend for integration tests.
//!
//! Every handler records a call under `"<METHOD> <path>"` so tests can assert
//! exact call counts.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};
use session::{ApiClient, SessionManager, TokenStore};
use shared::models::RolePolicy;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;
use url::Url;

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "secret";

/// Mutable backend behaviour.
#[derive(Debug)]
pub struct Backend {
    pub calls: HashMap<String, usize>,
    pub authorization_seen: Vec<(String, Option<String>)>,
    pub issued_access: String,
    pub issued_refresh: String,
    pub accepted_access: HashSet<String>,
    pub accepted_refresh: Option<String>,
    pub refreshed_access: String,
    pub honor_refreshed: bool,
    pub user: Value,
    pub me_delay: Option<Duration>,
    pub me_failure: Option<StatusCode>,
    pub create_delay: Option<Duration>,
    pub last_avatar_body: Option<Vec<u8>>,
    pub last_avatar_content_type: Option<String>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            calls: HashMap::new(),
            authorization_seen: Vec::new(),
            issued_access: "A1".to_string(),
            issued_refresh: "R1".to_string(),
            accepted_access: HashSet::from(["A1".to_string()]),
            accepted_refresh: Some("R1".to_string()),
            refreshed_access: "A2".to_string(),
            honor_refreshed: true,
            user: json!({
                "id": 1,
                "email": EMAIL,
                "first_name": "Ada",
                "last_name": "Byron",
                "phone_number": null,
                "avatar": null,
                "is_staff": true
            }),
            me_delay: None,
            me_failure: None,
            create_delay: None,
            last_avatar_body: None,
            last_avatar_content_type: None,
        }
    }
}

type Shared = Arc<Mutex<Backend>>;

fn record(state: &Shared, key: &str, headers: &HeaderMap) -> Option<String> {
    let token = bearer(headers);
    let mut backend = state.lock().unwrap();
    *backend.calls.entry(key.to_string()).or_default() += 1;
    backend
        .authorization_seen
        .push((key.to_string(), token.clone()));
    token
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn token_rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })),
    )
        .into_response()
}

fn authorized(state: &Shared, token: Option<&String>) -> bool {
    token.is_some_and(|token| state.lock().unwrap().accepted_access.contains(token))
}

async fn create_tokens(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST /auth/jwt/create", &headers);
    let delay = state.lock().unwrap().create_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        let backend = state.lock().unwrap();
        (
            StatusCode::OK,
            Json(json!({"access": backend.issued_access, "refresh": backend.issued_refresh})),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response()
    }
}

async fn refresh(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST /auth/jwt/refresh", &headers);
    let mut backend = state.lock().unwrap();
    let accepted = backend
        .accepted_refresh
        .as_deref()
        .is_some_and(|refresh| body["refresh"] == refresh);
    if accepted {
        let access = backend.refreshed_access.clone();
        if backend.honor_refreshed {
            backend.accepted_access.insert(access.clone());
        }
        (StatusCode::OK, Json(json!({ "access": access }))).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        )
            .into_response()
    }
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let token = record(&state, "GET /auth/users/me/", &headers);
    let delay = state.lock().unwrap().me_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = state.lock().unwrap().me_failure {
        return (status, Json(json!({"detail": "Service unavailable"}))).into_response();
    }
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    Json(state.lock().unwrap().user.clone()).into_response()
}

async fn update_me(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let token = record(&state, "PATCH /auth/users/me/", &headers);
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    if body["email"] == "" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["This field may not be blank."]})),
        )
            .into_response();
    }
    let mut backend = state.lock().unwrap();
    if let (Some(user), Some(patch)) = (backend.user.as_object_mut(), body.as_object()) {
        for (key, value) in patch {
            user.insert(key.clone(), value.clone());
        }
    }
    Json(backend.user.clone()).into_response()
}

async fn avatar(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let token = record(&state, "PATCH /auth/users/avatar/", &headers);
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("multipart/form-data") {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(json!({"detail": "Unsupported media type"})),
        )
            .into_response();
    }
    let text = String::from_utf8_lossy(&body).to_string();
    if !text.contains("name=\"avatar\"") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"avatar": ["No file was submitted."]})),
        )
            .into_response();
    }
    let mut backend = state.lock().unwrap();
    backend.last_avatar_body = Some(body.to_vec());
    backend.last_avatar_content_type = Some(content_type);
    backend.user["avatar"] = json!("/media/avatars/1.png");
    Json(backend.user.clone()).into_response()
}

async fn register(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST /auth/users/", &headers);
    if body["password"] != body["re_password"] {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"non_field_errors": ["The two password fields didn't match."]})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 2,
            "email": body["email"],
            "first_name": body["first_name"],
            "last_name": body["last_name"],
            "phone_number": body.get("phone_number").cloned().unwrap_or(Value::Null),
            "is_staff": false
        })),
    )
        .into_response()
}

async fn set_password(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let token = record(&state, "POST /auth/users/set_password/", &headers);
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    if body["current_password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"current_password": ["Invalid password."]})),
        )
            .into_response();
    }
    if body["new_password"] != body["re_new_password"] {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"non_field_errors": ["The two password fields didn't match."]})),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn reset_password(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> Response {
    record(&state, "POST /auth/users/reset_password/", &headers);
    StatusCode::NO_CONTENT.into_response()
}

async fn list_events(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let token = record(&state, "GET /events/", &headers);
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    Json(json!({
        "count": 2,
        "results": [
            {"id": 1, "title": "Opening night"},
            {"id": 2, "title": "Closing gala"}
        ]
    }))
    .into_response()
}

async fn search_events(
    State(state): State<Shared>,
    headers: HeaderMap,
    axum::extract::RawQuery(query): axum::extract::RawQuery,
) -> Response {
    let token = record(&state, "GET /events/search/", &headers);
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    Json(json!({ "query": query.unwrap_or_default() })).into_response()
}

async fn create_event(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let token = record(&state, "POST /events/", &headers);
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    if body["title"].as_str().unwrap_or_default().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"title": ["This field may not be blank."]})),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(json!({"id": 3, "title": body["title"]}))).into_response()
}

async fn delete_event(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let token = record(&state, &format!("DELETE /events/{id}/"), &headers);
    if !authorized(&state, token.as_ref()) {
        return token_rejected();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn broken(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "GET /broken/", &headers);
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/html")],
        "<html>502 Bad Gateway</html>",
    )
        .into_response()
}

/// Running mock backend bound to an ephemeral local port.
#[derive(Debug, Clone)]
pub struct MockBackend {
    pub base_url: Url,
    state: Shared,
}

impl MockBackend {
    /// Start a backend with the default behaviour.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(Backend::default()));
        let app = Router::new()
            .route("/api/auth/jwt/create", post(create_tokens))
            .route("/api/auth/jwt/refresh", post(refresh))
            .route("/api/auth/users/", post(register))
            .route("/api/auth/users/me/", get(me).patch(update_me))
            .route("/api/auth/users/avatar/", patch(avatar))
            .route("/api/auth/users/set_password/", post(set_password))
            .route("/api/auth/users/reset_password/", post(reset_password))
            .route("/api/events/", get(list_events).post(create_event))
            .route("/api/events/search/", get(search_events))
            .route("/api/events/{id}/", delete(delete_event))
            .route("/api/broken/", get(broken))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/api/")).unwrap(),
            state,
        }
    }

    /// Adjust backend behaviour.
    pub fn configure(&self, change: impl FnOnce(&mut Backend)) {
        change(&mut self.state.lock().unwrap());
    }

    /// Calls recorded for `key`, e.g. `"POST /auth/jwt/refresh"`.
    pub fn calls(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// Total calls across every endpoint.
    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    /// Bearer tokens sent to `key`, in order.
    pub fn tokens_seen(&self, key: &str) -> Vec<Option<String>> {
        self.state
            .lock()
            .unwrap()
            .authorization_seen
            .iter()
            .filter(|(seen, _)| seen == key)
            .map(|(_, token)| token.clone())
            .collect()
    }

    /// Read backend state.
    pub fn inspect<R>(&self, read: impl FnOnce(&Backend) -> R) -> R {
        read(&self.state.lock().unwrap())
    }

    /// API client against this backend.
    pub fn api(&self, store: Arc<dyn TokenStore>) -> ApiClient {
        ApiClient::new(self.base_url.clone(), store).unwrap()
    }

    /// Session manager against this backend.
    pub fn manager(&self, store: Arc<dyn TokenStore>, policy: RolePolicy) -> SessionManager {
        SessionManager::new(self.api(store), policy)
    }
}
