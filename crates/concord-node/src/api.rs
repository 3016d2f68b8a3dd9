//! HTTP API for the Concord node.

use crate::engine::ScenarioEngine;
use crate::error::{Error, Result};
use crate::storage::sanitize_segment;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use concord_format::decode_lossy;
use concord_vote::{
    epoch_now, render_presence, CancelOutcome, CastRequest, Heartbeat, PresenceTracker,
    StartRequest, UserRequest, VoteCoordinator,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state behind every handler.
pub struct AppState {
    pub engine: ScenarioEngine,
    pub votes: VoteCoordinator<Arc<PresenceTracker>>,
    pub presence: Arc<PresenceTracker>,
}

type SharedState = Arc<AppState>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Build the API router.
pub fn build_router(state: SharedState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        // Scenario modules
        .route("/scenarios/:save/", get(list_records))
        .route("/scenarios/:save/:module", get(read_module).post(upload_module))
        .route("/scenarios/:save/SCANcontroller/user/:user", get(read_user_snapshot))
        // Tech unlock votes
        .route("/vote/start/:save/:tech", post(vote_start))
        .route("/vote/cast/:save/:tech", post(vote_cast))
        .route("/vote/cancel/:save/:tech", post(vote_cancel))
        .route("/vote/status/:save/:tech", get(vote_status))
        .route("/vote/open/:save", get(vote_open))
        // Presence
        .route("/presence", get(presence_list))
        .route(
            "/presence/:user",
            get(presence_get).post(presence_post).delete(presence_delete),
        )
        // Orbit board
        .route("/orbits/:save", get(orbits_get).post(orbits_post))
        // Science projections
        .route("/science/archives/:save", get(science_archives))
        .route("/science/ledger/:save", get(science_ledger))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Helpers ---

fn text(body: impl Into<String>) -> Response {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], body.into()).into_response()
}

/// Uncached text response.
fn fresh_text(body: impl Into<String>) -> Response {
    (
        [
            (header::CONTENT_TYPE, TEXT_PLAIN),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body.into(),
    )
        .into_response()
}

/// Strong ETag over the body.
pub fn etag(body: &str) -> String {
    format!("\"{}\"", hex::encode(blake3::hash(body.as_bytes()).as_bytes()))
}

/// Converged read: uncached, tagged, and `304` when the client already has it.
fn converged(headers: &HeaderMap, body: String) -> Response {
    let tag = etag(&body);
    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|t| t.trim() == tag || t.trim() == "*"));

    let mut response = if matches {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        fresh_text(body)
    };
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(value) = HeaderValue::from_str(&tag) {
        headers.insert(header::ETAG, value);
    }
    response
}

#[derive(Debug, Default, Deserialize)]
struct UserQuery {
    user: Option<String>,
}

/// User from the `X-User` header, falling back to `?user=`.
fn request_user(headers: &HeaderMap, query: &UserQuery) -> Option<String> {
    headers
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| query.user.clone())
        .map(|u| sanitize_segment(&u))
        .filter(|u| u != "_")
}

// --- Health ---

async fn health() -> &'static str {
    "OK"
}

// --- Scenario endpoints ---

async fn upload_module(
    State(state): State<SharedState>,
    Path((save, module)): Path<(String, String)>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let user = request_user(&headers, &query);
    let body = decode_lossy(&body);
    let outcome = state
        .engine
        .upload(&save, &module, user.as_deref(), body.trim())
        .await?;
    Ok(text(outcome.body()))
}

async fn read_module(
    State(state): State<SharedState>,
    Path((save, module)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let body = state.engine.read(&save, &module).await?;
    Ok(converged(&headers, body))
}

async fn read_user_snapshot(
    State(state): State<SharedState>,
    Path((save, user)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let body = state.engine.user_snapshot(&save, &user)?;
    Ok(converged(&headers, body))
}

async fn list_records(
    State(state): State<SharedState>,
    Path(save): Path<String>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.engine.list_records(&save)?))
}

// --- Vote endpoints ---

fn vote_key(save: &str, tech: &str) -> (String, String) {
    (sanitize_segment(save), sanitize_segment(tech))
}

async fn vote_start(
    State(state): State<SharedState>,
    Path((save, tech)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let request = StartRequest::from_body(&body);
    let (save, tech) = vote_key(&save, &tech);
    state.votes.start(
        &save,
        &tech,
        &request.requester(),
        &request.title_or(&tech),
        request.cost(),
    );
    text("OK")
}

async fn vote_cast(
    State(state): State<SharedState>,
    Path((save, tech)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response> {
    let request = CastRequest::from_body(&body);
    let (save, tech) = vote_key(&save, &tech);
    state
        .votes
        .cast(&save, &tech, &request.voter(), request.ballot())?;
    Ok(text("OK"))
}

async fn vote_cancel(
    State(state): State<SharedState>,
    Path((save, tech)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let request = UserRequest::from_body(&body);
    let (save, tech) = vote_key(&save, &tech);
    match state.votes.cancel(&save, &tech, &request.user()) {
        CancelOutcome::NoSession => text("No vote"),
        CancelOutcome::Cancelled | CancelOutcome::Ignored => text("OK"),
    }
}

async fn vote_status(
    State(state): State<SharedState>,
    Path((save, tech)): Path<(String, String)>,
) -> Response {
    let (save, tech) = vote_key(&save, &tech);
    match state.votes.status(&save, &tech) {
        Some(status) => Json(status).into_response(),
        None => Json(json!({ "decided": false })).into_response(),
    }
}

async fn vote_open(State(state): State<SharedState>, Path(save): Path<String>) -> Response {
    let lines: Vec<String> = state
        .votes
        .open_votes(&sanitize_segment(&save))
        .iter()
        .map(ToString::to_string)
        .collect();
    text(lines.join("\n"))
}

// --- Presence endpoints ---

#[derive(Debug, Default, Deserialize)]
struct PresenceQuery {
    format: Option<String>,
}

async fn presence_list(
    State(state): State<SharedState>,
    Query(query): Query<PresenceQuery>,
) -> Response {
    let entries = state.presence.list(epoch_now());
    let json = query
        .format
        .as_deref()
        .is_some_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        Json(entries).into_response()
    } else {
        fresh_text(render_presence(&entries))
    }
}

async fn presence_get(
    State(state): State<SharedState>,
    Path(user): Path<String>,
) -> Result<Response> {
    let entry = state
        .presence
        .get(&user, epoch_now())
        .ok_or_else(|| Error::NotFound("not found".to_string()))?;
    Ok(Json(entry).into_response())
}

async fn presence_post(
    State(state): State<SharedState>,
    Path(user): Path<String>,
    body: Bytes,
) -> Response {
    let record = Heartbeat::from_body(&body).into_record(epoch_now());
    state.presence.heartbeat(&user, record);
    text("OK")
}

async fn presence_delete(State(state): State<SharedState>, Path(user): Path<String>) -> Response {
    state.presence.remove(&user);
    text("OK")
}

// --- Orbit endpoints ---

async fn orbits_post(
    State(state): State<SharedState>,
    Path(save): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    state.engine.post_orbit(&save, &decode_lossy(&body)).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn orbits_get(State(state): State<SharedState>, Path(file): Path<String>) -> Result<Response> {
    let save = file.strip_suffix(".txt").unwrap_or(&file);
    Ok(fresh_text(state.engine.orbits(save)?))
}

// --- Science projections ---

async fn science_archives(
    State(state): State<SharedState>,
    Path(save): Path<String>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.engine.archive_ids(&save)?))
}

async fn science_ledger(
    State(state): State<SharedState>,
    Path(save): Path<String>,
) -> Result<Response> {
    Ok(fresh_text(state.engine.science_ledger(&save)?))
}
