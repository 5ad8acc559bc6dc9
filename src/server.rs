//!
//! bytevault HTTP server
//! ---------------------
//! This module defines the Axum-based HTTP API for the vault.
//!
//! Responsibilities:
//! - Interactive login/logout with an opaque session cookie.
//! - Basic-Auth extraction for the programmatic API endpoints.
//! - Upload/list/delete endpoints delegating to the vault, all behind the
//!   authorization gate (the vault never sees an unauthenticated caller).
//! - Startup wiring: config, credential store, session store, vault root.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::identity::{
    authorize, AuthOutcome, CredentialStore, InlineCredentials, OperationClass, Principal,
    RequestCredentials, SessionStore,
};
use crate::vault::{StoredObject, Vault};

const SESSION_COOKIE: &str = "bytevault_session";
const BASIC_CHALLENGE: &str = "Basic realm=\"ByteVault API\"";

/// Shared server state injected into all handlers.
///
/// Owns the credential store, the session store and the vault; constructed
/// once at startup and cloned (cheaply, via `Arc`) into each handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<CredentialStore>,
    pub sessions: Arc<SessionStore>,
    pub vault: Arc<Vault>,
}

/// Build the process state from configuration: hash the configured secrets
/// into the credential store and open (or re-open) the vault root.
pub fn build_state(cfg: &Config) -> anyhow::Result<AppState> {
    let users = CredentialStore::new(
        &cfg.admin_username,
        &cfg.admin_password,
        &cfg.user_username,
        &cfg.user_password,
    )?;
    let vault = Vault::open(&cfg.upload_root)?;
    Ok(AppState {
        users: Arc::new(users),
        sessions: Arc::new(SessionStore::default()),
        vault: Arc::new(vault),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "bytevault ok" }))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/dashboard", get(dashboard))
        .route("/upload", post(upload))
        .route("/files", get(list_files))
        .route("/files/{name}", delete(delete_file))
        .with_state(state)
}

pub async fn run_with_config(cfg: Config) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "bytevault starting: http_port={}, upload_root='{}', admin_username='{}', user_username='{}'",
        cfg.http_port, cfg.upload_root, cfg.admin_username, cfg.user_username
    );
    let http_port = cfg.http_port;
    let state = build_state(&cfg)?;
    info!(target: "startup", "vault indexed {} object(s) under '{}'", state.vault.list().len(), cfg.upload_root);

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point reading everything from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()).await
}

#[derive(Debug, Deserialize)]
struct LoginPayload { username: String, password: String }

/// One row of the `/files` listing; `path` mirrors where the blob would be
/// served from and is kept for client compatibility.
#[derive(Debug, Serialize)]
struct FileEntry {
    name: String,
    path: String,
    size: u64,
    created: chrono::DateTime<chrono::Utc>,
    modified: chrono::DateTime<chrono::Utc>,
}

impl From<StoredObject> for FileEntry {
    fn from(obj: StoredObject) -> Self {
        Self {
            path: format!("/uploads/{}", obj.name),
            name: obj.name,
            size: obj.size,
            created: obj.created,
            modified: obj.modified,
        }
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

/// Decode an `Authorization: Basic` header into an inline credential pair.
fn basic_credentials(headers: &HeaderMap) -> Option<InlineCredentials> {
    let header = headers.get("authorization")?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ").or_else(|| header.strip_prefix("basic "))?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(InlineCredentials { username: username.to_string(), password: password.to_string() })
}

/// Gather both credential paths from one request's headers.
fn request_credentials(headers: &HeaderMap) -> RequestCredentials {
    RequestCredentials {
        inline: basic_credentials(headers),
        session_token: parse_cookie(headers, SESSION_COOKIE),
    }
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, token)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

/// Render an `AppError` as the JSON error body the API speaks. 401 responses
/// carry the Basic challenge so programmatic callers know which scheme the
/// API accepts.
fn app_error_response(err: &AppError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    if status == StatusCode::UNAUTHORIZED {
        headers.insert("WWW-Authenticate", HeaderValue::from_static(BASIC_CHALLENGE));
    }
    (status, headers, Json(json!({"error": err.message()}))).into_response()
}

/// Run the gate for an API-class request; the error branch is a ready-made
/// challenge response.
fn require_api(state: &AppState, headers: &HeaderMap) -> Result<Principal, Response> {
    let creds = request_credentials(headers);
    match authorize(&state.users, &state.sessions, &creds, OperationClass::Api) {
        AuthOutcome::Authorized(principal) => Ok(principal),
        AuthOutcome::Denied(e) => Err(app_error_response(&e)),
        // The gate never redirects API-class requests; deny defensively.
        AuthOutcome::RedirectToLogin => {
            Err(app_error_response(&AppError::auth("auth_required", "authentication required")))
        }
    }
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match state.users.verify(&payload.username, &payload.password) {
        Ok(principal) => {
            let session = state.sessions.create(principal.clone());
            info!(target: "bytevault::auth", "login user='{}' role={:?}", principal.username, principal.role);
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&session.token));
            (
                StatusCode::OK,
                headers,
                Json(json!({"success": true, "redirect": "/dashboard", "username": principal.username, "role": principal.role})),
            )
        }
        Err(e) => {
            info!(target: "bytevault::auth", "login rejected user='{}'", payload.username);
            (StatusCode::UNAUTHORIZED, HeaderMap::new(), Json(json!({"error": e.message()})))
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = parse_cookie(&headers, SESSION_COOKIE) {
        state.sessions.destroy(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    h.insert("Location", HeaderValue::from_static("/login"));
    (StatusCode::SEE_OTHER, h)
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let creds = request_credentials(&headers);
    match authorize(&state.users, &state.sessions, &creds, OperationClass::Interactive) {
        AuthOutcome::Authorized(principal) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "username": principal.username, "role": principal.role})),
        )
            .into_response(),
        AuthOutcome::RedirectToLogin => Redirect::to("/login").into_response(),
        AuthOutcome::Denied(e) => app_error_response(&e),
    }
}

async fn upload(State(state): State<AppState>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    let principal = match require_api(&state, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    // Take the first field named "file"; anything else in the form is ignored.
    let mut upload_part: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") { continue; }
                let original = field.file_name().unwrap_or("upload").to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        upload_part = Some((original, bytes.to_vec()));
                        break;
                    }
                    Err(e) => {
                        error!(target: "bytevault::vault", "upload read failed: {e}");
                        return app_error_response(&AppError::user("upload_read_failed", "could not read file field"));
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!(target: "bytevault::vault", "multipart parse failed: {e}");
                return app_error_response(&AppError::user("bad_multipart", "malformed multipart body"));
            }
        }
    }
    let Some((original, bytes)) = upload_part else {
        return app_error_response(&AppError::user("no_file", "No file uploaded"));
    };
    match state.vault.put(&original, &bytes) {
        Ok(obj) => {
            info!(target: "bytevault::vault", "upload user='{}' name='{}' size={}", principal.username, obj.name, obj.size);
            (
                StatusCode::OK,
                Json(json!({"message": "File uploaded successfully", "filename": obj.name, "size": obj.size})),
            )
                .into_response()
        }
        Err(e) => {
            error!(target: "bytevault::vault", "upload failed: {e}");
            app_error_response(&e)
        }
    }
}

async fn list_files(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_api(&state, &headers) {
        return resp;
    }
    let files: Vec<FileEntry> = state.vault.list().into_iter().map(FileEntry::from).collect();
    (StatusCode::OK, Json(files)).into_response()
}

async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let principal = match require_api(&state, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.vault.delete(&name) {
        Ok(()) => {
            info!(target: "bytevault::vault", "delete user='{}' name='{}'", principal.username, name);
            (StatusCode::OK, Json(json!({"message": "File deleted successfully"}))).into_response()
        }
        Err(e) => app_error_response(&e),
    }
}
