//! HTTP server for the browser chat widget.
//!
//! Serves the widget page and streams answers as Server-Sent Events.

mod widget;

pub use widget::render_page;

use crate::assistant::{Assistant, ChatUpdate};
use crate::config::UiSettings;
use crate::error::Result;
use crate::session::SessionStore;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    assistant: Assistant,
    ui: UiSettings,
    page: String,
}

impl AppState {
    pub fn new(assistant: Assistant, ui: UiSettings) -> Self {
        let page = render_page(&ui);
        Self {
            assistant,
            ui,
            page,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/avatar", get(avatar))
        .route("/health", get(health))
        .route("/api/ui", get(ui_settings))
        .route("/api/chat", post(chat))
        .route("/api/sessions/{session_id}", delete(clear_session))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct SessionEvent<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct ClearResponse {
    session_id: String,
    cleared: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn ui_settings(State(state): State<Arc<AppState>>) -> Json<UiSettings> {
    Json(state.ui.clone())
}

async fn avatar(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(path) = state.ui.avatar_path.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let path = crate::config::Settings::expand_path(path);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, image_content_type(&path))], bytes).into_response(),
        Err(e) => {
            warn!("Cannot read avatar {}: {}", path.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatBody>) -> Response {
    let session_id = match resolve_session(state.assistant.sessions(), body.session_id) {
        Ok(id) => id,
        Err(e) => return internal_error(e.to_string()),
    };

    let opening = Event::default()
        .event("session")
        .json_data(SessionEvent {
            session_id: &session_id,
        });

    let updates = state
        .assistant
        .chat(Some(&session_id), &body.message)
        .map(|update: ChatUpdate| Event::default().event(update.event_name()).json_data(&update));

    Sse::new(futures::stream::once(async move { opening }).chain(updates))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Keep a session the server issued earlier; anything else gets a fresh id.
fn resolve_session(sessions: &SessionStore, requested: Option<String>) -> Result<String> {
    if let Some(id) = requested.filter(|id| !id.trim().is_empty()) {
        if sessions.contains(&id)? {
            return Ok(id);
        }
        debug!("Unknown session {}, issuing a new one", id);
    }

    let id = uuid::Uuid::new_v4().to_string();
    sessions.register(&id)?;
    Ok(id)
}

fn internal_error(error: String) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error })).into_response()
}

async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.assistant.sessions().clear(&session_id) {
        Ok(cleared) => Json(ClearResponse {
            session_id,
            cleared,
        })
        .into_response(),
        Err(e) => internal_error(e.to_string()),
    }
}

fn image_content_type(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
