//! HTTP surface
//!
//! ## Endpoints
//!
//! - `POST /api/command` - run a typed command, speak the reply in the background
//! - `GET /api/voice` - one listen cycle, then the same pipeline; 409 while
//!   another capture is in flight
//! - `GET /api/status` - liveness and feature flags

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::errors::{JarvisError, Result};
use crate::runtime::{Runtime, UiEvent};
use crate::voice::RecognitionError;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse {
    pub status: String,
    pub command: String,
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    pub name: String,
    pub version: String,
    pub voice_enabled: bool,
}

#[derive(Clone)]
struct AppState {
    runtime: Runtime,
    /// Sink for speech progress; there is no window to show it
    events: UnboundedSender<UiEvent>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}

fn success(command: String, response: String) -> Response {
    Json(CommandResponse {
        status: "success".to_string(),
        command,
        response,
    })
    .into_response()
}

async fn handle_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Response {
    let command = request.command.trim().to_string();
    if command.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No command provided");
    }

    let reply = state.runtime.process(&command).await;
    state.runtime.speak(&reply.text, state.events.clone());

    success(command, reply.text)
}

async fn handle_voice(State(state): State<AppState>) -> Response {
    if !state.runtime.voice_enabled() {
        return error_response(StatusCode::BAD_REQUEST, "Voice features not available");
    }

    match state.runtime.listen_once().await {
        Ok((command, reply)) => success(command, reply.text),
        Err(RecognitionError::NoSpeech) => {
            error_response(StatusCode::BAD_REQUEST, "No speech detected")
        }
        Err(RecognitionError::Unintelligible) => {
            error_response(StatusCode::BAD_REQUEST, "Could not understand audio")
        }
        Err(RecognitionError::Busy) => error_response(StatusCode::CONFLICT, "Busy"),
        Err(e) => {
            error!("Voice request failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        name: "Jarvis".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        voice_enabled: state.runtime.voice_enabled(),
    })
}

pub fn router(runtime: Runtime) -> Router {
    let (events, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!("Server event: {:?}", event);
        }
    });

    Router::new()
        .route("/api/command", post(handle_command))
        .route("/api/voice", get(handle_voice))
        .route("/api/status", get(handle_status))
        .with_state(AppState { runtime, events })
}

/// Running HTTP server
pub struct JarvisServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl JarvisServer {
    /// Bind and serve in the background
    pub async fn start(runtime: Runtime, config: &ServerConfig) -> Result<Self> {
        let app = router(runtime);

        let bind_addr = config.addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| JarvisError::Server(format!("bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| JarvisError::Server(e.to_string()))?;

        info!("Server running at http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait until the server task ends
    pub async fn wait(mut self) -> Result<()> {
        (&mut self.handle)
            .await
            .map_err(|e| JarvisError::Server(format!("server task failed: {e}")))
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for JarvisServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
