//! REST API server for the underwriting orchestrator
//!
//! Exposes document analysis and follow-up chat via HTTP endpoints.
//! The server holds no session state: the analyze response hands back the
//! encoded artifacts, and every chat request re-supplies artifacts,
//! history, and profile.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::conversation::ConversationOrchestrator;
use crate::encoder;
use crate::error::UnderwritingError;
use crate::extraction::ExtractionOrchestrator;
use crate::models::{ConversationTurn, LoanProfile, TurnRole, UploadedArtifact};

/// Upload cap: a handful of 10 MB documents plus multipart overhead.
const MAX_UPLOAD_BYTES: usize = 45 * 1024 * 1024;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

/// An encoded document exactly as the analyze response handed it back.
#[derive(Debug, Deserialize)]
pub struct ArtifactPayload {
    pub id: Uuid,
    pub name: String,
    pub media_type: String,
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactPayload>,
    #[serde(default)]
    pub profile: Option<LoanProfile>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub extraction: Arc<ExtractionOrchestrator>,
    pub conversation: Arc<ConversationOrchestrator>,
}

/// =============================
/// Helpers
/// =============================

/// Map each failure onto its transport status.
fn error_status(error: &UnderwritingError) -> StatusCode {
    match error {
        UnderwritingError::EmptyArtifactSet => StatusCode::BAD_REQUEST,
        UnderwritingError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        UnderwritingError::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
        UnderwritingError::TransportFailure(_)
        | UnderwritingError::EmptyResponse
        | UnderwritingError::MalformedOutput(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Analyze Endpoint
/// =============================

/// Accepts a multipart upload of financial documents, encodes each file,
/// and runs one extraction. The response carries the encoded artifacts and
/// a seeded opening turn so the client can start a grounded chat.
async fn analyze_documents(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ApiResponse>) {
    let mut artifacts = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error("Malformed multipart upload".to_string())),
                );
            }
        };

        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("document-{}", artifacts.len() + 1));
        let declared_type = field.content_type().map(str::to_string);

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error("Failed to read file data".to_string())),
                );
            }
        };

        // Browsers declare the type; fall back to the filename extension
        let media_type = declared_type.unwrap_or_else(|| {
            mime_guess::from_path(&name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string()
        });

        match encoder::encode_bytes(&name, &media_type, &bytes) {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) => return (error_status(&e), Json(ApiResponse::error(e.to_string()))),
        }
    }

    info!(artifact_count = artifacts.len(), "Received analyze request");

    match state.extraction.analyze(&artifacts).await {
        Ok(profile) => {
            let seed_turn = ConversationTurn::analysis_summary(&profile, artifacts.len());
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "profile": profile,
                    "artifacts": artifacts,
                    "seed_turn": seed_turn,
                }))),
            )
        }
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(format!("Analysis failed: {}", e))),
        ),
    }
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No message provided".to_string())),
        );
    }

    // Re-supplied artifacts still pass the media allowlist
    let mut artifacts: Vec<UploadedArtifact> = Vec::with_capacity(req.artifacts.len());
    for wire in req.artifacts {
        match encoder::from_encoded(wire.id, &wire.name, &wire.media_type, wire.payload) {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) => return (error_status(&e), Json(ApiResponse::error(e.to_string()))),
        }
    }

    info!(
        history_len = req.history.len(),
        artifact_count = artifacts.len(),
        has_profile = req.profile.is_some(),
        "Received chat request"
    );

    let history: Vec<ConversationTurn> = req
        .history
        .into_iter()
        .map(|turn| ConversationTurn::new(turn.role, turn.text))
        .collect();

    match state
        .conversation
        .ask(&history, &req.message, &artifacts, req.profile.as_ref())
        .await
    {
        Ok(answer) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "answer": answer }))),
        ),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(format!("Chat turn failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(
    extraction: Arc<ExtractionOrchestrator>,
    conversation: Arc<ConversationOrchestrator>,
) -> Router {
    let state = ApiState {
        extraction,
        conversation,
    };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/analyze", post(analyze_documents))
        .route("/api/chat", post(chat_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    extraction: Arc<ExtractionOrchestrator>,
    conversation: Arc<ConversationOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(extraction, conversation);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
