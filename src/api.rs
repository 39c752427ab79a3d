//! HTTP surface for the chat runtime.
//!
//! The `/chat/send` and `/chat/test` response shapes are the request layer's
//! contract with callers: `{success, content | error}` and
//! `{success, message}`. Chat failures come back as payloads, not HTTP
//! errors, so a degraded reply still renders as a normal message.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::extractor::ProfileRecord;
use crate::persona::PersonaConfig;
use crate::responder::TROUBLE_MESSAGE;
use crate::runtime::{Runtime, SessionView};
use crate::session::ChatMessage;
use crate::store::{KEY_API_KEY, KEY_PERSONALITY};

pub struct AppState {
    pub runtime: Runtime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NavigateRequest {
    #[schema(example = "https://www.linkedin.com/in/jane-doe/")]
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfo {
    pub session_id: String,
    pub profile: ProfileRecord,
    pub is_own_profile: bool,
    pub welcome_message: String,
    pub message_count: usize,
}

impl From<SessionView> for SessionInfo {
    fn from(view: SessionView) -> Self {
        SessionInfo {
            session_id: view.id.to_string(),
            profile: view.profile,
            is_own_profile: view.is_own_profile,
            welcome_message: view.welcome_message,
            message_count: view.history.len(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatSendRequest {
    #[schema(example = "What are your skills?")]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatSendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatTestResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

/// Open a chat session for a profile page.
#[utoipa::path(
    post,
    path = "/session/navigate",
    request_body = NavigateRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionInfo),
        (status = 400, description = "Not a profile page")
    ),
    tag = "session"
)]
pub async fn navigate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<SessionInfo>, StatusCode> {
    match state.runtime.navigate(&req.url).await {
        Ok(view) => Ok(Json(view.into())),
        Err(e) => {
            tracing::warn!("navigate failed: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// The currently active session, if any.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Active session", body = SessionInfo),
        (status = 404, description = "No active session")
    ),
    tag = "session"
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionInfo>, StatusCode> {
    match state.runtime.current().await {
        Some(view) => Ok(Json(view.into())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Send one visitor message and get the persona's reply.
#[utoipa::path(
    post,
    path = "/chat/send",
    request_body = ChatSendRequest,
    responses((status = 200, description = "Reply or structured failure", body = ChatSendResponse)),
    tag = "chat"
)]
pub async fn send_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatSendRequest>,
) -> Json<ChatSendResponse> {
    match state.runtime.send_message(&req.message).await {
        Ok(content) => Json(ChatSendResponse { success: true, content: Some(content), error: None }),
        Err(e) => {
            tracing::error!("send failed: {}", e);
            Json(ChatSendResponse {
                success: false,
                content: Some(TROUBLE_MESSAGE.to_string()),
                error: Some(e.to_string()),
            })
        }
    }
}

/// Verify the stored API credential against the completion endpoint.
#[utoipa::path(
    post,
    path = "/chat/test",
    responses((status = 200, description = "Connection test result", body = ChatTestResponse)),
    tag = "chat"
)]
pub async fn test_chat(State(state): State<Arc<AppState>>) -> Json<ChatTestResponse> {
    let (success, message) = state.runtime.test_credential().await;
    Json(ChatTestResponse { success, message })
}

/// The stored persona record (defaults when none saved yet).
#[utoipa::path(
    get,
    path = "/persona",
    responses((status = 200, description = "Persona record", body = PersonaConfig)),
    tag = "persona"
)]
pub async fn get_persona(State(state): State<Arc<AppState>>) -> Json<PersonaConfig> {
    let config: Option<PersonaConfig> = state.runtime.store().get(KEY_PERSONALITY).await;
    Json(config.unwrap_or_default())
}

/// Save the persona record. The name is required; it anchors the
/// ownership match.
#[utoipa::path(
    put,
    path = "/persona",
    request_body = PersonaConfig,
    responses(
        (status = 200, description = "Saved", body = StatusResponse),
        (status = 400, description = "Missing name")
    ),
    tag = "persona"
)]
pub async fn put_persona(
    State(state): State<Arc<AppState>>,
    Json(mut config): Json<PersonaConfig>,
) -> Result<Json<StatusResponse>, StatusCode> {
    if config.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    config.last_updated = Some(Utc::now());
    if let Err(e) = state.runtime.store().set(KEY_PERSONALITY, &config).await {
        tracing::error!("failed to persist persona: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(StatusResponse { success: true, message: "Personality saved successfully!".to_string() }))
}

/// Reset the persona record and credential to defaults.
#[utoipa::path(
    post,
    path = "/persona/reset",
    responses((status = 200, description = "Reset", body = StatusResponse)),
    tag = "persona"
)]
pub async fn reset_persona(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let store = state.runtime.store();
    if let Err(e) = store.set(KEY_PERSONALITY, &PersonaConfig::default()).await {
        tracing::error!("failed to reset persona: {}", e);
    }
    if let Err(e) = store.set(KEY_API_KEY, &String::new()).await {
        tracing::error!("failed to clear credential: {}", e);
    }
    Json(StatusResponse { success: true, message: "Settings reset to default".to_string() })
}

/// Store the API credential. Sanitization happens per remote call, so the
/// raw value is kept as entered.
#[utoipa::path(
    put,
    path = "/credential",
    request_body = CredentialRequest,
    responses((status = 200, description = "Stored", body = StatusResponse)),
    tag = "persona"
)]
pub async fn put_credential(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialRequest>,
) -> Result<Json<StatusResponse>, StatusCode> {
    if let Err(e) = state.runtime.store().set(KEY_API_KEY, &req.api_key.trim().to_string()).await {
        tracing::error!("failed to persist credential: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(StatusResponse { success: true, message: "API key saved".to_string() }))
}

/// Full transcript of the active session.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Transcript", body = [ChatMessage]),
        (status = 404, description = "No active session")
    ),
    tag = "chat"
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    state.runtime.history().await.map(Json).map_err(|_| StatusCode::NOT_FOUND)
}

/// Wipe the active session's history.
#[utoipa::path(
    delete,
    path = "/history",
    responses(
        (status = 200, description = "Cleared", body = StatusResponse),
        (status = 404, description = "No active session")
    ),
    tag = "chat"
)]
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    state
        .runtime
        .clear_history()
        .await
        .map(|_| Json(StatusResponse { success: true, message: "Chat history cleared".to_string() }))
        .map_err(|_| StatusCode::NOT_FOUND)
}
