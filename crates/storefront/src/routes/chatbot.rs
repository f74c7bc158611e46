//! Shopping assistant endpoint.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::services::chatbot::{ChatTurn, MAX_MESSAGE_CHARS};
use crate::state::AppState;
use crate::validation::{Validate, ValidationErrors};

/// Products described to the model.
const CATALOG_CONTEXT_LIMIT: i64 = 20;

/// Build the chatbot router (mounted at `/api/chatbot`).
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

impl Validate for ChatRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_max("message", &self.message, MAX_MESSAGE_CHARS);
        errors.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Ask the assistant about the catalog. Signing in is optional.
#[instrument(
    skip(state, current, req),
    fields(history = req.history.len(), user_id = tracing::field::Empty)
)]
pub async fn chat(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if let Some(current) = &current {
        tracing::Span::current().record("user_id", tracing::field::display(current.user.id));
    }
    let client = state.chatbot().ok_or_else(|| {
        AppError::ServiceUnavailable("The shopping assistant is not available".to_string())
    })?;
    req.validate()?;

    let catalog = ProductRepository::new(state.pool())
        .catalog_snapshot(CATALOG_CONTEXT_LIMIT)
        .await?;
    let reply = client
        .reply(&catalog, &req.history, req.message.trim())
        .await?;

    Ok(Json(ChatResponse { reply }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::chatbot::ChatRole;

    #[test]
    fn test_message_length() {
        let ok: ChatRequest = serde_json::from_str(r#"{"message":"Xin chào"}"#).unwrap();
        assert!(ok.validate().is_ok());
        assert!(ok.history.is_empty());

        let blank = ChatRequest {
            message: "  ".to_string(),
            history: Vec::new(),
        };
        assert!(blank.validate().is_err());

        let long = ChatRequest {
            message: "a".repeat(MAX_MESSAGE_CHARS + 1),
            history: Vec::new(),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_history_roles() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"message":"còn không?","history":[{"role":"user","text":"áo"},{"role":"model","text":"có"}]}"#,
        )
        .unwrap();
        assert_eq!(req.history[1].role, ChatRole::Model);
    }
}
