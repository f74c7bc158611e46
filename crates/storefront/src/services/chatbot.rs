//! Gemini shopping assistant.
//!
//! Proxies customer questions to the Gemini `generateContent` API with a
//! system instruction describing the shop and a snapshot of the catalog.

use std::fmt::Write as _;
use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::GeminiConfig;
use crate::models::Product;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Turns of history forwarded to the model.
pub const MAX_HISTORY_TURNS: usize = 10;

/// Longest accepted customer message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Errors that can occur when calling Gemini.
#[derive(Debug, Error)]
pub enum ChatbotError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gemini returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API.
    #[error("rate limited by upstream")]
    RateLimited,

    /// The response held no text.
    #[error("empty reply")]
    EmptyReply,
}

/// Who said a turn of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One earlier turn sent back by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<ChatRole>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

// =============================================================================
// Client
// =============================================================================

/// Gemini API client.
#[derive(Clone)]
pub struct ChatbotClient {
    inner: Arc<ChatbotClientInner>,
}

struct ChatbotClientInner {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl ChatbotClient {
    #[must_use]
    pub fn new(config: &GeminiConfig, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(ChatbotClientInner {
                client,
                api_key: config.api_key.clone(),
                model: config.model.clone(),
            }),
        }
    }

    /// Ask the assistant. `history` is trimmed to the last
    /// [`MAX_HISTORY_TURNS`] turns.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or yields no text.
    #[instrument(skip_all, fields(model = %self.inner.model, history = history.len()))]
    pub async fn reply(
        &self,
        catalog: &[Product],
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, ChatbotError> {
        let system = system_instruction(catalog);
        let request = build_request(&system, history, message);

        let url = format!("{GEMINI_API_BASE}/{}:generateContent", self.inner.model);
        let response = self
            .inner
            .client
            .post(&url)
            .header("x-goog-api-key", self.inner.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ChatbotError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map_or(text, |e| e.error.message);
            return Err(ChatbotError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await?;
        body.into_text().ok_or(ChatbotError::EmptyReply)
    }
}

fn build_request<'a>(
    system: &'a str,
    history: &'a [ChatTurn],
    message: &'a str,
) -> GenerateRequest<'a> {
    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    let mut contents: Vec<Content<'a>> = history
        .iter()
        .skip(skip)
        .filter(|turn| !turn.text.trim().is_empty())
        .map(|turn| Content {
            role: Some(turn.role),
            parts: vec![Part { text: &turn.text }],
        })
        .collect();
    contents.push(Content {
        role: Some(ChatRole::User),
        parts: vec![Part { text: message }],
    });

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part { text: system }],
        },
        contents,
        generation_config: GenerationConfig {
            temperature: 0.7,
            max_output_tokens: 1024,
        },
    }
}

/// The assistant persona plus one line per product.
fn system_instruction(catalog: &[Product]) -> String {
    let mut prompt = String::from(
        "Bạn là trợ lý bán hàng của SenMarket, một cửa hàng trực tuyến tại Việt Nam. \
         Trả lời ngắn gọn, thân thiện, bằng ngôn ngữ của khách. \
         Chỉ giới thiệu sản phẩm có trong danh sách dưới đây và không bịa giá.\n\n\
         Sản phẩm hiện có:\n",
    );

    if catalog.is_empty() {
        prompt.push_str("(chưa có sản phẩm)\n");
    }
    for product in catalog {
        let stock = if product.in_stock() { "còn hàng" } else { "hết hàng" };
        let _ = writeln!(
            prompt,
            "- {} | {} | {}",
            product.name,
            product.price_label(),
            stock
        );
    }
    prompt
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<ChatTurn> {
        (0..n)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 { ChatRole::User } else { ChatRole::Model },
                text: format!("turn {i}"),
            })
            .collect()
    }

    #[test]
    fn test_request_keeps_last_turns_and_appends_message() {
        let history = turns(14);
        let request = build_request("system", &history, "Còn áo size M không?");
        assert_eq!(request.contents.len(), MAX_HISTORY_TURNS + 1);
        assert_eq!(request.contents[0].parts[0].text, "turn 4");
        let last = request.contents.last().unwrap();
        assert_eq!(last.role, Some(ChatRole::User));
        assert_eq!(last.parts[0].text, "Còn áo size M không?");
    }

    #[test]
    fn test_request_wire_format() {
        let history = vec![ChatTurn {
            role: ChatRole::Model,
            text: "Xin chào!".to_string(),
        }];
        let json = serde_json::to_value(build_request("sys", &history, "hi")).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "model");
        assert_eq!(json["contents"][1]["role"], "user");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Xin "},{"text":"chào"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.into_text().as_deref(), Some("Xin chào"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.into_text().is_none());
    }

    #[test]
    fn test_system_instruction_without_products() {
        let prompt = system_instruction(&[]);
        assert!(prompt.contains("SenMarket"));
        assert!(prompt.contains("(chưa có sản phẩm)"));
    }
}
