use crate::models::chat::HistoryTurn;
use crate::models::settings::AssistantSettings;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

const CHAT_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("API key not configured. Please contact the site administrator.")]
    NotConfigured,
    #[error("Connection error: {0}")]
    Transport(String),
    #[error("{}", .message.as_deref().unwrap_or("Unknown error occurred"))]
    Http { status: u16, message: Option<String> },
    #[error("Invalid response from server")]
    Malformed(String),
}

/// One visitor turn on its way to the AI backend.
#[derive(Debug, Clone)]
pub struct RelayTurn {
    pub session_id: String,
    pub visitor_id: i64,
    pub message: String,
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReply {
    pub response: String,
    pub session_id: String,
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload<'a> {
    session_id: &'a str,
    message: &'a str,
    user_id: String,
    metadata: PayloadMetadata<'a>,
    #[serde(skip_serializing_if = "no_history")]
    history: &'a [HistoryTurn],
}

fn no_history(history: &&[HistoryTurn]) -> bool {
    history.is_empty()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadMetadata<'a> {
    platform: &'static str,
    site_url: &'a str,
    locale: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponseData {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ChatResponseData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionCheck {
    pub success: bool,
    pub message: String,
}

#[async_trait]
pub trait ChatRelay: Send + Sync {
    async fn send_message(
        &self,
        settings: &AssistantSettings,
        turn: &RelayTurn,
    ) -> Result<RelayReply, RelayError>;
}

/// HTTP client for the external AI backend (`/v1/chat`, `/v1/health`).
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    signing_secret: Option<String>,
    site_url: String,
    locale: String,
}

impl RelayClient {
    pub fn new(signing_secret: Option<String>, site_url: String, locale: String) -> Self {
        Self {
            client: Client::new(),
            signing_secret: signing_secret.filter(|s| !s.is_empty()),
            site_url,
            locale,
        }
    }

    pub fn signs_requests(&self) -> bool {
        self.signing_secret.is_some()
    }

    fn encode_payload(&self, turn: &RelayTurn) -> Result<Vec<u8>, RelayError> {
        let payload = ChatPayload {
            session_id: &turn.session_id,
            message: &turn.message,
            user_id: turn.visitor_id.to_string(),
            metadata: PayloadMetadata {
                platform: "web",
                site_url: &self.site_url,
                locale: &self.locale,
            },
            history: &turn.history,
        };
        serde_json::to_vec(&payload).map_err(|e| RelayError::Malformed(e.to_string()))
    }

    /// Hits `/v1/health` with the API key; `true` only on a 200.
    pub async fn validate_api_key(&self, settings: &AssistantSettings) -> bool {
        if settings.api_key.is_empty() {
            return false;
        }

        match self
            .client
            .get(format!("{}/v1/health", settings.api_url))
            .header("X-API-Key", &settings.api_key)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::warn!("Relay health check failed: {}", e);
                false
            }
        }
    }

    /// Admin "test connection" action.
    pub async fn test_connection(&self, settings: &AssistantSettings) -> ConnectionCheck {
        if settings.api_key.is_empty() {
            return ConnectionCheck {
                success: false,
                message: "API key is not configured".to_string(),
            };
        }
        if settings.api_url.is_empty() {
            return ConnectionCheck {
                success: false,
                message: "API URL is not configured".to_string(),
            };
        }

        let response = self
            .client
            .get(format!("{}/v1/health", settings.api_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match response {
            Err(e) => ConnectionCheck {
                success: false,
                message: format!("Connection failed: {}", e),
            },
            Ok(response) if response.status() == StatusCode::OK => ConnectionCheck {
                success: true,
                message: "Connection successful!".to_string(),
            },
            Ok(response) => ConnectionCheck {
                success: false,
                message: format!("Server returned status code: {}", response.status().as_u16()),
            },
        }
    }
}

#[async_trait]
impl ChatRelay for RelayClient {
    async fn send_message(
        &self,
        settings: &AssistantSettings,
        turn: &RelayTurn,
    ) -> Result<RelayReply, RelayError> {
        if settings.api_key.is_empty() {
            return Err(RelayError::NotConfigured);
        }

        let body = self.encode_payload(turn)?;

        let mut request = self
            .client
            .post(format!("{}/v1/chat", settings.api_url))
            .header("Content-Type", "application/json")
            .header("X-API-Key", &settings.api_key)
            .header("X-Origin", &self.site_url)
            .timeout(CHAT_TIMEOUT);

        if let Some(signature) = self
            .signing_secret
            .as_deref()
            .and_then(|secret| sign_payload(secret, &body))
        {
            request = request.header("X-Signature", signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        parse_chat_response(status, &text, &turn.session_id)
    }
}

/// Hex HMAC-SHA256 of the exact request body.
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn parse_chat_response(
    status: StatusCode,
    body: &str,
    fallback_session: &str,
) -> Result<RelayReply, RelayError> {
    if status != StatusCode::OK {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
        return Err(RelayError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: ChatResponseEnvelope =
        serde_json::from_str(body).map_err(|e| RelayError::Malformed(e.to_string()))?;

    if !envelope.success {
        return Err(RelayError::Malformed("success flag not set".to_string()));
    }

    let data = envelope.data.unwrap_or(ChatResponseData {
        response: None,
        session_id: None,
        metadata: None,
    });

    Ok(RelayReply {
        response: data.response.unwrap_or_default(),
        session_id: data.session_id.unwrap_or_else(|| fallback_session.to_string()),
        metadata: data.metadata.unwrap_or_else(|| Value::Object(Default::default())),
    })
}
