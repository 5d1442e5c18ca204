//! Completion API client and the prompt it is fed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatConfig;

/// Sent in place of a reply whenever the completion API lets us down.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again in a moment.";

/// Opening assistant turn of every new conversation.
pub const GREETING: &str = "Hello! I'm your AI mental health assistant. How are you feeling today? Remember, I'm here to listen and support you, but I'm not a replacement for professional help.";

pub const MAX_TOKENS: u32 = 500;
pub const TEMPERATURE: f32 = 0.7;
pub const TOP_P: f32 = 0.9;
pub const STOP_SEQUENCES: [&str; 2] = ["User:", "\n\n"];

/// Reasons a user may pick when reporting an assistant message.
pub const FLAG_REASONS: &[&str] = &["inappropriate", "harmful", "spam", "harassment", "other"];

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("completion API is not configured")]
    NotConfigured,
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion API returned status {0}")]
    Status(u16),
    #[error("completion API returned no text")]
    EmptyReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

pub fn build_prompt(history: &[ChatTurn], input: &str) -> String {
    let conversation = history
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\nUser: {}\nAssistant:", conversation, input)
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stop: [&'a str; 2],
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

fn first_text(response: CompletionResponse) -> Result<String, ChatError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ChatError::EmptyReply)
}

#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
    fn is_configured(&self) -> bool;

    /// Next assistant turn for `prompt`, already trimmed and non-empty.
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;
}

pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: ChatConfig,
}

impl HttpCompletionClient {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    fn is_configured(&self) -> bool {
        self.config.api_url.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let url = self.config.api_url.as_deref().ok_or(ChatError::NotConfigured)?;

        let body = CompletionRequest {
            model: &self.config.model,
            prompt,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            stop: STOP_SEQUENCES,
        };

        let mut request = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ChatError::Status(response.status().as_u16()));
        }
        first_text(response.json::<CompletionResponse>().await?)
    }
}

/// Outcome of one exchange. `fallback` is set when the apology was substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub reply: String,
    pub fallback: bool,
}

pub async fn exchange(client: &dyn CompletionClient, history: &[ChatTurn], input: &str) -> Exchange {
    let prompt = build_prompt(history, input);
    match client.complete(&prompt).await {
        Ok(reply) => Exchange {
            reply,
            fallback: false,
        },
        Err(e) => {
            match e {
                ChatError::NotConfigured => tracing::debug!("Chat completion skipped: not configured"),
                ref other => tracing::warn!(error = %other, "Chat completion failed"),
            }
            Exchange {
                reply: FALLBACK_REPLY.to_string(),
                fallback: true,
            }
        }
    }
}
