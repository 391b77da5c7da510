//! Chat types and model-client error classification.
//!
//! `ChatMessage` is the one message shape used everywhere: the short-term
//! buffer stores them, the REPL assembles them, and the Azure client
//! serialises them straight onto the wire. Provider-specific response
//! types stay private to [`azure`].

pub mod azure;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Model-client failures, classified from the HTTP status where possible.
#[derive(Debug, Error)]
pub enum LlmError {
    /// 401 / 403 from the endpoint.
    #[error("authentication failed: invalid API key or insufficient permissions")]
    Auth,

    /// 429 from the endpoint.
    #[error("rate limited by model endpoint (429)")]
    RateLimited,

    /// Any 5xx from the endpoint.
    #[error("server error from model endpoint: {0}")]
    Server(u16),

    /// Any other 4xx; carries the response body for diagnosis.
    #[error("request failed: {status} {body}")]
    BadRequest { status: u16, body: String },

    /// Transport-level failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// 2xx body that could not be parsed into the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// 2xx body with no assistant text at `choices[0].message.content`.
    #[error("empty response from model")]
    EmptyResponse,

    /// Reserved surface that has no implementation (embeddings).
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network("request timeout".to_string())
        } else if err.is_connect() {
            LlmError::Network(format!("connection failed: {err}"))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

// ── Chat types ────────────────────────────────────────────────────────────────

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse a stored role string. Unknown strings are a data-corruption
    /// signal, surfaced as `None` so the store layer can report them.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (role, content) turn — wire shape and in-memory shape alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Token accounting reported by the endpoint, when present.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A successful model reply.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}
