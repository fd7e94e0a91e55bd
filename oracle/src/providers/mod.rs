//! Text-generation capability and the HTTP dialects that back it.
//!
//! The pipeline only sees [`TextGenerator`]. [`HttpTextGenerator`] is the
//! production implementation; tests plug in stubs.

mod anthropic;
mod http;
pub mod message;
mod openai;

pub use anthropic::Anthropic;
pub use http::HttpTextGenerator;
pub use openai::OpenAi;

use anyhow::Result;
use async_trait::async_trait;
use enum_dispatch::enum_dispatch;
use message::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{Display, EnumString};

/// Which model tier a generation request should use.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    #[default]
    Small,
    Large,
}

/// Opaque, fallible text generation. May fail or return empty text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, size: SizeClass) -> Result<String>;
}

#[enum_dispatch]
pub trait Provider {
    /// Endpoint path for chat/message completions (default: OpenAI-style)
    fn chat_endpoint(&self) -> &'static str {
        "/v1/chat/completions"
    }

    /// Provider-specific headers for the chat endpoint (default: Bearer token)
    fn chat_headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("Authorization", format!("Bearer {}", api_key))]
    }

    /// Build the request body for a chat completion (default: OpenAI-style)
    fn build_chat_body(&self, model_id: &str, messages: &[ChatMessage], max_tokens: u32) -> Value {
        json!({
            "model": model_id,
            "messages": messages,
            "max_tokens": max_tokens,
            "stream": false,
        })
    }

    /// Parse the assistant's content from the response (default: OpenAI-style)
    fn parse_chat_content<'a>(&self, response: &'a Value) -> Option<&'a str> {
        response["choices"][0]["message"]["content"].as_str()
    }
}

#[enum_dispatch(Provider)]
#[derive(Debug, Clone)]
pub enum ApiProvider {
    OpenAi,
    Anthropic,
}

impl ApiProvider {
    /// Detect the dialect from the API base URL.
    pub fn from_domain(domain: &str) -> Self {
        if domain.contains("anthropic") {
            Anthropic.into()
        } else {
            OpenAi.into()
        }
    }
}
