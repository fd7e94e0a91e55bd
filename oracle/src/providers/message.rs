//! Chat message types for LLM API interactions.
//!
//! Serializes to the `{"role": ..., "content": ...}` shape shared by
//! OpenAI-compatible and Anthropic chat APIs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageRole {
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    role: ChatMessageRole,
    content: String,
}

impl ChatMessage {
    pub fn user<S: ToString>(content: S) -> ChatMessage {
        ChatMessage {
            role: ChatMessageRole::User,
            content: content.to_string(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn role(&self) -> ChatMessageRole {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_serialization() {
        let json_str = serde_json::to_string(&ChatMessage::user("pull three cards")).unwrap();
        assert_eq!(json_str, r#"{"role":"user","content":"pull three cards"}"#);
    }

    #[test]
    fn test_assistant_message_roundtrip() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"the tower falls"}"#).unwrap();
        assert_eq!(msg.role(), ChatMessageRole::Assistant);
        assert_eq!(msg.content(), "the tower falls");
    }
}
