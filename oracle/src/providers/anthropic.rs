use super::message::ChatMessage;
use super::Provider;
use serde_json::{json, Value};

#[derive(Debug, Clone, Default)]
pub struct Anthropic;

impl Anthropic {
    const API_VERSION: &'static str = "2023-06-01";
}

impl Provider for Anthropic {
    fn chat_endpoint(&self) -> &'static str {
        "/v1/messages"
    }

    fn chat_headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", Self::API_VERSION.to_string()),
        ]
    }

    fn build_chat_body(&self, model_id: &str, messages: &[ChatMessage], max_tokens: u32) -> Value {
        json!({
            "model": model_id,
            "max_tokens": max_tokens,
            "messages": messages,
            "stream": false,
        })
    }

    fn parse_chat_content<'a>(&self, response: &'a Value) -> Option<&'a str> {
        response["content"][0]["text"].as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_dialect() {
        let headers = Anthropic.chat_headers("secret");
        assert!(headers.iter().any(|(k, v)| *k == "x-api-key" && v == "secret"));

        let response = json!({"content": [{"type": "text", "text": "the cards speak"}]});
        assert_eq!(Anthropic.parse_chat_content(&response), Some("the cards speak"));
    }
}
