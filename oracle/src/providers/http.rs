use super::message::ChatMessage;
use super::{ApiProvider, Provider, SizeClass, TextGenerator};
use crate::config::ModelConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

/// Chat-completions client that serves one prompt per call.
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: Client,
    provider: ApiProvider,
    config: ModelConfig,
}

impl HttpTextGenerator {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let provider = ApiProvider::from_domain(&config.api_base);

        Ok(Self {
            client,
            provider,
            config,
        })
    }

    fn model_for(&self, size: SizeClass) -> &str {
        match size {
            SizeClass::Small => &self.config.small_model,
            SizeClass::Large => &self.config.large_model,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, size: SizeClass) -> Result<String> {
        let model_id = self.model_for(size);
        let url = format!(
            "{}{}",
            self.config.api_base.trim_end_matches('/'),
            self.provider.chat_endpoint()
        );
        let body = self.provider.build_chat_body(
            model_id,
            &[ChatMessage::user(prompt)],
            self.config.max_tokens,
        );

        debug!(model = model_id, %size, prompt_len = prompt.len(), "sending generation request");

        let mut request = self.client.post(&url).json(&body);
        for (name, value) in self.provider.chat_headers(&self.config.api_key) {
            request = request.header(name, value);
        }

        let response: Value = request
            .send()
            .await
            .context("Generation request failed")?
            .error_for_status()
            .context("Non-success status from model API")?
            .json()
            .await
            .context("Error parsing the model response")?;

        trace!("Model response: {}", response);

        let content = self
            .provider
            .parse_chat_content(&response)
            .context("Model response has no assistant content")?;

        Ok(content.trim().to_string())
    }
}
