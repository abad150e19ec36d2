//! OpenAI-compatible chat-completions provider (xAI, OpenAI, local gateways).

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::provider::{ChatProvider, ChatRequest, ChatResponse, ProviderError, Result};
use crate::config::ApiConfig;

pub struct OpenAiCompatProvider {
    client: Client,
    api_key: Option<String>,
    api_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_url: config.api_url.clone(),
        })
    }

    fn get_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotAvailable("ai.api.api_key not set".to_string()))
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let api_key = self.get_api_key()?;

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::HttpError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if chat_response.choices.is_empty() {
            return Err(ProviderError::ApiError("No response choices".to_string()));
        }
        Ok(chat_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_not_available() {
        let provider = OpenAiCompatProvider::new(&ApiConfig::default()).unwrap();
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![],
            tools: None,
            tool_choice: None,
            temperature: 0.7,
        };
        let err = provider.chat(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotAvailable(_)));
    }
}
