use super::types::*;
use crate::{Error, Result, config::LlmConfig};
use async_openai::{error::ApiError, types as openai_types};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse>;
}

/// Chat completions over the OpenAI wire format.
///
/// Requests are sent once; a non-success status surfaces as
/// [`Error::Upstream`] carrying the provider's status code.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        debug!(
            "Creating chat completion with {} messages",
            request.messages.len()
        );

        let mut messages = Vec::new();
        for msg in &request.messages {
            messages.push(msg.to_openai_message()?);
        }

        let mut request_builder = openai_types::CreateChatCompletionRequestArgs::default();
        request_builder.model(&request.model).messages(messages);

        if let Some(max_tokens) = request.max_tokens {
            request_builder.max_tokens(max_tokens);
        }

        let openai_request = request_builder.build()?;

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&openai_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                Some(status.as_u16()),
                error_message(&body, status),
            ));
        }

        let response: openai_types::CreateChatCompletionResponse = response.json().await?;

        debug!(
            "Received chat completion response with {} choices",
            response.choices.len()
        );

        let choices = response
            .choices
            .into_iter()
            .map(|choice| Choice {
                content: choice.message.content.unwrap_or_default(),
            })
            .collect();

        Ok(ChatCompletionResponse {
            id: response.id,
            choices,
        })
    }
}

#[derive(Deserialize)]
struct WrappedError {
    error: ApiError,
}

/// Pulls `error.message` out of an OpenAI error body, falling back to the
/// status line when the body is not the documented shape.
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<WrappedError>(body)
        .map(|wrapped| wrapped.error.message)
        .unwrap_or_else(|_| {
            let reason = status.canonical_reason().unwrap_or("error");
            format!("{} {}", status.as_u16(), reason)
        })
}
