use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use talqai_server::{
    Error, Result,
    caption::{CaptionClient, CaptionRequest},
    config::{ImageConfig, LlmConfig},
    llm::{ChatCompletionRequest, ChatCompletionResponse, Choice, LlmClient},
    providers::ProviderFactory,
};

/// What the mock language model answers with.
#[derive(Debug, Clone)]
pub enum LlmReply {
    Content(String),
    NoChoices,
    Failure { status: Option<u16>, message: String },
}

/// What the mock captioning model answers with.
#[derive(Debug, Clone)]
pub enum CaptionReply {
    Caption(Option<String>),
    Failure { status: Option<u16>, message: String },
}

/// Provider factory handing out mock clients that record every call.
#[derive(Debug, Clone)]
pub struct MockProviders {
    llm_reply: LlmReply,
    caption_reply: CaptionReply,
    pub llm_requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
    pub caption_requests: Arc<Mutex<Vec<CaptionRequest>>>,
    pub credentials: Arc<Mutex<Vec<String>>>,
}

impl MockProviders {
    pub fn new() -> Self {
        Self {
            llm_reply: LlmReply::Content("Hello".to_string()),
            caption_reply: CaptionReply::Caption(Some("a cat".to_string())),
            llm_requests: Arc::new(Mutex::new(Vec::new())),
            caption_requests: Arc::new(Mutex::new(Vec::new())),
            credentials: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_llm_reply(mut self, reply: LlmReply) -> Self {
        self.llm_reply = reply;
        self
    }

    pub fn with_caption_reply(mut self, reply: CaptionReply) -> Self {
        self.caption_reply = reply;
        self
    }

    pub fn llm_calls(&self) -> Vec<ChatCompletionRequest> {
        self.llm_requests.lock().unwrap().clone()
    }

    pub fn caption_calls(&self) -> Vec<CaptionRequest> {
        self.caption_requests.lock().unwrap().clone()
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

impl Default for MockProviders {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory for MockProviders {
    fn llm_client(&self, _config: &LlmConfig, api_key: &str) -> Result<Box<dyn LlmClient>> {
        self.credentials.lock().unwrap().push(api_key.to_string());
        Ok(Box::new(MockLlmClient {
            reply: self.llm_reply.clone(),
            requests: self.llm_requests.clone(),
        }))
    }

    fn caption_client(
        &self,
        _config: &ImageConfig,
        api_token: &str,
    ) -> Result<Box<dyn CaptionClient>> {
        self.credentials.lock().unwrap().push(api_token.to_string());
        Ok(Box::new(MockCaptionClient {
            reply: self.caption_reply.clone(),
            requests: self.caption_requests.clone(),
        }))
    }
}

pub struct MockLlmClient {
    reply: LlmReply,
    requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        self.requests.lock().unwrap().push(request);

        match &self.reply {
            LlmReply::Content(content) => Ok(create_mock_chat_response(content)),
            LlmReply::NoChoices => Ok(ChatCompletionResponse {
                choices: vec![],
                ..create_mock_chat_response("")
            }),
            LlmReply::Failure { status, message } => Err(Error::upstream(*status, message.clone())),
        }
    }
}

pub struct MockCaptionClient {
    reply: CaptionReply,
    requests: Arc<Mutex<Vec<CaptionRequest>>>,
}

#[async_trait]
impl CaptionClient for MockCaptionClient {
    async fn caption(&self, request: CaptionRequest) -> Result<Option<String>> {
        self.requests.lock().unwrap().push(request);

        match &self.reply {
            CaptionReply::Caption(caption) => Ok(caption.clone()),
            CaptionReply::Failure { status, message } => {
                Err(Error::upstream(*status, message.clone()))
            }
        }
    }
}

pub fn create_mock_chat_response(content: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "chatcmpl-test".to_string(),
        choices: vec![Choice {
            content: content.to_string(),
        }],
    }
}
