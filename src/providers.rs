use crate::{
    Result,
    caption::{CaptionClient, ReplicateClient},
    config::{ImageConfig, LlmConfig},
    llm::{LlmClient, OpenAiClient},
};

/// Builds provider clients from an explicit credential.
///
/// Handlers call this once per request after checking that the credential
/// is configured, so nothing about the providers is fixed at startup.
pub trait ProviderFactory: Send + Sync {
    fn llm_client(&self, config: &LlmConfig, api_key: &str) -> Result<Box<dyn LlmClient>>;

    fn caption_client(
        &self,
        config: &ImageConfig,
        api_token: &str,
    ) -> Result<Box<dyn CaptionClient>>;
}

/// Real HTTP clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpProviders;

impl ProviderFactory for HttpProviders {
    fn llm_client(&self, config: &LlmConfig, api_key: &str) -> Result<Box<dyn LlmClient>> {
        Ok(Box::new(OpenAiClient::new(config, api_key)?))
    }

    fn caption_client(
        &self,
        config: &ImageConfig,
        api_token: &str,
    ) -> Result<Box<dyn CaptionClient>> {
        Ok(Box::new(ReplicateClient::new(config, api_token)?))
    }
}
