use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// When false, unclassified provider failures carry no provider detail.
    #[serde(default = "default_true")]
    pub expose_upstream_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_replicate_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    /// `owner/name` or `owner/name:version`; supplied by the operator.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_caption_task")]
    pub task: String,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl LlmConfig {
    /// The API key, treating an empty string as unset.
    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }
}

impl ImageConfig {
    pub fn api_token(&self) -> Option<&str> {
        non_empty(self.api_token.as_deref())
    }

    pub fn model(&self) -> Option<&str> {
        non_empty(self.model.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogsConfig::default(),
            max_body_bytes: default_max_body_bytes(),
            expose_upstream_errors: true,
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: None,
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: None,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: default_replicate_base_url(),
            api_token: None,
            model: None,
            task: default_caption_task(),
            max_image_bytes: default_max_image_bytes(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_replicate_base_url() -> String {
    "https://api.replicate.com".to_string()
}

fn default_caption_task() -> String {
    "image_captioning".to_string()
}

fn default_max_image_bytes() -> usize {
    1_000_000
}

fn default_poll_interval_ms() -> u64 {
    500
}
