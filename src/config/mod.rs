mod types;

pub use types::*;

use crate::{Error, Result};
use std::{env, path::Path};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Loads `CONFIG_PATH` (or `config.yaml`) and applies environment overrides.
///
/// A missing default file yields the built-in defaults; a missing file that
/// was named explicitly is an error. Credentials are not checked here.
pub async fn load() -> Result<Config> {
    let explicit = env::var("CONFIG_PATH").ok();
    let config_path = explicit
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if explicit.is_none() && !Path::new(&config_path).exists() {
        debug!("No configuration file at {}, using defaults", config_path);
        Config::default()
    } else {
        debug!("Loading configuration from: {}", config_path);
        load_file(&config_path).await?
    };

    apply_env_overrides(&mut config, |key| env::var(key).ok());
    Ok(config)
}

pub async fn load_file(path: impl AsRef<Path>) -> Result<Config> {
    let config_str = tokio::fs::read_to_string(path).await?;
    parse(&config_str)
}

pub fn parse(yaml: &str) -> Result<Config> {
    // An empty document deserializes to unit, not to an empty mapping.
    if yaml.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Overlays provider credentials and the image model reference from the
/// environment. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(key) = lookup("OPENAI_API_KEY") {
        config.llm.api_key = Some(key);
    }
    if let Some(token) = lookup("REPLICATE_API_TOKEN") {
        config.image.api_token = Some(token);
    }
    if let Some(model) = lookup("IMAGE_MODEL") {
        config.image.model = Some(model);
    }
}

/// Validates that a log level string is one `tracing` understands.
pub fn validate_log_level(level: &str) -> Result<()> {
    level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .map_err(|_| {
            Error::config(format!(
                "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
                level
            ))
        })?;
    Ok(())
}

/// Filter the subscriber runs with: a parseable `RUST_LOG` directive wins,
/// otherwise the configured level.
pub fn log_filter(configured: &str, env_directive: Option<&str>) -> EnvFilter {
    env_directive
        .filter(|directive| !directive.trim().is_empty())
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(configured))
}
