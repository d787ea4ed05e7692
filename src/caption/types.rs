use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

/// A hosted model reference: `owner/name` or `owner/name:version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl FromStr for ModelRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::config(format!("Invalid image model reference: '{}'", s));

        let (path, version) = match s.trim().split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (s.trim(), None),
        };
        let (owner, name) = path.split_once('/').ok_or_else(invalid)?;

        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        if version.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            version: version.map(str::to_string),
        })
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)?;
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub model: ModelRef,
    /// Image as a `data:` URI.
    pub image: String,
    pub task: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionInput {
    pub image: String,
    pub task: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePrediction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub input: PredictionInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Starting | Self::Processing)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionUrls {
    #[serde(default)]
    pub get: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub urls: PredictionUrls,
}

impl Prediction {
    /// Converts a finished prediction into its caption, or the error the
    /// provider reported for it.
    pub fn into_caption(self) -> Result<Option<String>> {
        match self.status {
            PredictionStatus::Succeeded => Ok(normalize_output(self.output)),
            PredictionStatus::Failed => {
                let reason = match self.error {
                    Some(Value::String(s)) => s,
                    Some(Value::Null) | None => "unknown error".to_string(),
                    Some(other) => other.to_string(),
                };
                Err(Error::upstream(None, format!("Prediction failed: {}", reason)))
            }
            PredictionStatus::Canceled | PredictionStatus::Aborted => {
                Err(Error::upstream(None, "Prediction canceled"))
            }
            status => Err(Error::upstream(
                None,
                format!("Unexpected prediction status: {:?}", status),
            )),
        }
    }
}

/// Flattens model output to text. Falsy output (null, false, 0, "") is `None`.
///
/// Arrays of strings are token streams and get concatenated; other
/// structured output is returned as JSON text.
pub fn normalize_output(output: Value) -> Option<String> {
    match output {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Array(items) if items.iter().all(Value::is_string) => {
            let joined: String = items.iter().filter_map(Value::as_str).collect();
            Some(joined).filter(|s| !s.is_empty())
        }
        other => Some(other.to_string()),
    }
}
