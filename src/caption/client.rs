use super::types::*;
use crate::{Error, Result, config::ImageConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Floor for `image.poll_interval_ms`.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[async_trait]
pub trait CaptionClient: Send + Sync {
    /// Runs the captioning model once. `Ok(None)` means the model finished
    /// but produced nothing usable.
    async fn caption(&self, request: CaptionRequest) -> Result<Option<String>>;
}

/// Replicate-style prediction client.
///
/// Predictions are created with `Prefer: wait`; if the provider hands back a
/// prediction that is still running, it is polled until it settles.
pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    poll_interval: Duration,
}

impl ReplicateClient {
    pub fn new(config: &ImageConfig, api_token: impl Into<String>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            poll_interval: Duration::from_millis(config.poll_interval_ms)
                .max(MIN_POLL_INTERVAL),
        })
    }

    fn create_endpoint(&self, model: &ModelRef) -> String {
        match model.version {
            Some(_) => format!("{}/v1/predictions", self.base_url),
            None => format!(
                "{}/v1/models/{}/{}/predictions",
                self.base_url, model.owner, model.name
            ),
        }
    }

    async fn create_prediction(&self, request: CaptionRequest) -> Result<Prediction> {
        let url = self.create_endpoint(&request.model);
        let body = CreatePrediction {
            version: request.model.version,
            input: PredictionInput {
                image: request.image,
                task: request.task,
            },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;

        read_prediction(response).await
    }

    async fn get_prediction(&self, url: &str) -> Result<Prediction> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        read_prediction(response).await
    }

    /// Where to poll a running prediction. `urls.get` is only followed when it
    /// points back at `base_url`, so the token never leaves the provider.
    fn poll_url(&self, prediction: &Prediction) -> String {
        let fallback = format!("{}/v1/predictions/{}", self.base_url, prediction.id);
        match prediction.urls.get.as_deref() {
            Some(url) if url.starts_with(&format!("{}/", self.base_url)) => url.to_string(),
            Some(url) => {
                warn!("Ignoring poll URL outside {}: {}", self.base_url, url);
                fallback
            }
            None => fallback,
        }
    }

    async fn wait_for(&self, mut prediction: Prediction) -> Result<Prediction> {
        while !prediction.status.is_terminal() {
            let url = self.poll_url(&prediction);

            debug!(
                "Prediction {} is {:?}, polling again in {:?}",
                prediction.id, prediction.status, self.poll_interval
            );
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.get_prediction(&url).await?;
        }
        Ok(prediction)
    }
}

#[async_trait]
impl CaptionClient for ReplicateClient {
    async fn caption(&self, request: CaptionRequest) -> Result<Option<String>> {
        debug!("Creating prediction for model {}", request.model);

        let prediction = self.create_prediction(request).await?;
        let prediction = self.wait_for(prediction).await?;

        debug!(
            "Prediction {} finished with status {:?}",
            prediction.id, prediction.status
        );

        prediction.into_caption()
    }
}

async fn read_prediction(response: reqwest::Response) -> Result<Prediction> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::upstream(
            Some(status.as_u16()),
            error_message(&body, status),
        ));
    }
    Ok(response.json().await?)
}

#[derive(Deserialize)]
struct ProblemDetails {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Replicate reports failures as problem documents (`title` / `detail`).
fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<ProblemDetails>(body)
        .ok()
        .and_then(|problem| problem.detail.or(problem.title))
        .unwrap_or_else(|| {
            let reason = status.canonical_reason().unwrap_or("error");
            format!("{} {}", status.as_u16(), reason)
        })
}
