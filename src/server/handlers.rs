use super::types::{CaptionResponse, ChatRequest, ChatResponse, UploadedImage};
use crate::{
    Error, Result,
    caption::{CaptionRequest, ModelRef},
    config::Config,
    llm::{ChatCompletionRequest, ChatMessage},
    media,
    providers::ProviderFactory,
};
use axum::{
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const MISSING_API_KEY: &str = "Server configuration error: Missing API key";
const MISSING_API_TOKEN: &str = "Server configuration error: Missing API token";
const MISSING_IMAGE_MODEL: &str = "Server configuration error: Missing image model reference";
const MESSAGE_REQUIRED: &str = "Message is required";
const IMAGE_REQUIRED: &str = "Image is required";
/// Client-facing wording is fixed; the enforced cap is `image.max_image_bytes`.
const IMAGE_TOO_LARGE: &str = "Image too large. Please upload an image under 1MB.";
const NO_ASSISTANT_RESPONSE: &str = "No response from assistant";
const NO_DESCRIPTION: &str = "No description generated";

/// Longest provider detail forwarded to clients.
const MAX_DETAIL_CHARS: usize = 200;

/// Fixed client-facing messages for one route's provider failures.
struct UpstreamMessages {
    quota: &'static str,
    model: Option<&'static str>,
    failure: &'static str,
}

const CHAT_UPSTREAM: UpstreamMessages = UpstreamMessages {
    quota: "OpenAI quota exceeded. Please check your plan and billing details.",
    model: None,
    failure: "Failed to process request",
};

const IMAGE_UPSTREAM: UpstreamMessages = UpstreamMessages {
    quota: "Replicate quota exceeded. Please check your account limits.",
    model: Some(
        "Invalid or inaccessible Replicate model version. Please check the model ID or permissions.",
    ),
    failure: "Failed to process image",
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub providers: Arc<dyn ProviderFactory>,
}

impl AppState {
    pub fn new(config: Config, providers: impl ProviderFactory + 'static) -> Self {
        Self {
            config: Arc::new(config),
            providers: Arc::new(providers),
        }
    }
}

#[instrument(name = "assistant", skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn assistant(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let llm_config = &state.config.llm;

    let Some(api_key) = llm_config.api_key() else {
        error!("OpenAI API key is not set");
        return Err(Error::config(MISSING_API_KEY));
    };

    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected request body: {}", rejection.body_text());
        Error::validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let Some(message) = request.message.filter(|m| !m.is_empty()) else {
        warn!("No message provided in request body");
        return Err(Error::validation(MESSAGE_REQUIRED));
    };

    info!("Received message ({} chars)", message.chars().count());

    let expose = state.config.server.expose_upstream_errors;
    let client = state
        .providers
        .llm_client(llm_config, api_key)
        .map_err(|e| classify_upstream(e, &CHAT_UPSTREAM, expose))?;

    let completion = client
        .create_chat_completion(ChatCompletionRequest {
            model: llm_config.model.clone(),
            messages: vec![ChatMessage::user(message)],
            max_tokens: Some(llm_config.max_tokens),
        })
        .await
        .map_err(|e| {
            error!("Chat completion failed: {}", e);
            classify_upstream(e, &CHAT_UPSTREAM, expose)
        })?;

    let Some(response) = completion.first_content() else {
        error!(
            "No usable content in completion {} ({} choices)",
            completion.id,
            completion.choices.len()
        );
        return Err(Error::UpstreamEmptyResponse(NO_ASSISTANT_RESPONSE.to_string()));
    };

    info!("Completion {} returned {} chars", completion.id, response.len());
    Ok(Json(ChatResponse {
        response: response.to_string(),
    }))
}

#[instrument(name = "image", skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<CaptionResponse>> {
    let image_config = &state.config.image;

    let Some(api_token) = image_config.api_token() else {
        error!("Replicate API token is not set");
        return Err(Error::config(MISSING_API_TOKEN));
    };
    let Some(model) = image_config.model() else {
        error!("Image model reference is not set");
        return Err(Error::config(MISSING_IMAGE_MODEL));
    };
    let model: ModelRef = model.parse()?;

    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected multipart body: {}", rejection.body_text());
        Error::validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let Some(upload) = read_image_field(&mut multipart, image_config.max_image_bytes).await? else {
        warn!("No image provided in form data");
        return Err(Error::validation(IMAGE_REQUIRED));
    };

    let mime = media::detect_image_mime(&upload.bytes, upload.content_type.as_deref());
    info!(
        "Received image: name={:?}, size={}, declared_type={:?}, mime={}",
        upload.file_name,
        upload.bytes.len(),
        upload.content_type,
        mime
    );

    let image = media::to_data_uri(&upload.bytes, mime);
    drop(upload);

    let expose = state.config.server.expose_upstream_errors;
    let client = state
        .providers
        .caption_client(image_config, api_token)
        .map_err(|e| classify_upstream(e, &IMAGE_UPSTREAM, expose))?;

    let caption = client
        .caption(CaptionRequest {
            model,
            image,
            task: image_config.task.clone(),
        })
        .await
        .map_err(|e| {
            error!("Image captioning failed: {}", e);
            classify_upstream(e, &IMAGE_UPSTREAM, expose)
        })?;

    let description = caption.unwrap_or_else(|| NO_DESCRIPTION.to_string());
    info!("Caption: {}", description);
    Ok(Json(CaptionResponse { description }))
}

/// Streams the `image` field into memory, bailing out as soon as it grows
/// past `max_bytes`. Other fields are skipped. An empty part counts as absent.
async fn read_image_field(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<Option<UploadedImage>> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > max_bytes {
                warn!(
                    "Image exceeds {} bytes (read {} so far)",
                    max_bytes,
                    bytes.len() + chunk.len()
                );
                return Err(Error::validation(IMAGE_TOO_LARGE));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Ok(None);
        }

        return Ok(Some(UploadedImage {
            file_name,
            content_type,
            bytes,
        }));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Multipart body hit the request size limit");
        return Error::validation(IMAGE_TOO_LARGE);
    }
    Error::validation(format!("Invalid request body: {}", err.body_text()))
}

/// Maps a provider-side failure onto the route's fixed messages. Errors the
/// handler already classified pass through untouched.
fn classify_upstream(err: Error, messages: &UpstreamMessages, expose: bool) -> Error {
    match err {
        Error::Config(_)
        | Error::Validation(_)
        | Error::UpstreamEmptyResponse(_)
        | Error::UpstreamQuota(_)
        | Error::UpstreamModel(_)
        | Error::UnknownUpstream(_) => return err,
        _ => {}
    }

    match (err.upstream_status(), messages.model) {
        (Some(429), _) => Error::UpstreamQuota(messages.quota.to_string()),
        (Some(422), Some(model)) => Error::UpstreamModel(model.to_string()),
        _ if !expose => Error::UnknownUpstream(messages.failure.to_string()),
        _ => {
            let detail = match err {
                Error::Upstream { message, .. } => message,
                other => other.to_string(),
            };
            Error::UnknownUpstream(format!("{}: {}", messages.failure, sanitize_detail(&detail)))
        }
    }
}

/// Strips control characters, collapses whitespace and caps the length of
/// provider text before it reaches a client.
fn sanitize_detail(detail: &str) -> String {
    let cleaned: String = detail
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() <= MAX_DETAIL_CHARS {
        return cleaned;
    }
    let truncated: String = cleaned.chars().take(MAX_DETAIL_CHARS).collect();
    format!("{}...", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quota_is_classified_per_route() {
        let chat = classify_upstream(Error::upstream(Some(429), "raw"), &CHAT_UPSTREAM, true);
        assert!(matches!(chat, Error::UpstreamQuota(_)));
        assert_eq!(chat.to_string(), CHAT_UPSTREAM.quota);

        let image = classify_upstream(Error::upstream(Some(429), "raw"), &IMAGE_UPSTREAM, true);
        assert_eq!(image.to_string(), IMAGE_UPSTREAM.quota);
    }

    #[test]
    fn test_unprocessable_only_maps_to_model_error_on_image_route() {
        let image = classify_upstream(Error::upstream(Some(422), "bad"), &IMAGE_UPSTREAM, true);
        assert!(matches!(image, Error::UpstreamModel(_)));

        let chat = classify_upstream(Error::upstream(Some(422), "bad"), &CHAT_UPSTREAM, true);
        assert!(matches!(chat, Error::UnknownUpstream(_)));
        assert_eq!(chat.to_string(), "Failed to process request: bad");
    }

    #[test]
    fn test_other_failures_interpolate_sanitized_detail() {
        let err = classify_upstream(
            Error::upstream(Some(500), "boom\n\tstack   trace"),
            &IMAGE_UPSTREAM,
            true,
        );
        assert_eq!(err.to_string(), "Failed to process image: boom stack trace");
    }

    #[test]
    fn test_detail_hidden_when_not_exposed() {
        let err = classify_upstream(Error::upstream(None, "secret"), &CHAT_UPSTREAM, false);
        assert_eq!(err.to_string(), "Failed to process request");
    }

    #[test]
    fn test_quota_still_reported_when_detail_hidden() {
        let err = classify_upstream(Error::upstream(Some(429), "secret"), &CHAT_UPSTREAM, false);
        assert!(matches!(err, Error::UpstreamQuota(_)));
    }

    #[test]
    fn test_classified_errors_pass_through() {
        let err = classify_upstream(Error::config("nope"), &CHAT_UPSTREAM, true);
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_sanitize_truncates_long_detail() {
        let long = "x".repeat(500);
        let sanitized = sanitize_detail(&long);
        assert_eq!(sanitized.len(), MAX_DETAIL_CHARS + 3);
        assert!(sanitized.ends_with("..."));
    }
}
