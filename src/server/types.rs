use serde::{Deserialize, Serialize};

pub use crate::error::ErrorResponse;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct CaptionResponse {
    pub description: String,
}

/// The `image` part of a captioning upload.
#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}
