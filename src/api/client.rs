/// HTTP client for the segmentation/inpainting service.
///
/// All endpoints take multipart form uploads and answer the JSON
/// envelopes in `types.rs`. HTTP status codes are not trusted for
/// outcomes; the envelope `code` field is the contract (the service
/// answers rejections with a JSON body too).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use crate::api::types::{EditEnvelope, SegmentData, SegmentEnvelope};
use crate::editor::session::{ReplaceRequest, SegmentQuery, SegmentRequest};
use crate::state::catalog::ReplaceKind;
use crate::state::session::WorkingImage;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v1/segment";

/// Foreground label for point/box prompts.
const FOREGROUND_LABEL: i32 = 1;
/// Confidence threshold for text prompts.
const TEXT_THRESHOLD: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout, or a body that is not the expected JSON.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-zero code.
    #[error("{0}")]
    Rejected(String),
    /// Success envelope carrying an unusable result payload.
    #[error("malformed result: {0}")]
    BadResult(String),
}

/// Client handle for the remote service. Cloning shares the underlying
/// connection pool, so clones are cheap to move into background tasks.
#[derive(Debug, Clone)]
pub struct StudioApi {
    http: reqwest::Client,
    base_url: String,
}

impl StudioApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Base URL from `ROOM_STUDIO_API`, falling back to the local
    /// development backend.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("ROOM_STUDIO_API").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn image_part(image: &WorkingImage) -> Result<Part, ApiError> {
        Ok(Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str("application/octet-stream")?)
    }

    /// Dispatch one segmentation request to the endpoint matching its
    /// query kind and unwrap the envelope.
    pub async fn segment(&self, request: SegmentRequest) -> Result<SegmentData, ApiError> {
        let image = Self::image_part(&request.image)?;

        let (endpoint, form) = match request.query {
            SegmentQuery::Point(p) => (
                "by-point",
                Form::new()
                    .part("image", image)
                    .text("x", p.x.to_string())
                    .text("y", p.y.to_string())
                    .text("label", FOREGROUND_LABEL.to_string()),
            ),
            SegmentQuery::Text { text } => (
                "by-text",
                Form::new()
                    .part("image", image)
                    .text("text", text)
                    .text("threshold", TEXT_THRESHOLD.to_string()),
            ),
            SegmentQuery::Box(r) => (
                "by-box",
                Form::new()
                    .part("image", image)
                    .text("x1", r.x1.to_string())
                    .text("y1", r.y1.to_string())
                    .text("x2", r.x2.to_string())
                    .text("y2", r.y2.to_string())
                    .text("label", FOREGROUND_LABEL.to_string()),
            ),
        };

        let envelope: SegmentEnvelope = self
            .http
            .post(format!("{}/{}", self.base_url, endpoint))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        if envelope.code != 0 {
            return Err(ApiError::Rejected(rejection_message(envelope.message)));
        }

        Ok(envelope.data.unwrap_or_default())
    }

    /// Dispatch a replacement request and decode the returned image.
    pub async fn replace(&self, request: ReplaceRequest) -> Result<WorkingImage, ApiError> {
        let image = Self::image_part(&request.image)?;

        let (endpoint, form) = match request.kind {
            ReplaceKind::Furniture => (
                "replace-furniture",
                Form::new()
                    .part("image", image)
                    .text("mask_base64", request.mask_base64)
                    .text("furniture_type", request.item_id)
                    .text("style", request.style_id),
            ),
            ReplaceKind::Decoration => (
                "replace-decoration",
                Form::new()
                    .part("image", image)
                    .text("mask_base64", request.mask_base64)
                    .text("decoration_type", request.item_id),
            ),
        };

        let envelope: EditEnvelope = self
            .http
            .post(format!("{}/{}", self.base_url, endpoint))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        if envelope.code != 0 {
            return Err(ApiError::Rejected(rejection_message(envelope.message)));
        }

        let data = envelope
            .data
            .ok_or_else(|| ApiError::BadResult("response carried no result image".to_string()))?;

        decode_result_image(&data.result_image).await
    }
}

/// Remote message when present, generic fallback otherwise.
fn rejection_message(message: String) -> String {
    if message.trim().is_empty() {
        "The service rejected the request".to_string()
    } else {
        message
    }
}

/// Decode a `data:image/png;base64,...` URL (or a bare base64 string)
/// into a working image with known dimensions.
async fn decode_result_image(payload: &str) -> Result<WorkingImage, ApiError> {
    let encoded = payload
        .rsplit_once("base64,")
        .map(|(_, tail)| tail)
        .unwrap_or(payload);

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadResult(format!("invalid base64 payload: {}", e)))?;

    WorkingImage::decode(bytes, "edited.png".to_string())
        .await
        .map_err(ApiError::BadResult)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_data_url(width: u32, height: u32) -> String {
        let mut encoded = Vec::new();
        let buffer = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        image::DynamicImage::ImageRgb8(buffer)
            .write_to(
                &mut std::io::Cursor::new(&mut encoded),
                image::ImageFormat::Png,
            )
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(encoded))
    }

    #[tokio::test]
    async fn decodes_a_data_url_result() {
        let working = decode_result_image(&png_data_url(4, 2)).await.unwrap();

        assert_eq!((working.width, working.height), (4, 2));
        assert!(!working.bytes.is_empty());
    }

    #[tokio::test]
    async fn rejects_a_garbage_result_payload() {
        let result = decode_result_image("data:image/png;base64,!!notbase64!!").await;
        assert!(matches!(result, Err(ApiError::BadResult(_))));

        // Valid base64 but not an image
        let result = decode_result_image("data:image/png;base64,aGVsbG8=").await;
        assert!(matches!(result, Err(ApiError::BadResult(_))));
    }

    #[test]
    fn rejection_messages_fall_back_when_blank() {
        assert_eq!(
            rejection_message("分割失败: timeout".to_string()),
            "分割失败: timeout"
        );
        assert_eq!(
            rejection_message("  ".to_string()),
            "The service rejected the request"
        );
    }
}
