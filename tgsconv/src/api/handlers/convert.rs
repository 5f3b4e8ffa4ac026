use crate::AppState;
use crate::api::models::ErrorResponse;
use crate::config::Config;
use crate::decode;
use crate::errors::{Error, Result};
use axum::{
    body::Body,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{debug, info, instrument};

/// A sticker file taken from the multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub data: Bytes,
}

#[utoipa::path(
    post,
    path = "/convert",
    tag = "convert",
    summary = "Render first frame",
    description = "Upload an animated sticker (gzip-compressed `.tgs` or plain Lottie JSON) in the `tgs` \
    multipart field. The first frame is rendered and returned as a PNG.",
    request_body(
        content_type = "multipart/form-data",
        description = "Sticker file in the `tgs` field"
    ),
    responses(
        (status = 200, description = "PNG rendering of the first frame", body = Vec<u8>, content_type = "image/png"),
        (status = 400, description = "No file was uploaded", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the configured size limit", body = ErrorResponse),
        (status = 500, description = "The upload could not be decoded or rendered", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn convert(State(state): State<AppState>, multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Response> {
    // A body that is not multipart at all simply carries no file
    let multipart = multipart.map_err(|rejection| {
        debug!(%rejection, "Request body is not multipart");
        Error::MissingUpload
    })?;

    let upload = read_upload(multipart, &state.config).await?.ok_or(Error::MissingUpload)?;
    info!(
        field = %upload.field,
        file_name = ?upload.file_name,
        bytes = upload.data.len(),
        "Received sticker upload"
    );

    let (document, format) = decode::decode_with_format(&upload.data)?;
    debug!(
        %format,
        width = ?document.width(),
        height = ?document.height(),
        frame_rate = ?document.frame_rate(),
        in_point = ?document.in_point(),
        out_point = ?document.out_point(),
        "Decoded animation"
    );
    drop(upload);

    let artifact = state.renderer.render(document).await?;
    let stream = state.renderer.artifacts().open_stream(artifact).await?;

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
        (header::CONTENT_LENGTH, HeaderValue::from(stream.len())),
    ];
    Ok((headers, Body::from_stream(stream)).into_response())
}

/// Pull the first file part named `upload_field` out of the body. Other parts are skipped.
async fn read_upload(mut multipart: Multipart, config: &Config) -> Result<Option<UploadedFile>> {
    let field_name = config.upload_field.as_str();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to parse multipart data", config))?
    {
        // Plain text parts are form values, not files
        if field.name() != Some(field_name) || field.file_name().is_none() {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, "Failed to read file", config))?;

        return Ok(Some(UploadedFile {
            field: field_name.to_string(),
            file_name,
            data,
        }));
    }

    Ok(None)
}

/// Body-limit overflow becomes 413, anything else is a malformed request.
fn multipart_error(error: MultipartError, context: &str, config: &Config) -> Error {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(max_upload_size = config.max_upload_size, "Upload size limit exceeded");
        return Error::PayloadTooLarge {
            message: format!(
                "File size exceeds maximum allowed size of {} bytes ({} MB)",
                config.max_upload_size,
                config.max_upload_size / (1024 * 1024)
            ),
        };
    }

    Error::BadRequest {
        message: format!("{}: {}", context, error),
    }
}
