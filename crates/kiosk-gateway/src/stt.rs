//! `POST /stt`: transcribe an uploaded WAV file.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use kiosk_media::stt::SpeechError;
use kiosk_media::wav::decode_wav;

use crate::error::{ApiError, ApiResult};
use crate::state::GatewayState;

pub const UNINTELLIGIBLE_MESSAGE: &str = "Google Speech Recognition could not understand audio";

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Pull the `file` upload out of the form. `Ok(None)` when there is none.
async fn read_file_field(mut multipart: Multipart) -> ApiResult<Option<Upload>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // A plain text field named `file` is not an upload.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?;
        return Ok(Some(Upload {
            filename,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

pub async fn transcribe(
    State(state): State<Arc<GatewayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let upload = match multipart {
        Ok(multipart) => read_file_field(multipart).await?,
        Err(rejection) => {
            debug!(%rejection, "Request is not a multipart form");
            None
        }
    };

    let Some(upload) = upload else {
        error!("No file part in the request");
        return Err(ApiError::BadRequest("No file part".into()));
    };
    if upload.filename.is_empty() {
        error!("No file selected");
        return Err(ApiError::BadRequest("No selected file".into()));
    }
    if upload.bytes.is_empty() {
        error!(filename = %upload.filename, "Uploaded file is empty");
        return Err(ApiError::BadRequest("Uploaded file is empty".into()));
    }

    debug!(filename = %upload.filename, bytes = upload.bytes.len(), "Received audio upload");

    let audio = decode_wav(&upload.bytes).map_err(|e| {
        error!(filename = %upload.filename, "Audio could not be decoded: {e}");
        ApiError::BadRequest(format!("Audio file could not be decoded: {e}"))
    })?;

    match state.recognizer.recognize(&audio).await {
        Ok(transcript) => {
            info!(chars = transcript.chars().count(), "Audio transcribed");
            Ok(Json(json!({ "transcript": transcript })))
        }
        Err(SpeechError::Unintelligible) => {
            error!("Speech recognition could not understand audio");
            Err(ApiError::BadRequest(UNINTELLIGIBLE_MESSAGE.into()))
        }
        Err(SpeechError::Request(e)) => {
            error!("Could not request results from Google Speech Recognition service: {e}");
            Err(ApiError::Internal(format!(
                "Could not request results from Google Speech Recognition service; {e}"
            )))
        }
        Err(SpeechError::Other(e)) => {
            error!("An unexpected error occurred: {e:#}");
            Err(ApiError::Internal(format!("An unexpected error occurred: {e}")))
        }
    }
}
