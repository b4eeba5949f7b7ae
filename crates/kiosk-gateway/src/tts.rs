//! `POST /tts`: synthesize Korean speech and save or play it.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use kiosk_core::config::TtsMode;
use kiosk_media::artifact::save_artifact;
use kiosk_media::playback::play_and_remove;

use crate::error::{ApiError, ApiResult};
use crate::state::GatewayState;

pub const PLAYED_MESSAGE: &str = "Audio played successfully";

pub async fn synthesize(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let text = payload
        .ok()
        .and_then(|Json(body)| body.get("text").and_then(|t| t.as_str()).map(String::from))
        .ok_or_else(|| ApiError::BadRequest("No text provided".into()))?;

    let tts = &state.config.tts;
    debug!(chars = text.chars().count(), mode = ?tts.mode, "Synthesis requested");

    let audio = state.synthesizer.synthesize(&text).await.map_err(|e| {
        error!("Speech synthesis failed: {e}");
        ApiError::Internal(e.to_string())
    })?;

    let path = save_artifact(&tts.output_dir(), tts.naming, &tts.filename, &audio)
        .await
        .map_err(|e| {
            error!("Could not save synthesized audio: {e}");
            ApiError::Internal(e.to_string())
        })?;

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        error!(path = %path.display(), "File not found after saving");
        return Err(ApiError::Internal("File not found after saving".into()));
    }

    match tts.mode {
        TtsMode::Save => Ok(Json(json!({ "filename": path.display().to_string() }))),
        TtsMode::Play => {
            let player = state.player.as_deref().ok_or_else(|| {
                ApiError::Internal("Local audio playback is not available in this build".into())
            })?;
            play_and_remove(player, &path).await.map_err(|e| {
                error!(path = %path.display(), "Playback failed: {e:#}");
                ApiError::Internal(e.to_string())
            })?;
            info!("Synthesized audio played and removed");
            Ok(Json(json!({ "message": PLAYED_MESSAGE })))
        }
    }
}
