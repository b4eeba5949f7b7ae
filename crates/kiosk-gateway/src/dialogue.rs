//! `POST /send-message`: forward a user utterance to Dialogflow.
//!
//! With step tracking on, each successful turn also advances the session's
//! step counter and returns the screen the kiosk should show next.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use kiosk_core::session::new_session_id;
use kiosk_dialogue::{DialogueError, IntentReply};

use crate::error::{ApiError, ApiResult};
use crate::state::GatewayState;

fn string_field(body: Option<&Value>, name: &str) -> Option<String> {
    body?
        .get(name)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn missing_fields_message(require_session_id: bool) -> String {
    if require_session_id {
        "Invalid request: 'message' or 'session_id' field is missing".into()
    } else {
        "Invalid request: 'message' field is missing".into()
    }
}

fn dialogue_error(e: DialogueError) -> ApiError {
    match e {
        DialogueError::Auth(e) => {
            error!("Failed to create Dialogflow session client: {e}");
            ApiError::Internal(format!("Failed to connect to Dialogflow: {e}"))
        }
        DialogueError::Request(e) => {
            error!("Failed to communicate with Dialogflow: {e}");
            ApiError::Internal(format!("Failed to communicate with Dialogflow: {e}"))
        }
    }
}

pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let cfg = &state.config.dialogue;
    let body = payload.ok().map(|Json(v)| v);

    let message = string_field(body.as_ref(), "message");
    let session_id = string_field(body.as_ref(), "session_id");

    let (Some(message), session_id) = (message, session_id) else {
        error!("Invalid request: required dialogue fields are missing");
        return Err(ApiError::BadRequest(missing_fields_message(cfg.require_session_id)));
    };
    let session_id = match session_id {
        Some(id) => id,
        None if cfg.require_session_id => {
            error!("Invalid request: 'session_id' field is missing");
            return Err(ApiError::BadRequest(missing_fields_message(true)));
        }
        None => new_session_id(),
    };

    debug!(session_id = %session_id, chars = message.chars().count(), "Dialogue turn");

    let reply_text = |reply: IntentReply| {
        reply
            .fulfillment_text
            .unwrap_or_else(|| cfg.fallback_reply.clone())
    };

    if !cfg.track_steps {
        let reply = state
            .intents
            .detect_intent(&session_id, &message)
            .await
            .map_err(dialogue_error)?;
        return Ok(Json(json!({
            "reply": reply_text(reply),
            "session_id": session_id,
        })));
    }

    // Held across the upstream call so turns of one session cannot interleave.
    let slot = state.sessions.slot(&session_id);
    let mut slot = slot.lock().await;
    slot.touch();

    let reply = state
        .intents
        .detect_intent(&session_id, &message)
        .await
        .map_err(dialogue_error)?;

    let step = slot.step().value();
    let redirect = slot.advance();
    info!(session_id = %session_id, step, redirect, "Dialogue step advanced");

    Ok(Json(json!({
        "reply": reply_text(reply),
        "session_id": session_id,
        "redirect": redirect,
    })))
}
