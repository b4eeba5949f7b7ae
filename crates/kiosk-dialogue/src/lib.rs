//! Conversational intent detection for the kiosk.
//!
//! [`dialogflow::DialogflowClient`] implements [`IntentDetector`] on top of the
//! Dialogflow ES REST API, authenticating through a [`auth::TokenSource`].

use async_trait::async_trait;
use thiserror::Error;

pub mod auth;
pub mod dialogflow;

pub use auth::{AuthError, TokenSource};
pub use dialogflow::DialogflowClient;

#[derive(Debug, Error)]
pub enum DialogueError {
    /// No usable credentials; the backend was never contacted.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The backend was reached but the call failed.
    #[error("{0}")]
    Request(String),
}

/// What the backend made of one user utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentReply {
    /// Fulfillment text, `None` when the agent had nothing to say.
    pub fulfillment_text: Option<String>,
    pub intent: Option<String>,
}

/// Sends a user utterance to an intent-detection backend within a session.
#[async_trait]
pub trait IntentDetector: Send + Sync {
    async fn detect_intent(&self, session_id: &str, text: &str) -> Result<IntentReply, DialogueError>;
}
