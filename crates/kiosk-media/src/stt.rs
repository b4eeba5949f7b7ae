//! Speech-to-text against Google Cloud Speech-to-Text.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use kiosk_core::config::SpeechConfig;

use crate::wav::PcmAudio;

#[derive(Debug, Error)]
pub enum SpeechError {
    /// The service answered but found no speech in the clip.
    #[error("could not understand audio")]
    Unintelligible,

    /// The service could not be reached or rejected the request.
    #[error("{0}")]
    Request(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Turns decoded audio into a transcript.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, audio: &PcmAudio) -> Result<String, SpeechError>;
}

/// Recognizer backed by the `speech:recognize` REST endpoint.
pub struct GoogleSpeechRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    language: String,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

impl GoogleSpeechRecognizer {
    pub fn from_config(config: &SpeechConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key(),
            language: config.language.clone(),
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn request_body(&self, audio: &PcmAudio) -> serde_json::Value {
        let content = base64::engine::general_purpose::STANDARD.encode(audio.to_le_bytes());
        json!({
            "config": {
                "encoding": "LINEAR16",
                "sampleRateHertz": audio.sample_rate,
                "audioChannelCount": audio.channels,
                "languageCode": self.language,
            },
            "audio": { "content": content },
        })
    }
}

/// Join the top alternative of every result into one transcript.
fn best_transcript(response: &RecognizeResponse) -> String {
    response
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl SpeechRecognizer for GoogleSpeechRecognizer {
    async fn recognize(&self, audio: &PcmAudio) -> Result<String, SpeechError> {
        if audio.samples.is_empty() || audio.is_silent() {
            return Err(SpeechError::Unintelligible);
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SpeechError::Request("no speech API key configured".into()))?;

        let url = format!("{}/v1/speech:recognize", self.endpoint);
        debug!(
            url = %url,
            language = %self.language,
            seconds = audio.duration_secs(),
            "Sending audio for recognition"
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&self.request_body(audio))
            .send()
            .await
            .map_err(|e| SpeechError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SpeechError::Request(format!("recognition failed ({status}): {body}")));
        }

        let parsed: RecognizeResponse = resp
            .json()
            .await
            .map_err(|e| SpeechError::Request(format!("bad recognition response: {e}")))?;

        let transcript = best_transcript(&parsed);
        if transcript.is_empty() {
            return Err(SpeechError::Unintelligible);
        }
        Ok(transcript)
    }
}
