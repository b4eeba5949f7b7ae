//! Text-to-speech through the Google Translate speech endpoint.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use kiosk_core::config::TtsConfig;

/// Longest text the endpoint accepts in a single request.
pub const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("No text to speak")]
    EmptyText,

    #[error("{0}")]
    Request(String),
}

/// Produces encoded audio (MP3) for a piece of text.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;
}

pub struct TranslateTts {
    client: reqwest::Client,
    endpoint: String,
    language: String,
}

impl TranslateTts {
    pub fn from_config(config: &TtsConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            language: config.language.clone(),
        })
    }

    async fn fetch_chunk(&self, chunk: &str, idx: usize, total: usize) -> Result<Vec<u8>, SynthesisError> {
        let url = format!("{}/translate_tts", self.endpoint);
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", chunk),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .header("Referer", format!("{}/", self.endpoint))
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SynthesisError::Request(format!(
                "TTS request failed ({status}): {body}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TranslateTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        debug!(language = %self.language, chunks = chunks.len(), "Synthesizing speech");

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, idx, chunks.len()).await?);
        }
        Ok(audio)
    }
}

fn is_break(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '。' | '、')
}

/// Split text into pieces of at most `max_chars` characters, preferring to cut
/// after whitespace or punctuation. Tokens longer than the limit are cut hard.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest: Vec<char> = text.trim().chars().collect();

    while !rest.is_empty() {
        if rest.len() <= max_chars {
            push_trimmed(&mut chunks, &rest);
            break;
        }
        let cut = rest[..max_chars]
            .iter()
            .rposition(|&c| is_break(c))
            .map(|i| i + 1)
            .unwrap_or(max_chars);
        push_trimmed(&mut chunks, &rest[..cut]);
        rest.drain(..cut);
    }

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, piece: &[char]) {
    let s: String = piece.iter().collect();
    let s = s.trim();
    if !s.is_empty() {
        chunks.push(s.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{extract::Query, routing::get, Router};
    use std::collections::HashMap;

    #[test]
    fn test_split_short_text() {
        assert_eq!(split_text("  안녕하세요  ", 100), vec!["안녕하세요"]);
        assert!(split_text("   ", 100).is_empty());
    }

    #[test]
    fn test_split_prefers_word_boundaries() {
        let chunks = split_text("one two three four", 9);
        assert_eq!(chunks, vec!["one two", "three", "four"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn test_split_counts_chars_not_bytes() {
        let text = "가".repeat(150);
        let chunks = split_text(&text, MAX_CHUNK_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(chunks[1].chars().count(), 50);
    }

    #[tokio::test]
    async fn test_synthesize_concatenates_chunks() {
        let app = Router::new().route(
            "/translate_tts",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["tl"], "ko");
                format!("[{}]", q["idx"])
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = TtsConfig {
            endpoint: format!("http://{addr}"),
            ..TtsConfig::default()
        };
        let tts = TranslateTts::from_config(&config, Duration::from_secs(5)).unwrap();
        let text = format!("{} {}", "가".repeat(80), "나".repeat(80));
        let audio = tts.synthesize(&text).await.unwrap();
        assert_eq!(audio, b"[0][1]");
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let tts = TranslateTts::from_config(&TtsConfig::default(), Duration::from_secs(1)).unwrap();
        assert!(matches!(tts.synthesize(" \n ").await, Err(SynthesisError::EmptyText)));
    }
}
