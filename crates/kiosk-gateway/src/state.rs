//! Gateway shared state.

use std::sync::Arc;
use std::time::Duration;

use kiosk_core::config::Config;
use kiosk_core::session::StepStore;
use kiosk_dialogue::{DialogflowClient, IntentDetector};
use kiosk_media::playback::{default_player, AudioPlayer};
use kiosk_media::stt::{GoogleSpeechRecognizer, SpeechRecognizer};
use kiosk_media::tts::{SpeechSynthesizer, TranslateTts};

/// Shared gateway state accessible from all handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// `None` when the binary was built without local playback.
    pub player: Option<Arc<dyn AudioPlayer>>,
    pub intents: Arc<dyn IntentDetector>,
    pub sessions: Arc<StepStore>,
}

impl GatewayState {
    pub fn new(
        config: Arc<Config>,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        player: Option<Arc<dyn AudioPlayer>>,
        intents: Arc<dyn IntentDetector>,
    ) -> Self {
        Self {
            config,
            recognizer,
            synthesizer,
            player,
            intents,
            sessions: Arc::new(StepStore::new()),
        }
    }

    /// Wire up the Google-backed clients described by `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let timeout = config.http_timeout();

        let recognizer = Arc::new(GoogleSpeechRecognizer::from_config(&config.speech, timeout)?);
        let synthesizer = Arc::new(TranslateTts::from_config(&config.tts, timeout)?);
        let player = default_player(Duration::from_millis(config.tts.poll_interval_ms));

        let auth_client = reqwest::Client::builder().timeout(timeout).build()?;
        let tokens = kiosk_dialogue::auth::token_source(config.dialogue.credentials_path(), auth_client);
        let intents = Arc::new(DialogflowClient::new(&config.dialogue, tokens, timeout)?);

        Ok(Self::new(
            Arc::new(config),
            recognizer,
            synthesizer,
            player,
            intents,
        ))
    }
}
