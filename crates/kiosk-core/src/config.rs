//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Top-level kiosk gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub dialogue: DialogueConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Timeout applied to every upstream HTTP call, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

// --- HTTP server ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve the static kiosk screens.
    #[serde(default = "default_true")]
    pub pages: bool,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            pages: true,
        }
    }
}

// --- Speech-to-text ---

/// Speech recognition (Google Cloud Speech-to-Text) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// BCP-47 recognition language (default: "ko-KR").
    #[serde(default = "default_speech_language")]
    pub language: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_speech_api_key_env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,
}

fn default_speech_language() -> String {
    "ko-KR".into()
}

fn default_speech_api_key_env() -> Option<String> {
    Some("GOOGLE_SPEECH_API_KEY".into())
}

fn default_speech_endpoint() -> String {
    "https://speech.googleapis.com".into()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: default_speech_language(),
            api_key: None,
            api_key_env: default_speech_api_key_env(),
            endpoint: default_speech_endpoint(),
        }
    }
}

impl SpeechConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

// --- Text-to-speech ---

/// What the `/tts` route does with the synthesized file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsMode {
    /// Leave the file on disk and return its absolute path.
    #[default]
    Save,
    /// Play it on the local output device, then delete it.
    Play,
}

/// How synthesized files are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsNaming {
    /// `output_<uuid>.mp3`
    #[default]
    Random,
    /// Always `tts.filename`.
    Fixed,
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Synthesis language (default: "ko").
    #[serde(default = "default_tts_language")]
    pub language: String,

    #[serde(default)]
    pub mode: TtsMode,

    #[serde(default)]
    pub naming: TtsNaming,

    /// Filename used when `naming` is `fixed`.
    #[serde(default = "default_tts_filename")]
    pub filename: String,

    /// Directory artifacts are written to (default: working directory).
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Sink poll interval while waiting for playback to finish.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,
}

fn default_tts_language() -> String {
    "ko".into()
}

fn default_tts_filename() -> String {
    "output.mp3".into()
}

fn default_output_dir() -> String {
    ".".into()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_tts_endpoint() -> String {
    "https://translate.google.com".into()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            language: default_tts_language(),
            mode: TtsMode::default(),
            naming: TtsNaming::default(),
            filename: default_tts_filename(),
            output_dir: default_output_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            endpoint: default_tts_endpoint(),
        }
    }
}

impl TtsConfig {
    /// Output directory with `~` expanded.
    pub fn output_dir(&self) -> PathBuf {
        expand_home(&self.output_dir)
    }
}

// --- Dialogue ---

/// Dialogflow intent-detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    #[serde(default = "default_project_id")]
    pub project_id: String,

    #[serde(default = "default_speech_language")]
    pub language: String,

    /// Service-account key file. When absent, ambient credentials are used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,

    /// Reject requests without a `session_id` instead of minting one.
    #[serde(default)]
    pub require_session_id: bool,

    /// Advance the per-session step counter and return redirects.
    #[serde(default = "default_true")]
    pub track_steps: bool,

    /// Sessions idle longer than this are dropped from the step store.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    #[serde(default = "default_dialogflow_endpoint")]
    pub endpoint: String,
}

fn default_project_id() -> String {
    "kioskdialouge".into()
}

fn default_session_idle_secs() -> u64 {
    1800
}

fn default_fallback_reply() -> String {
    "Dialogflow did not return a response.".into()
}

fn default_dialogflow_endpoint() -> String {
    "https://dialogflow.googleapis.com".into()
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            language: default_speech_language(),
            credentials_file: None,
            require_session_id: false,
            track_steps: true,
            session_idle_secs: default_session_idle_secs(),
            fallback_reply: default_fallback_reply(),
            endpoint: default_dialogflow_endpoint(),
        }
    }
}

impl DialogueConfig {
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.credentials_file.as_deref().map(expand_home)
    }
}

// --- Logging ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "kiosk_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_log_format() -> String {
    "plain".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

fn expand_home(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse a JSON5 document after env substitution.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let substituted = substitute_env_vars(raw);
        json5::from_str(&substituted).map_err(|e| crate::error::KioskError::Config(e.to_string()))
    }

    /// Default config file location: `~/.kiosk/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Socket address string the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs.unwrap_or(30))
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if self.speech.resolve_api_key().is_none() {
            warnings.push(format!(
                "Speech recognition has no API key configured (set speech.api_key or {})",
                self.speech.api_key_env.as_deref().unwrap_or("speech.api_key_env")
            ));
        }

        if self.tts.mode == TtsMode::Play && !cfg!(feature = "playback") {
            errors.push(
                "tts.mode is \"play\" but this build has no local playback (enable the `playback` feature)"
                    .to_string(),
            );
        }

        if self.tts.naming == TtsNaming::Fixed && self.tts.filename.trim().is_empty() {
            errors.push("tts.filename cannot be empty when tts.naming is \"fixed\"".to_string());
        }

        if self.tts.poll_interval_ms == 0 {
            errors.push("tts.poll_interval_ms must be greater than 0".to_string());
        }

        if let Some(path) = self.dialogue.credentials_path() {
            if !path.exists() {
                errors.push(format!(
                    "Dialogflow credentials file not found: {}",
                    path.display()
                ));
            }
        }

        if self.dialogue.project_id.trim().is_empty() {
            errors.push("dialogue.project_id cannot be empty".to_string());
        }

        (warnings, errors)
    }
}

/// Base directory for kiosk data: `~/.kiosk/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kiosk")
}
