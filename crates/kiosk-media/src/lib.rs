//! Media pipeline: WAV decoding, speech-to-text, text-to-speech, and playback.

pub mod artifact;
pub mod playback;
pub mod stt;
pub mod tts;
pub mod wav;
