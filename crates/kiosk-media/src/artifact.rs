//! Synthesis artifacts on disk.

use std::path::{Path, PathBuf};

use kiosk_core::config::TtsNaming;
use tracing::info;

/// File name for a new artifact under the given naming scheme.
pub fn artifact_name(naming: TtsNaming, fixed_name: &str) -> String {
    match naming {
        TtsNaming::Fixed => fixed_name.to_string(),
        TtsNaming::Random => format!("output_{}.mp3", uuid::Uuid::new_v4()),
    }
}

/// Write synthesized audio into `dir` and return the file's absolute path.
///
/// With fixed naming an existing file is overwritten.
pub async fn save_artifact(
    dir: &Path,
    naming: TtsNaming,
    fixed_name: &str,
    audio: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = std::path::absolute(dir.join(artifact_name(naming, fixed_name)))?;
    tokio::fs::write(&path, audio).await?;

    info!(
        path = %path.display(),
        size_kb = audio.len() / 1024,
        "TTS audio saved"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_names_unique() {
        let a = artifact_name(TtsNaming::Random, "ignored.mp3");
        let b = artifact_name(TtsNaming::Random, "ignored.mp3");
        assert_ne!(a, b);
        assert!(a.starts_with("output_") && a.ends_with(".mp3"));
        assert_eq!(artifact_name(TtsNaming::Fixed, "output.mp3"), "output.mp3");
    }

    #[tokio::test]
    async fn test_save_returns_absolute_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_artifact(dir.path(), TtsNaming::Random, "x.mp3", b"ID3")
            .await
            .unwrap();
        assert!(path.is_absolute());
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3");
    }

    #[tokio::test]
    async fn test_fixed_name_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = save_artifact(dir.path(), TtsNaming::Fixed, "kiosk.mp3", b"one")
            .await
            .unwrap();
        let second = save_artifact(dir.path(), TtsNaming::Fixed, "kiosk.mp3", b"two")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }
}
