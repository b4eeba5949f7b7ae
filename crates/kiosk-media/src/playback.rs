//! Local audio playback.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

/// Plays an audio file on the local output device and returns once it ends.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play_file(&self, path: &Path) -> anyhow::Result<()>;
}

/// Play `path`, then delete it. The file is removed even if playback fails.
pub async fn play_and_remove(player: &dyn AudioPlayer, path: &Path) -> anyhow::Result<()> {
    let played = player.play_file(path).await;
    let removed = tokio::fs::remove_file(path).await;
    played?;
    removed?;
    Ok(())
}

/// Build the player compiled into this binary, if any.
pub fn default_player(poll_interval: Duration) -> Option<std::sync::Arc<dyn AudioPlayer>> {
    #[cfg(feature = "playback")]
    {
        Some(std::sync::Arc::new(rodio_player::RodioPlayer::new(poll_interval)))
    }
    #[cfg(not(feature = "playback"))]
    {
        let _ = poll_interval;
        None
    }
}

#[cfg(feature = "playback")]
pub mod rodio_player {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use rodio::{Decoder, OutputStreamBuilder, Sink};
    use tracing::{debug, info};

    use super::AudioPlayer;

    /// Plays through the default output device, polling the sink until it drains.
    pub struct RodioPlayer {
        poll_interval: Duration,
    }

    impl RodioPlayer {
        pub fn new(poll_interval: Duration) -> Self {
            Self { poll_interval }
        }
    }

    fn play_blocking(path: PathBuf, poll_interval: Duration) -> anyhow::Result<()> {
        let stream = OutputStreamBuilder::open_default_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        let source = Decoder::new(BufReader::new(File::open(&path)?))?;
        sink.append(source);

        let started = Instant::now();
        while !sink.empty() {
            std::thread::sleep(poll_interval);
        }
        debug!(path = %path.display(), elapsed_ms = started.elapsed().as_millis() as u64, "Playback drained");
        Ok(())
    }

    #[async_trait]
    impl AudioPlayer for RodioPlayer {
        async fn play_file(&self, path: &Path) -> anyhow::Result<()> {
            let path = path.to_path_buf();
            let poll_interval = self.poll_interval;
            info!(path = %path.display(), "Playing synthesized audio");
            tokio::task::spawn_blocking(move || play_blocking(path, poll_interval)).await?
        }
    }
}
