use crate::audio::{AudioClip, PlaybackError, decode_speech};
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Whether the output is currently able to produce sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Suspended,
    Running,
}

/// The platform's audio output. One instance is created at startup and reused
/// for every narration.
///
/// `play` must resolve only once the clip has finished playing, not when it starts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AudioOutput: Send + Sync {
    fn state(&self) -> OutputState;

    /// Activates a suspended output. Resolves once the output is running.
    async fn resume(&self) -> Result<()>;

    /// Starts the clip immediately and resolves when it reaches its end.
    async fn play(&self, clip: AudioClip) -> Result<()>;
}

/// Decodes a speech payload and plays it to completion.
///
/// An empty payload is treated as a clip that already finished. Nothing is
/// decoded and the output is left alone.
pub async fn play_encoded<A>(output: &A, base64_audio: &str) -> Result<(), PlaybackError>
where
    A: AudioOutput + ?Sized,
{
    if base64_audio.is_empty() {
        tracing::warn!("play_encoded called with empty audio data.");
        return Ok(());
    }

    if output.state() == OutputState::Suspended {
        tracing::debug!("Audio output suspended, resuming before playback.");
        output.resume().await.map_err(PlaybackError::Activation)?;
    }

    let clip = decode_speech(base64_audio)?;
    tracing::debug!(
        "Playing clip: {} frames ({:.2}s)",
        clip.frame_count(),
        clip.duration_secs()
    );
    output.play(clip).await.map_err(PlaybackError::Output)
}
