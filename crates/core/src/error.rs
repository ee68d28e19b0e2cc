use crate::audio::PlaybackError;

/// Shown when the opening of a story could not be generated or narrated.
pub const OPENING_FAILED_MESSAGE: &str = "Oops! I couldn't think of a story. Please try again.";
/// Shown when the continuation could not be generated or narrated.
pub const CONTINUATION_FAILED_MESSAGE: &str = "Oh no! The story got lost. Let's start a new one.";
/// Shown when no audio output could be opened at startup.
pub const UNSUPPORTED_AUDIO_MESSAGE: &str =
    "Your device doesn't support audio playback. Please check your speakers and try again.";

/// Everything that can end a story session early.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("Text generation failed: {0:#}")]
    Generation(anyhow::Error),
    #[error("Speech generation failed: {0:#}")]
    Speech(anyhow::Error),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("No audio output is available")]
    UnsupportedEnvironment,
}
