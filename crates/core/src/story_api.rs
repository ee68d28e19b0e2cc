use crate::story::{ContinuationPart, OpeningPart, Story};
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// The text generation service that writes the story.
///
/// Implementations validate the structured response before returning it, so a
/// successful result always carries exactly two options and non-empty text.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Writes the opening scene, question and two choices for a setting.
    async fn generate_opening(&self, setting: &str) -> Result<OpeningPart>;

    /// Writes the adventure and ending that follow from the child's choice.
    async fn continue_story(&self, story: &Story, choice: &str) -> Result<ContinuationPart>;
}

/// The speech service that turns narration text into audio.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns base64 PCM16, 24 kHz mono. Fails when no audio comes back.
    async fn synthesize(&self, text: &str) -> Result<String>;
}
