use crate::prompt_loader::StoryPrompts;
use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_client::GeminiClient;
use gemini_client::types::{GenerateContentRequest, GenerateContentResponse};
use serde_json::{Value, json};
use storytime_core::story::{ContinuationPart, OpeningPart, Story};
use storytime_core::story_api::{SpeechSynthesizer, StoryGenerator};

/// Structure the opening response must follow.
pub fn opening_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "openingScene": {
                "type": "STRING",
                "description": "The beginning of the story. Introduce the hero and the setting. Use emojis."
            },
            "question": {
                "type": "STRING",
                "description": "A simple question asking the child to make a choice. e.g., 'What should he do?'"
            },
            "options": {
                "type": "ARRAY",
                "description": "An array with exactly two short, simple choices, with emojis.",
                "items": { "type": "STRING" },
                "minItems": 2,
                "maxItems": 2
            }
        },
        "required": ["openingScene", "question", "options"]
    })
}

/// Structure the continuation response must follow.
pub fn continuation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "adventure": {
                "type": "STRING",
                "description": "The next part of the story based on the child's choice. Describe the action with sounds and emotions."
            },
            "ending": {
                "type": "STRING",
                "description": "The happy conclusion of the story with a positive message."
            }
        },
        "required": ["adventure", "ending"]
    })
}

/// An adapter that implements the core story collaborators on top of the Gemini REST API.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: GeminiClient,
    prompts: StoryPrompts,
    story_model: String,
    speech_model: String,
    voice: String,
}

impl GeminiAdapter {
    pub fn new(
        client: GeminiClient,
        prompts: StoryPrompts,
        story_model: &str,
        speech_model: &str,
        voice: &str,
    ) -> Self {
        Self {
            client,
            prompts,
            story_model: story_model.to_string(),
            speech_model: speech_model.to_string(),
            voice: voice.to_string(),
        }
    }

    pub fn opening_request(&self, setting: &str) -> GenerateContentRequest {
        GenerateContentRequest::from_text(self.prompts.opening(setting))
            .with_system_instruction(self.prompts.system())
            .with_json_schema(opening_schema())
    }

    pub fn continuation_request(&self, story: &Story, choice: &str) -> GenerateContentRequest {
        GenerateContentRequest::from_text(self.prompts.continuation(story, choice))
            .with_system_instruction(self.prompts.system())
            .with_json_schema(continuation_schema())
    }

    pub fn speech_request(&self, text: &str) -> GenerateContentRequest {
        GenerateContentRequest::from_text(self.prompts.speech(text)).with_speech(&self.voice)
    }
}

fn response_text(response: &GenerateContentResponse) -> Result<String> {
    response.text().with_context(|| {
        format!(
            "No text received from the story model (finish reason: {})",
            response.finish_reason().unwrap_or("unknown")
        )
    })
}

/// Extracts the base64 audio of a speech response.
pub fn response_audio(response: &GenerateContentResponse) -> Result<String> {
    response
        .inline_data()
        .map(str::to_string)
        .context("No audio data received from API.")
}

#[async_trait]
impl StoryGenerator for GeminiAdapter {
    async fn generate_opening(&self, setting: &str) -> Result<OpeningPart> {
        let response = self
            .client
            .generate_content(&self.story_model, &self.opening_request(setting))
            .await?;
        let text = response_text(&response)?;
        tracing::debug!("Opening response: {}", text);
        OpeningPart::from_json(&text).context("Invalid opening from the story model")
    }

    async fn continue_story(&self, story: &Story, choice: &str) -> Result<ContinuationPart> {
        let response = self
            .client
            .generate_content(&self.story_model, &self.continuation_request(story, choice))
            .await?;
        let text = response_text(&response)?;
        tracing::debug!("Continuation response: {}", text);
        ContinuationPart::from_json(&text).context("Invalid continuation from the story model")
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiAdapter {
    async fn synthesize(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .generate_content(&self.speech_model, &self.speech_request(text))
            .await?;
        response_audio(&response)
    }
}
