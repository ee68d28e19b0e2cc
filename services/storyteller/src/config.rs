//! Application Configuration Module
//!
//! This module centralizes the configuration for the storyteller.
//! It loads settings from environment variables and provides a single
//! struct that is handed to the Gemini adapter, the audio output and the session.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use tracing::Level;

// --- Application Constants ---

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_STORY_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";
pub const DEFAULT_HERO: &str = "Abood";
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub gemini_api_key: SecretString,
    pub api_base: String,
    pub story_model: String,
    pub speech_model: String,
    pub voice: String,
    pub hero: String,
    /// Replaces the built-in story settings when present.
    pub settings: Option<Vec<String>>,
    pub prompts_dir: PathBuf,
    pub output_device: Option<String>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY`: Your secret key for the Gemini API. `API_KEY` is accepted as a fallback.
    // *   `GEMINI_API_BASE`: (Optional) Base URL of the Gemini API.
    // *   `STORY_MODEL`: (Optional) Model that writes the story. Defaults to "gemini-2.5-flash".
    // *   `SPEECH_MODEL`: (Optional) Model that reads it out. Defaults to "gemini-2.5-flash-preview-tts".
    // *   `STORY_VOICE`: (Optional) Prebuilt voice name. Defaults to "Kore".
    // *   `STORY_HERO`: (Optional) The child the stories are about. Defaults to "Abood".
    // *   `STORY_SETTINGS`: (Optional) `;`-separated list of settings to pick from.
    // *   `PROMPTS_DIR`: (Optional) Directory of prompt templates. Defaults to "prompts".
    // *   `AUDIO_OUTPUT_DEVICE`: (Optional) Output device name. Defaults to the system default.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let gemini_api_key = var("GEMINI_API_KEY")
            .or_else(|| var("API_KEY"))
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let settings = var("STORY_SETTINGS").and_then(|raw| {
            let settings: Vec<String> = raw
                .split(';')
                .map(str::trim)
                .filter(|setting| !setting.is_empty())
                .map(str::to_string)
                .collect();
            (!settings.is_empty()).then_some(settings)
        });

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            gemini_api_key: SecretString::from(gemini_api_key),
            api_base: var("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            story_model: var("STORY_MODEL").unwrap_or_else(|| DEFAULT_STORY_MODEL.to_string()),
            speech_model: var("SPEECH_MODEL").unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            voice: var("STORY_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            hero: var("STORY_HERO").unwrap_or_else(|| DEFAULT_HERO.to_string()),
            settings,
            prompts_dir: var("PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPTS_DIR)),
            output_device: var("AUDIO_OUTPUT_DEVICE"),
            log_level,
        })
    }
}
