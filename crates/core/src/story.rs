use serde::Deserialize;

/// The settings a new story can take place in. One is picked at random per session.
pub const STORY_SETTINGS: [&str; 5] = [
    "a magical forest ✨",
    "deep under the blue sea 🐠",
    "a sparkly galaxy far away 🚀",
    "a secret garden with talking flowers 🌷",
    "a land made of yummy candy 🍭",
];

/// Position of the current session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryPhase {
    Idle,
    Generating,
    PresentingOpening,
    AwaitingChoice,
    GeneratingContinuation,
    PresentingEnding,
    Finished,
}

impl StoryPhase {
    /// Phases from which a new story may be started.
    pub fn can_start(self) -> bool {
        matches!(self, StoryPhase::Idle | StoryPhase::Finished)
    }

    /// Phases in which a request to the text generator is in flight.
    pub fn is_generating(self) -> bool {
        matches!(
            self,
            StoryPhase::Generating | StoryPhase::GeneratingContinuation
        )
    }

    /// Phases in which the story question has already been narrated and stays on screen.
    pub fn shows_question(self) -> bool {
        matches!(
            self,
            StoryPhase::AwaitingChoice | StoryPhase::PresentingEnding | StoryPhase::Finished
        )
    }
}

/// One story as it is told, filled in over the course of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub setting: String,
    pub opening: String,
    pub question: String,
    pub options: [String; 2],
    pub adventure: String,
    pub ending: String,
}

impl Story {
    /// Starts a story from a validated opening. Adventure and ending stay empty.
    pub fn new(setting: String, opening: OpeningPart) -> Self {
        Self {
            setting,
            opening: opening.opening_scene,
            question: opening.question,
            options: opening.options,
            adventure: String::new(),
            ending: String::new(),
        }
    }

    /// Merges the continuation in. Setting, opening, question and options are carried over untouched.
    pub fn with_continuation(self, continuation: ContinuationPart) -> Self {
        Self {
            adventure: continuation.adventure,
            ending: continuation.ending,
            ..self
        }
    }
}

/// The first half of a story: the scene, the question and the two choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningPart {
    pub opening_scene: String,
    pub question: String,
    pub options: [String; 2],
}

/// The second half of a story, told after the child picks an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationPart {
    pub adventure: String,
    pub ending: String,
}

/// Reasons a structured response from the text generator is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("Response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Response is missing the '{0}' field")]
    MissingField(&'static str),
    #[error("Response field '{0}' is empty")]
    EmptyField(&'static str),
    #[error("Expected exactly 2 options, got {0}")]
    OptionCount(usize),
}

// Raw shapes of the generator's JSON. Every field is optional so that a missing
// field is reported by name instead of as a generic serde error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningDraft {
    opening_scene: Option<String>,
    question: Option<String>,
    options: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ContinuationDraft {
    adventure: Option<String>,
    ending: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ResponseError> {
    let value = value.ok_or(ResponseError::MissingField(field))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ResponseError::EmptyField(field));
    }
    Ok(value.to_string())
}

impl OpeningPart {
    /// Parses and validates `{openingScene, question, options[2]}`.
    pub fn from_json(json: &str) -> Result<Self, ResponseError> {
        let draft: OpeningDraft = serde_json::from_str(json.trim())?;

        let opening_scene = required(draft.opening_scene, "openingScene")?;
        let question = required(draft.question, "question")?;
        let options = draft.options.ok_or(ResponseError::MissingField("options"))?;

        let options: [String; 2] = options
            .try_into()
            .map_err(|options: Vec<String>| ResponseError::OptionCount(options.len()))?;
        let [first, second] = options;
        let options = [
            required(Some(first), "options")?,
            required(Some(second), "options")?,
        ];

        Ok(Self {
            opening_scene,
            question,
            options,
        })
    }
}

impl ContinuationPart {
    /// Parses and validates `{adventure, ending}`.
    pub fn from_json(json: &str) -> Result<Self, ResponseError> {
        let draft: ContinuationDraft = serde_json::from_str(json.trim())?;
        Ok(Self {
            adventure: required(draft.adventure, "adventure")?,
            ending: required(draft.ending, "ending")?,
        })
    }
}
