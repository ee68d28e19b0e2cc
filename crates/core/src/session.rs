use crate::{
    SessionEvent,
    error::{
        CONTINUATION_FAILED_MESSAGE, OPENING_FAILED_MESSAGE, StoryError, UNSUPPORTED_AUDIO_MESSAGE,
    },
    narration::strip_sound_effects,
    playback::{AudioOutput, play_encoded},
    story::{STORY_SETTINGS, Story, StoryPhase},
    story_api::{SpeechSynthesizer, StoryGenerator},
};
use rand::seq::SliceRandom;
use tokio::sync::mpsc;

/// Drives one story at a time: generate, narrate, wait for a choice, generate, narrate.
///
/// Both operations take `&mut self` and run to completion, so two sessions can
/// never overlap. Every failure lands back in `Idle` with a message for the user.
pub struct StorySession<G, S, A> {
    generator: G,
    speech: S,
    audio: Option<A>,
    settings: Vec<String>,
    phase: StoryPhase,
    story: Option<Story>,
    error: Option<String>,
    event_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl<G, S, A> StorySession<G, S, A>
where
    G: StoryGenerator,
    S: SpeechSynthesizer,
    A: AudioOutput,
{
    /// `audio` is `None` when no output could be opened; the session then refuses to start.
    pub fn new(generator: G, speech: S, audio: Option<A>) -> Self {
        Self {
            generator,
            speech,
            audio,
            settings: STORY_SETTINGS.iter().map(|s| s.to_string()).collect(),
            phase: StoryPhase::Idle,
            story: None,
            error: None,
            event_tx: None,
        }
    }

    /// Replaces the built-in settings. An empty list keeps the defaults.
    pub fn with_settings(mut self, settings: Vec<String>) -> Self {
        if settings.is_empty() {
            tracing::warn!("Ignoring empty settings list, keeping the built-in settings.");
        } else {
            self.settings = settings;
        }
        self
    }

    /// Returns a receiver for phase changes and failures.
    /// Calling this again replaces the previous receiver.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    pub fn phase(&self) -> StoryPhase {
        self.phase
    }

    pub fn story(&self) -> Option<&Story> {
        self.story.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Starts a new story. Does nothing unless the session is `Idle` or `Finished`.
    pub async fn start(&mut self) {
        if !self.phase.can_start() {
            tracing::debug!("Ignoring start request while in {:?}.", self.phase);
            return;
        }

        if self.audio.is_none() {
            tracing::error!("Cannot start a story: {}", StoryError::UnsupportedEnvironment);
            self.report(UNSUPPORTED_AUDIO_MESSAGE);
            return;
        }

        self.error = None;
        self.story = None;
        self.set_phase(StoryPhase::Generating);

        match self.tell_opening().await {
            Ok(()) => self.set_phase(StoryPhase::AwaitingChoice),
            Err(e) => {
                tracing::error!("Failed to tell the opening: {}", e);
                self.abort(OPENING_FAILED_MESSAGE);
            }
        }
    }

    /// Continues the story with the child's choice. Does nothing unless the
    /// session is `AwaitingChoice`.
    pub async fn choose(&mut self, choice: &str) {
        if self.phase != StoryPhase::AwaitingChoice {
            tracing::debug!("Ignoring choice '{}' while in {:?}.", choice, self.phase);
            return;
        }
        let Some(story) = self.story.clone() else {
            tracing::debug!("Ignoring choice '{}': no story in progress.", choice);
            return;
        };

        self.set_phase(StoryPhase::GeneratingContinuation);

        match self.tell_ending(story, choice).await {
            Ok(()) => self.set_phase(StoryPhase::Finished),
            Err(e) => {
                tracing::error!("Failed to tell the ending: {}", e);
                self.abort(CONTINUATION_FAILED_MESSAGE);
            }
        }
    }

    async fn tell_opening(&mut self) -> Result<(), StoryError> {
        let setting = self.pick_setting();
        tracing::info!("Starting a new story set in {}.", setting);

        let opening = self
            .generator
            .generate_opening(&setting)
            .await
            .map_err(StoryError::Generation)?;
        let story = Story::new(setting, opening);
        self.story = Some(story.clone());

        self.set_phase(StoryPhase::PresentingOpening);
        self.narrate(&story.opening).await?;
        self.narrate(&story.question).await?;
        Ok(())
    }

    async fn tell_ending(&mut self, story: Story, choice: &str) -> Result<(), StoryError> {
        tracing::info!("Continuing the story with choice '{}'.", choice);

        let continuation = self
            .generator
            .continue_story(&story, choice)
            .await
            .map_err(StoryError::Generation)?;
        let story = story.with_continuation(continuation);
        self.story = Some(story.clone());

        self.set_phase(StoryPhase::PresentingEnding);
        self.narrate(&story.adventure).await?;
        self.narrate(&story.ending).await?;
        Ok(())
    }

    /// Speaks one piece of text and waits until playback has ended.
    async fn narrate(&self, text: &str) -> Result<(), StoryError> {
        let audio = self
            .audio
            .as_ref()
            .ok_or(StoryError::UnsupportedEnvironment)?;

        let spoken = strip_sound_effects(text);
        let encoded = self
            .speech
            .synthesize(&spoken)
            .await
            .map_err(StoryError::Speech)?;
        play_encoded(audio, &encoded).await?;
        Ok(())
    }

    fn pick_setting(&self) -> String {
        self.settings
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| STORY_SETTINGS[0].to_string())
    }

    fn set_phase(&mut self, phase: StoryPhase) {
        tracing::info!("Story phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.emit(SessionEvent::PhaseChanged {
            phase,
            story: self.story.clone(),
        });
    }

    fn abort(&mut self, message: &str) {
        self.story = None;
        self.report(message);
        self.set_phase(StoryPhase::Idle);
    }

    fn report(&mut self, message: &str) {
        self.error = Some(message.to_string());
        self.emit(SessionEvent::Failed {
            message: message.to_string(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event).is_err() {
                tracing::debug!("Session event receiver dropped.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{MockAudioOutput, OutputState};
    use crate::story::{ContinuationPart, OpeningPart};
    use crate::story_api::{MockSpeechSynthesizer, MockStoryGenerator};
    use base64::Engine;
    use mockall::Sequence;

    type TestSession = StorySession<MockStoryGenerator, MockSpeechSynthesizer, MockAudioOutput>;

    const FOREST: &str = "a magical forest";

    fn payload() -> String {
        let bytes: Vec<u8> = [0i16, 1000, -1000, 0]
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn forest_opening() -> OpeningPart {
        OpeningPart {
            opening_scene: "Once upon a time...".to_string(),
            question: "What should he do?".to_string(),
            options: [
                "Follow the path 🦋".to_string(),
                "Climb the tree 🌳".to_string(),
            ],
        }
    }

    fn tree_continuation() -> ContinuationPart {
        ContinuationPart {
            adventure: "He climbed up high! [rustle rustle]".to_string(),
            ending: "Yay! Climbing is fun! 🎉".to_string(),
        }
    }

    fn speaking_synthesizer() -> MockSpeechSynthesizer {
        let mut speech = MockSpeechSynthesizer::new();
        speech.expect_synthesize().returning(|_| Ok(payload()));
        speech
    }

    fn working_audio() -> MockAudioOutput {
        let mut audio = MockAudioOutput::new();
        audio.expect_state().return_const(OutputState::Running);
        audio.expect_play().returning(|_| Ok(()));
        audio
    }

    fn forest_generator() -> MockStoryGenerator {
        let mut generator = MockStoryGenerator::new();
        generator
            .expect_generate_opening()
            .withf(|setting| setting == FOREST)
            .returning(|_| Ok(forest_opening()))
            .times(1);
        generator
    }

    fn session(generator: MockStoryGenerator) -> TestSession {
        StorySession::new(generator, speaking_synthesizer(), Some(working_audio()))
            .with_settings(vec![FOREST.to_string()])
    }

    fn phases(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<StoryPhase> {
        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::PhaseChanged { phase, .. } = event {
                phases.push(phase);
            }
        }
        phases
    }

    #[tokio::test]
    async fn test_full_story_walks_every_phase_in_order() {
        let mut generator = forest_generator();
        generator
            .expect_continue_story()
            .withf(|story, choice| {
                choice == "Climb the tree 🌳"
                    && story.setting == FOREST
                    && story.opening == "Once upon a time..."
                    && story.question == "What should he do?"
            })
            .returning(|_, _| Ok(tree_continuation()))
            .times(1);

        let mut session = session(generator);
        let mut events = session.subscribe();
        assert_eq!(session.phase(), StoryPhase::Idle);

        session.start().await;
        assert_eq!(session.phase(), StoryPhase::AwaitingChoice);
        let story = session.story().expect("story should exist");
        assert_eq!(story.options.len(), 2);
        assert_eq!(story.setting, FOREST);
        assert!(story.adventure.is_empty() && story.ending.is_empty());

        session.choose("Climb the tree 🌳").await;
        assert_eq!(session.phase(), StoryPhase::Finished);
        let story = session.story().expect("story should exist");
        assert!(!story.adventure.is_empty());
        assert!(!story.ending.is_empty());
        assert_eq!(story.options[1], "Climb the tree 🌳");
        assert!(session.error().is_none());

        assert_eq!(
            phases(&mut events),
            vec![
                StoryPhase::Generating,
                StoryPhase::PresentingOpening,
                StoryPhase::AwaitingChoice,
                StoryPhase::GeneratingContinuation,
                StoryPhase::PresentingEnding,
                StoryPhase::Finished,
            ]
        );
    }

    #[tokio::test]
    async fn test_narrations_run_one_after_another() {
        let mut speech = MockSpeechSynthesizer::new();
        let mut audio = MockAudioOutput::new();
        let mut seq = Sequence::new();
        audio.expect_state().return_const(OutputState::Running);

        for text in ["Once upon a time...", "What should he do?"] {
            speech
                .expect_synthesize()
                .withf(move |spoken| spoken == text)
                .returning(|_| Ok(payload()))
                .times(1)
                .in_sequence(&mut seq);
            audio
                .expect_play()
                .returning(|_| Ok(()))
                .times(1)
                .in_sequence(&mut seq);
        }

        let mut session = StorySession::new(forest_generator(), speech, Some(audio))
            .with_settings(vec![FOREST.to_string()]);
        session.start().await;
        assert_eq!(session.phase(), StoryPhase::AwaitingChoice);
    }

    #[tokio::test]
    async fn test_sound_effects_are_not_spoken() {
        let mut generator = MockStoryGenerator::new();
        generator.expect_generate_opening().returning(|_| {
            Ok(OpeningPart {
                opening_scene: "Birds sing [chirp chirp] today".to_string(),
                question: "Where to?".to_string(),
                options: ["Up".to_string(), "Down".to_string()],
            })
        });
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .withf(|text| !text.contains('['))
            .returning(|_| Ok(payload()))
            .times(2);

        let mut session = StorySession::new(generator, speech, Some(working_audio()));
        session.start().await;

        assert_eq!(session.phase(), StoryPhase::AwaitingChoice);
        // The displayed text keeps its sound effects.
        assert_eq!(
            session.story().map(|s| s.opening.as_str()),
            Some("Birds sing [chirp chirp] today")
        );
    }

    #[tokio::test]
    async fn test_start_is_ignored_while_story_in_progress() {
        // `times(1)` on the opening fails the test if the second start reaches the generator.
        let mut session = session(forest_generator());
        session.start().await;
        let before = session.story().cloned();

        session.start().await;
        assert_eq!(session.phase(), StoryPhase::AwaitingChoice);
        assert_eq!(session.story().cloned(), before);
    }

    #[tokio::test]
    async fn test_choice_is_ignored_unless_awaiting_choice() {
        let mut generator = MockStoryGenerator::new();
        generator.expect_continue_story().never();

        let mut session = StorySession::new(
            generator,
            MockSpeechSynthesizer::new(),
            Some(MockAudioOutput::new()),
        );
        let mut events = session.subscribe();

        session.choose("Climb the tree 🌳").await;
        assert_eq!(session.phase(), StoryPhase::Idle);
        assert!(session.story().is_none());
        assert!(phases(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_returns_to_idle() {
        let mut generator = MockStoryGenerator::new();
        generator
            .expect_generate_opening()
            .returning(|_| Err(anyhow::anyhow!("Expected exactly 2 options, got 3")));
        let mut speech = MockSpeechSynthesizer::new();
        speech.expect_synthesize().never();

        let mut session = StorySession::new(generator, speech, Some(working_audio()));
        let mut events = session.subscribe();
        session.start().await;

        assert_eq!(session.phase(), StoryPhase::Idle);
        assert!(session.story().is_none());
        assert_eq!(session.error(), Some(OPENING_FAILED_MESSAGE));
        assert_eq!(
            phases(&mut events),
            vec![StoryPhase::Generating, StoryPhase::Idle]
        );
    }

    #[tokio::test]
    async fn test_missing_audio_payload_discards_opening() {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .returning(|_| Err(anyhow::anyhow!("No audio data received from API.")))
            .times(1);
        let mut audio = MockAudioOutput::new();
        audio.expect_play().never();

        let mut session = StorySession::new(forest_generator(), speech, Some(audio))
            .with_settings(vec![FOREST.to_string()]);
        session.start().await;

        assert_eq!(session.phase(), StoryPhase::Idle);
        assert!(session.story().is_none());
        assert_eq!(session.error(), Some(OPENING_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn test_playback_failure_discards_opening() {
        let mut audio = MockAudioOutput::new();
        audio.expect_state().return_const(OutputState::Suspended);
        audio
            .expect_resume()
            .returning(|| Err(anyhow::anyhow!("stream unavailable")));
        audio.expect_play().never();

        let mut session = StorySession::new(forest_generator(), speaking_synthesizer(), Some(audio))
            .with_settings(vec![FOREST.to_string()]);
        session.start().await;

        assert_eq!(session.phase(), StoryPhase::Idle);
        assert!(session.story().is_none());
    }

    #[tokio::test]
    async fn test_continuation_failure_drops_story_and_allows_restart() {
        let mut generator = MockStoryGenerator::new();
        generator
            .expect_generate_opening()
            .returning(|_| Ok(forest_opening()))
            .times(2);
        generator
            .expect_continue_story()
            .returning(|_, _| Err(anyhow::anyhow!("Response is missing the 'ending' field")))
            .times(1);

        let mut session = session(generator);
        session.start().await;
        session.choose("Follow the path 🦋").await;

        assert_eq!(session.phase(), StoryPhase::Idle);
        assert!(session.story().is_none());
        assert_eq!(session.error(), Some(CONTINUATION_FAILED_MESSAGE));

        session.start().await;
        assert_eq!(session.phase(), StoryPhase::AwaitingChoice);
        assert!(session.error().is_none());
    }

    #[tokio::test]
    async fn test_ending_narration_failure_drops_story() {
        let mut generator = forest_generator();
        generator
            .expect_continue_story()
            .returning(|_, _| Ok(tree_continuation()))
            .times(1);
        let mut speech = MockSpeechSynthesizer::new();
        speech.expect_synthesize().returning(|text| {
            if text.starts_with("Yay!") {
                Err(anyhow::anyhow!("No audio data received from API."))
            } else {
                Ok(payload())
            }
        });
        let mut audio = MockAudioOutput::new();
        audio.expect_state().return_const(OutputState::Running);
        // Opening, question and adventure play; the ending never does.
        audio.expect_play().returning(|_| Ok(())).times(3);

        let mut session = StorySession::new(generator, speech, Some(audio))
            .with_settings(vec![FOREST.to_string()]);
        session.start().await;
        let mut events = session.subscribe();
        session.choose("Climb the tree 🌳").await;

        assert_eq!(session.phase(), StoryPhase::Idle);
        assert!(session.story().is_none());
        assert_eq!(session.error(), Some(CONTINUATION_FAILED_MESSAGE));

        let events: Vec<SessionEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert!(matches!(
            events.as_slice(),
            [
                SessionEvent::PhaseChanged { phase: StoryPhase::GeneratingContinuation, .. },
                SessionEvent::PhaseChanged { phase: StoryPhase::PresentingEnding, .. },
                SessionEvent::Failed { message },
                SessionEvent::PhaseChanged { phase: StoryPhase::Idle, story: None },
            ] if message == CONTINUATION_FAILED_MESSAGE
        ));
    }

    #[tokio::test]
    async fn test_finished_story_can_be_replaced() {
        let mut generator = MockStoryGenerator::new();
        generator
            .expect_generate_opening()
            .returning(|_| Ok(forest_opening()))
            .times(2);
        generator
            .expect_continue_story()
            .returning(|_, _| Ok(tree_continuation()));

        let mut session = session(generator);
        session.start().await;
        session.choose("Climb the tree 🌳").await;
        assert_eq!(session.phase(), StoryPhase::Finished);

        session.start().await;
        assert_eq!(session.phase(), StoryPhase::AwaitingChoice);
        let story = session.story().expect("story should exist");
        assert!(story.adventure.is_empty());
        assert!(story.ending.is_empty());
    }

    #[tokio::test]
    async fn test_missing_audio_output_never_starts() {
        let mut generator = MockStoryGenerator::new();
        generator.expect_generate_opening().never();

        let mut session: TestSession =
            StorySession::new(generator, MockSpeechSynthesizer::new(), None);
        let mut events = session.subscribe();
        session.start().await;

        assert_eq!(session.phase(), StoryPhase::Idle);
        assert_eq!(session.error(), Some(UNSUPPORTED_AUDIO_MESSAGE));
        assert!(phases(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_empty_settings_keep_defaults() {
        let mut generator = MockStoryGenerator::new();
        generator
            .expect_generate_opening()
            .withf(|setting| STORY_SETTINGS.contains(&setting))
            .returning(|_| Err(anyhow::anyhow!("offline")))
            .times(1);

        let mut session: TestSession =
            StorySession::new(generator, MockSpeechSynthesizer::new(), Some(working_audio()))
                .with_settings(Vec::new());
        session.start().await;

        assert_eq!(session.phase(), StoryPhase::Idle);
        assert_eq!(session.error(), Some(OPENING_FAILED_MESSAGE));
    }
}
