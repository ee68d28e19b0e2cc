//! Terminal presentation of a story session.
//!
//! `StoryView` turns session events into the lines printed for the child. Cards
//! that are already on screen are not printed again, so the story reads top to
//! bottom as it is narrated.

use storytime_core::SessionEvent;
use storytime_core::story::{Story, StoryPhase};

pub const LOADING_TEXT: &str = "🪄 Thinking of a magical story...";
pub const START_ACTION: &str = "▶ Press Enter to start a new story (q to quit)";
pub const RESTART_ACTION: &str = "▶ Press Enter to hear another story! (q to quit)";
pub const CHOICE_HINT: &str = "Type 1 or 2 and press Enter.";

#[derive(Debug)]
pub struct StoryView {
    hero: String,
    shown: Vec<String>,
}

impl StoryView {
    pub fn new(hero: &str) -> Self {
        Self {
            hero: hero.to_string(),
            shown: Vec::new(),
        }
    }

    pub fn title(&self) -> Vec<String> {
        vec![
            format!("✨ Story Time with {} ✨", self.hero),
            "Let's go on an adventure!".to_string(),
        ]
    }

    /// Lines to print for `event`, given everything printed so far.
    pub fn apply(&mut self, event: &SessionEvent) -> Vec<String> {
        match event {
            SessionEvent::Failed { message } => vec![format!("😢 {message}")],
            SessionEvent::PhaseChanged { phase, story } => self.phase_changed(*phase, story.as_ref()),
        }
    }

    fn phase_changed(&mut self, phase: StoryPhase, story: Option<&Story>) -> Vec<String> {
        let mut lines = Vec::new();

        match phase {
            StoryPhase::Idle => {
                self.shown.clear();
                lines.extend(self.title());
            }
            StoryPhase::Generating => self.shown.clear(),
            _ => {}
        }
        if phase.is_generating() {
            lines.push(LOADING_TEXT.to_string());
        }

        if let Some(cards) = story.and_then(|story| story_cards(phase, story)) {
            if !cards.starts_with(&self.shown) {
                self.shown.clear();
            }
            lines.extend(cards[self.shown.len()..].iter().cloned());
            self.shown = cards;
        }

        lines.extend(actions(phase, story));
        lines
    }
}

/// The story cards visible in `phase`, or `None` while the screen shows something else.
pub fn story_cards(phase: StoryPhase, story: &Story) -> Option<Vec<String>> {
    if matches!(phase, StoryPhase::Idle) || phase.is_generating() {
        return None;
    }

    let mut cards = vec![format!("📖 {}", story.opening)];
    if phase.shows_question() {
        cards.push(format!("🤔 {}", story.question));
    }
    if !story.adventure.is_empty() {
        cards.push(format!("🌟 {}", story.adventure));
    }
    if !story.ending.is_empty() {
        cards.push(format!("🌈 {}", story.ending));
    }
    Some(cards)
}

/// What the child can do next in `phase`.
pub fn actions(phase: StoryPhase, story: Option<&Story>) -> Vec<String> {
    match (phase, story) {
        (StoryPhase::Idle, _) => vec![START_ACTION.to_string()],
        (StoryPhase::AwaitingChoice, Some(story)) => story
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| format!("  [{}] {}", i + 1, option))
            .chain(std::iter::once(CHOICE_HINT.to_string()))
            .collect(),
        (StoryPhase::Finished, _) => vec![RESTART_ACTION.to_string()],
        _ => Vec::new(),
    }
}

/// Maps the typed key to one of the story's options.
pub fn parse_choice<'a>(input: &str, story: &'a Story) -> Option<&'a str> {
    let index = input.trim().parse::<usize>().ok()?.checked_sub(1)?;
    story.options.get(index).map(String::as_str)
}
