pub mod audio;
pub mod error;
pub mod narration;
pub mod playback;
pub mod session;
pub mod story;
pub mod story_api;

use story::{Story, StoryPhase};

/// Notifications the session (`StorySession`) publishes for the presentation layer.
///
/// The session never renders anything itself; whoever holds the receiver decides
/// what the child sees for each phase.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session entered `phase`. `story` is a snapshot of the story at that moment.
    PhaseChanged {
        phase: StoryPhase,
        story: Option<Story>,
    },
    /// The session was aborted or refused to start, with a message for the user.
    Failed { message: String },
}
