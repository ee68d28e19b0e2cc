//! Keyboard input for the terminal storyteller.

use anyhow::Result;
use std::io::BufRead;
use storytime_core::playback::AudioOutput;
use storytime_core::session::StorySession;
use storytime_core::story::StoryPhase;
use storytime_core::story_api::{SpeechSynthesizer, StoryGenerator};
use tokio::sync::mpsc;

use crate::view;

/// Forwards every line of `reader` on a plain OS thread, outside the runtime's
/// blocking pool, so a pending read never delays runtime shutdown.
pub fn spawn_line_reader<R>(reader: R) -> Result<mpsc::UnboundedReceiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("Error reading input: {}", e);
                        break;
                    }
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Handles the child's taps until `q` or end of input.
pub async fn run<G, S, A>(
    session: &mut StorySession<G, S, A>,
    mut lines: mpsc::UnboundedReceiver<String>,
) where
    G: StoryGenerator,
    S: SpeechSynthesizer,
    A: AudioOutput,
{
    while let Some(line) = lines.recv().await {
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") {
            break;
        }

        match session.phase() {
            phase if phase.can_start() => session.start().await,
            StoryPhase::AwaitingChoice => {
                let choice = session
                    .story()
                    .and_then(|story| view::parse_choice(input, story))
                    .map(str::to_string);
                match choice {
                    Some(choice) => session.choose(&choice).await,
                    None => println!("{}", view::CHOICE_HINT),
                }
            }
            phase => tracing::debug!("Ignoring input while in {:?}.", phase),
        }
    }
}
