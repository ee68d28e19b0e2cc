use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use storytime_core::story::Story;

/// Loads every `.md` file in `dir_path`, keyed by file stem.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// Fills every `{name}` placeholder found in `values` in one pass over `template`.
///
/// Inserted values are never scanned again. Unknown placeholders are kept as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let filled = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match filled {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// The four templates the storyteller needs, rendered for one hero.
#[derive(Debug, Clone)]
pub struct StoryPrompts {
    hero: String,
    system: String,
    opening: String,
    continuation: String,
    speech: String,
}

impl StoryPrompts {
    pub const KEYS: [&'static str; 4] = ["system", "opening", "continuation", "speech"];

    /// Picks the templates out of a loaded prompt map. Every key in `KEYS` is required.
    pub fn from_map(prompts: &HashMap<String, String>, hero: &str) -> Result<Self> {
        let missing = Self::KEYS
            .into_iter()
            .find(|key| !prompts.contains_key(*key));
        if let Some(missing) = missing {
            anyhow::bail!("Missing prompt template '{missing}.md'");
        }
        let [system, opening, continuation, speech] = Self::KEYS.map(|key| {
            prompts
                .get(key)
                .map(|template| template.trim().to_string())
                .unwrap_or_default()
        });

        Ok(Self {
            hero: hero.to_string(),
            system,
            opening,
            continuation,
            speech,
        })
    }

    pub fn load(dir_path: &Path, hero: &str) -> Result<Self> {
        let prompts = load_prompts(dir_path)?;
        Self::from_map(&prompts, hero)
    }

    pub fn system(&self) -> String {
        render(&self.system, &[("hero", &self.hero)])
    }

    pub fn opening(&self, setting: &str) -> String {
        render(&self.opening, &[("hero", &self.hero), ("setting", setting)])
    }

    pub fn continuation(&self, story: &Story, choice: &str) -> String {
        render(
            &self.continuation,
            &[
                ("hero", &self.hero),
                ("setting", &story.setting),
                ("opening", &story.opening),
                ("question", &story.question),
                ("choice", choice),
            ],
        )
    }

    pub fn speech(&self, text: &str) -> String {
        render(&self.speech, &[("hero", &self.hero), ("text", text)])
    }
}
