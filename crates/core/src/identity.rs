//! Identity: the behavioural instructions sent ahead of every decision.
//!
//! The prompt comes from the first source that is set:
//!
//! 1. **Override**: an inline prompt from config
//! 2. **Prompt file**: a Markdown file named in config
//! 3. **Built-in**: `prompts/system_prompt.md`, compiled into the binary
//!
//! An unreadable or empty prompt file is logged and skipped.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// The prompt shipped with the binary.
pub const BUILTIN_SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.md");

/// Where the system prompt may come from.
#[derive(Debug, Clone, Default)]
pub struct PromptSources {
    pub system_prompt_override: Option<String>,
    pub system_prompt_file: Option<PathBuf>,
}

/// Which source the prompt was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOrigin {
    Override,
    File(PathBuf),
    Builtin,
}

/// The assistant's instructions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub system_prompt: String,
    pub origin: PromptOrigin,
}

impl Identity {
    pub fn builtin() -> Self {
        Self {
            system_prompt: BUILTIN_SYSTEM_PROMPT.to_string(),
            origin: PromptOrigin::Builtin,
        }
    }

    /// Resolve the prompt from the configured sources.
    pub fn load(sources: &PromptSources) -> Self {
        if let Some(prompt) = sources.system_prompt_override.as_deref().filter(|p| !p.trim().is_empty()) {
            debug!("Using system prompt override");
            return Self {
                system_prompt: prompt.to_string(),
                origin: PromptOrigin::Override,
            };
        }

        if let Some(path) = &sources.system_prompt_file {
            if let Some(prompt) = read_prompt_file(path) {
                debug!(path = %path.display(), "Loaded system prompt file");
                return Self {
                    system_prompt: prompt,
                    origin: PromptOrigin::File(path.clone()),
                };
            }
        }

        Self::builtin()
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.system_prompt.len() / 4
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::builtin()
    }
}

fn read_prompt_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => Some(content),
        Ok(_) => {
            warn!(path = %path.display(), "System prompt file is empty, using built-in prompt");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read system prompt file, using built-in prompt");
            None
        }
    }
}
