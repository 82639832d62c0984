use std::path::{Path, PathBuf};

use crate::prompt::{PromptTemplate, DEFAULT_PROMPTS, REPLY_PROMPTS};

pub const APP_TITLE: &str = "Smart Browser Assistant";
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini-search-preview";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI assistant focused on critical analysis and counter-arguments.";

/// Where a trigger's text comes from, and so where its result goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerContext {
    /// Selected text; the result is copied to the clipboard.
    Selection,
    /// An editable box; the result replaces its content.
    Editable,
}

/// Everything that distinguishes one assistant variant from another.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: &'static str,
    pub context: TriggerContext,
    pub default_model: String,
    pub default_prompts: Vec<PromptTemplate>,
    pub system_prompt: String,
    pub history_enabled: bool,
}

impl Profile {
    pub fn assistant() -> Self {
        Self {
            name: "assistant",
            context: TriggerContext::Selection,
            default_model: DEFAULT_MODEL.to_string(),
            default_prompts: DEFAULT_PROMPTS.clone(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_enabled: true,
        }
    }

    pub fn reply() -> Self {
        Self {
            name: "reply",
            context: TriggerContext::Editable,
            default_model: DEFAULT_MODEL.to_string(),
            default_prompts: REPLY_PROMPTS.clone(),
            system_prompt: "You are a helpful assistant that drafts concise replies.".to_string(),
            history_enabled: false,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "assistant" => Some(Self::assistant()),
            "reply" => Some(Self::reply()),
            _ => None,
        }
    }
}

/// Values taken from the environment that win over stored settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.is_empty());
        Self { api_key: var("OPENROUTER_API_KEY"), model: var("OPENROUTER_MODEL") }
    }
}

/// Files owned by one profile.
#[derive(Debug, Clone)]
pub struct AppPaths {
    dir: PathBuf,
    profile: &'static str,
}

impl AppPaths {
    pub fn new(dir: impl Into<PathBuf>, profile: &Profile) -> Self {
        Self { dir: dir.into(), profile: profile.name }
    }

    /// Directory of the running executable, or `.` if unknown.
    pub fn exe_dir() -> PathBuf {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        exe.parent().unwrap_or(Path::new(".")).to_path_buf()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, stem: &str) -> PathBuf {
        if self.profile == "assistant" {
            self.dir.join(format!("{stem}.json"))
        } else {
            self.dir.join(format!("{stem}.{}.json", self.profile))
        }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.file("settings")
    }

    pub fn history_file(&self) -> PathBuf {
        self.file("history")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_by_name() {
        let a = Profile::by_name("assistant").unwrap();
        assert_eq!(a.context, TriggerContext::Selection);
        assert!(a.history_enabled);
        let r = Profile::by_name("reply").unwrap();
        assert_eq!(r.context, TriggerContext::Editable);
        assert!(!r.history_enabled);
        assert!(Profile::by_name("nope").is_none());
    }

    #[test]
    fn paths_are_per_profile() {
        let a = AppPaths::new("/data", &Profile::assistant());
        assert_eq!(a.settings_file(), Path::new("/data/settings.json"));
        assert_eq!(a.history_file(), Path::new("/data/history.json"));
        let r = AppPaths::new("/data", &Profile::reply());
        assert_eq!(r.settings_file(), Path::new("/data/settings.reply.json"));
    }
}
