//! User settings, stored under the same keys the browser extension used.
//!
//! Loading never fails: each field is validated on its own and falls back to
//! its default when absent, mistyped or out of range. Saving validates the
//! whole record first and writes nothing when any field is rejected.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Overrides, Profile};
use crate::error::StoreError;
use crate::prompt::{self, PromptTemplate};
use crate::store::KeyValueStore;

pub const DEFAULT_TEMPERATURE: f64 = 0.9;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MIN_TIMEOUT_SECS: u64 = 5;

pub mod keys {
    pub const API_KEY: &str = "openRouterApiKey";
    pub const SELECTED_MODEL: &str = "selectedModel";
    pub const SELECTED_PROMPT_ID: &str = "selectedPromptId";
    pub const PROMPTS: &str = "prompts";
    pub const TEMPERATURE: &str = "temperature";
    pub const TIMEOUT: &str = "timeout";
    pub const VERBOSE_LOGGING: &str = "verboseLoggingEnabled";
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub selected_model: String,
    pub selected_prompt_id: Option<String>,
    pub prompts: Vec<PromptTemplate>,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub verbose_logging: bool,
}

impl Settings {
    pub fn selected_prompt(&self) -> Option<&PromptTemplate> {
        self.selected_prompt_id.as_deref().and_then(|id| prompt::find(&self.prompts, id))
    }

    /// Rename a prompt. A blank name keeps the current one.
    pub fn rename_prompt(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        match self.prompts.iter_mut().find(|p| p.id == id) {
            Some(p) if !name.is_empty() => {
                p.name = name.to_string();
                true
            }
            Some(p) => {
                warn!(id, kept = %p.name, "blank prompt name ignored");
                false
            }
            None => false,
        }
    }

    pub fn set_prompt_text(&mut self, id: &str, text: &str) -> bool {
        match self.prompts.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.text = text.to_string();
                true
            }
            None => false,
        }
    }

    fn to_items(&self) -> Map<String, Value> {
        let mut items = Map::new();
        items.insert(keys::API_KEY.into(), json!(self.api_key.clone().unwrap_or_default()));
        items.insert(keys::SELECTED_MODEL.into(), json!(self.selected_model));
        items.insert(keys::SELECTED_PROMPT_ID.into(), json!(self.selected_prompt_id));
        items.insert(keys::PROMPTS.into(), json!(self.prompts));
        items.insert(keys::TEMPERATURE.into(), json!(self.temperature));
        items.insert(keys::TIMEOUT.into(), json!(self.timeout_secs));
        items.insert(keys::VERBOSE_LOGGING.into(), json!(self.verbose_logging));
        items
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Temperature must be between 0 and 2.")]
    InvalidTemperature,

    #[error("Timeout must be a number and at least 5 seconds.")]
    InvalidTimeout,

    #[error("No prompt selected.")]
    NoPromptSelected,

    #[error("No model selected.")]
    NoModelSelected,

    #[error("Selected prompt (ID: {0}) not found.")]
    UnknownPrompt(String),

    #[error("Prompt \"{0}\" must contain the %TEXT% marker exactly once.")]
    InvalidTemplate(String),

    #[error("Error saving settings: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Clone)]
pub struct SettingsProvider {
    store: Arc<dyn KeyValueStore>,
    default_model: String,
    default_prompts: Vec<PromptTemplate>,
    overrides: Overrides,
}

impl SettingsProvider {
    pub fn new(store: Arc<dyn KeyValueStore>, profile: &Profile) -> Self {
        Self {
            store,
            default_model: profile.default_model.clone(),
            default_prompts: profile.default_prompts.clone(),
            overrides: Overrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn defaults(&self) -> Settings {
        Settings {
            api_key: None,
            selected_model: self.default_model.clone(),
            selected_prompt_id: self.default_prompts.first().map(|p| p.id.clone()),
            prompts: self.default_prompts.clone(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verbose_logging: false,
        }
    }

    /// Effective settings for one invocation, environment overrides applied.
    pub fn load(&self) -> Settings {
        let mut settings = self.load_stored();
        if let Some(key) = &self.overrides.api_key {
            settings.api_key = Some(key.clone());
        }
        if let Some(model) = &self.overrides.model {
            settings.selected_model = model.clone();
        }
        settings
    }

    /// Settings exactly as stored, for editing surfaces.
    pub fn load_stored(&self) -> Settings {
        let items = self.store.get_all().unwrap_or_else(|e| {
            warn!("Error getting settings from storage: {}", e);
            Map::new()
        });
        let defaults = self.defaults();
        let text = |key: &str| {
            items.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
        };

        let prompts = match items.get(keys::PROMPTS) {
            Some(v) => serde_json::from_value::<Vec<PromptTemplate>>(v.clone()).unwrap_or_else(|e| {
                warn!("stored prompts unreadable, using defaults: {}", e);
                defaults.prompts.clone()
            }),
            None => defaults.prompts.clone(),
        };

        let temperature = items
            .get(keys::TEMPERATURE)
            .and_then(Value::as_f64)
            .filter(|t| (0.0..=2.0).contains(t))
            .unwrap_or(DEFAULT_TEMPERATURE);

        let timeout_secs = items
            .get(keys::TIMEOUT)
            .and_then(Value::as_f64)
            .filter(|t| *t >= MIN_TIMEOUT_SECS as f64)
            .map(|t| t as u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Settings {
            api_key: text(keys::API_KEY),
            selected_model: text(keys::SELECTED_MODEL).unwrap_or(defaults.selected_model),
            selected_prompt_id: text(keys::SELECTED_PROMPT_ID).or(defaults.selected_prompt_id),
            prompts,
            temperature,
            timeout_secs,
            verbose_logging: items
                .get(keys::VERBOSE_LOGGING)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    pub fn validate(settings: &Settings) -> Result<(), SettingsError> {
        if !settings.temperature.is_finite() || !(0.0..=2.0).contains(&settings.temperature) {
            return Err(SettingsError::InvalidTemperature);
        }
        if settings.timeout_secs < MIN_TIMEOUT_SECS {
            return Err(SettingsError::InvalidTimeout);
        }
        let selected = settings.selected_prompt_id.as_deref().ok_or(SettingsError::NoPromptSelected)?;
        if settings.selected_model.trim().is_empty() {
            return Err(SettingsError::NoModelSelected);
        }
        if prompt::find(&settings.prompts, selected).is_none() {
            return Err(SettingsError::UnknownPrompt(selected.to_string()));
        }
        if let Some(bad) = settings.prompts.iter().find(|p| p.marker_count() != 1) {
            return Err(SettingsError::InvalidTemplate(bad.name.clone()));
        }
        Ok(())
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        Self::validate(settings)?;
        self.store.set(settings.to_items())?;
        info!("Settings saved.");
        Ok(())
    }

    /// Write defaults for keys that have never been stored. Returns how many
    /// keys were written.
    pub fn initialize(&self) -> Result<usize, StoreError> {
        let existing = self.store.get_all()?;
        let mut missing = self.defaults().to_items();
        missing.remove(keys::API_KEY);
        missing.retain(|k, _| !existing.contains_key(k));
        let written = missing.len();
        if written > 0 {
            debug!(keys = ?missing.keys().collect::<Vec<_>>(), "applying initial defaults");
            self.store.set(missing)?;
            info!("Applied initial/default settings.");
        }
        Ok(written)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
