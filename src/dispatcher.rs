//! One trigger, start to finish: settings, prompt, completion, history,
//! delivery. Every invocation is independent; nothing serializes them except
//! the history writer.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::client::CompletionClient;
use crate::config::{Profile, TriggerContext};
use crate::error::AssistError;
use crate::history::{HistoryEntry, HistoryLog};
use crate::prompt;
use crate::settings::SettingsProvider;
use crate::sink::{notify, Delivered, Destination, Level, Page, ResultSink};

/// A user action asking for a generation.
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    pub selection: String,
    /// Prompt picked from the menu; `None` uses the selected prompt.
    pub prompt_id: Option<String>,
    /// Editable element the result should replace, for editable profiles.
    pub target: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SettingsLoading,
    PromptResolving,
    Requesting,
    Delivering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::SettingsLoading => "settings-loading",
            Stage::PromptResolving => "prompt-resolving",
            Stage::Requesting => "requesting",
            Stage::Delivering => "delivering",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Delivered { text: String, elapsed: Duration, via: Delivered },
    /// Nothing was selected.
    Skipped,
}

#[derive(Clone)]
pub struct Dispatcher {
    profile: Profile,
    settings: SettingsProvider,
    client: CompletionClient,
    history: Option<HistoryLog>,
}

impl Dispatcher {
    pub fn new(
        profile: Profile,
        settings: SettingsProvider,
        client: CompletionClient,
        history: Option<HistoryLog>,
    ) -> Self {
        let history = if profile.history_enabled { history } else { None };
        Self { profile, settings, client, history }
    }

    pub fn settings(&self) -> &SettingsProvider {
        &self.settings
    }

    /// Run one trigger. The outcome is also reported to `page`.
    pub async fn dispatch(&self, trigger: Trigger, page: Option<&dyn Page>) -> Result<Outcome, AssistError> {
        if trigger.selection.trim().is_empty() {
            debug!("trigger without selected text ignored");
            return Ok(Outcome::Skipped);
        }
        let result = self.run(&trigger, page).await;
        match &result {
            Ok(Outcome::Delivered { via, .. }) => notify(page, Level::Success, via.message()),
            Ok(Outcome::Skipped) => {}
            Err(e) => {
                error!("{}", e);
                notify(page, Level::Error, &e.to_string());
            }
        }
        debug!(stage = %Stage::Idle, "dispatch finished");
        result
    }

    async fn run(&self, trigger: &Trigger, page: Option<&dyn Page>) -> Result<Outcome, AssistError> {
        debug!(stage = %Stage::SettingsLoading);
        let settings = self.settings.load();
        if settings.api_key.is_none() {
            return Err(AssistError::Config(
                "API Key not set. Please configure it in settings.".into(),
            ));
        }
        if settings.selected_model.trim().is_empty() {
            return Err(AssistError::Config(
                "Model not configured. Please check settings.".into(),
            ));
        }

        debug!(stage = %Stage::PromptResolving);
        let wanted = trigger.prompt_id.as_deref().or(settings.selected_prompt_id.as_deref());
        let template = match wanted {
            Some(id) => prompt::find(&settings.prompts, id)
                .ok_or_else(|| AssistError::Config(format!("Clicked prompt (ID: {id}) not found.")))?,
            None => return Err(AssistError::Config("No prompt selected.".into())),
        };
        let user_prompt = template.resolve(&trigger.selection)?;
        info!(prompt = %template.name, chars = trigger.selection.len(), "generating");

        debug!(stage = %Stage::Requesting);
        let started = Instant::now();
        let text = self.client.complete(&user_prompt, &settings).await?;
        let elapsed = started.elapsed();
        info!("Generated result in {:.2}s", elapsed.as_secs_f64());

        if let Some(history) = &self.history {
            let entry = HistoryEntry::now(&settings.selected_model, &trigger.selection, &text, elapsed);
            if let Err(e) = history.append(entry).await {
                warn!("Error saving log entry: {}", e);
            }
        }

        debug!(stage = %Stage::Delivering);
        let destination = self.destination(trigger);
        let via = ResultSink::deliver(&text, &destination, page)?;
        Ok(Outcome::Delivered { text, elapsed, via })
    }

    fn destination(&self, trigger: &Trigger) -> Destination {
        match (self.profile.context, &trigger.target) {
            (TriggerContext::Editable, Some(target)) => Destination::Editable { target: target.clone() },
            _ => Destination::Clipboard,
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
