use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;

use crate::bench::{self, DEFAULT_SAMPLE};
use crate::client::CompletionClient;
use crate::config::{AppPaths, Overrides, Profile, DEFAULT_API_BASE};
use crate::desktop::{self, DesktopPage};
use crate::dispatcher::{Dispatcher, Outcome, Trigger};
use crate::history::{self, HistoryLog};
use crate::settings::{SettingsError, SettingsProvider};
use crate::sink::{notify, Level};
use crate::store::JsonFileStore;

#[derive(Parser, Debug)]
#[command(name = "smartassist", version, about = "Run text through an OpenRouter prompt template")]
pub struct Cli {
    /// Directory holding settings and history (default: next to the executable)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "assistant", value_parser = ["assistant", "reply"])]
    pub profile: String,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a result for some text
    Run {
        /// Prompt id (default: the selected prompt)
        #[arg(long)]
        prompt: Option<String>,
        /// Input text (default: stdin)
        #[arg(long, conflicts_with = "clipboard")]
        text: Option<String>,
        /// Take the input from the clipboard
        #[arg(long)]
        clipboard: bool,
        /// File whose content the result replaces (reply profile)
        #[arg(long)]
        into: Option<String>,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Tray icon with hotkey and menu
    #[cfg(windows)]
    Tray,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Id of the default prompt
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        verbose: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PromptsAction {
    List,
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    List,
    /// Health-check models; without names, a random sample of all models
    Test {
        models: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_SAMPLE)]
        count: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    List,
    Clear {
        /// Skip the confirmation question
        #[arg(long)]
        yes: bool,
    },
}

/// Long-lived components shared by every surface.
#[derive(Clone)]
pub struct App {
    pub paths: AppPaths,
    pub dispatcher: Dispatcher,
    pub client: CompletionClient,
    pub history: HistoryLog,
}

impl App {
    /// Must be called inside a tokio runtime: the history writer is spawned on it.
    pub fn build(profile: Profile, paths: AppPaths, api_base: &str, overrides: Overrides) -> Self {
        let settings = SettingsProvider::new(Arc::new(JsonFileStore::new(paths.settings_file())), &profile)
            .with_overrides(overrides);
        match settings.initialize() {
            Ok(0) => {}
            Ok(n) => tracing::info!("{} default settings written to {}", n, paths.settings_file().display()),
            Err(e) => warn!("Error setting initial defaults: {}", e),
        }
        let history = HistoryLog::spawn(Arc::new(JsonFileStore::new(paths.history_file())));
        let client = CompletionClient::new(api_base).with_system_prompt(&profile.system_prompt);
        let dispatcher = Dispatcher::new(profile, settings, client.clone(), Some(history.clone()));
        Self { paths, dispatcher, client, history }
    }

    pub fn settings(&self) -> &SettingsProvider {
        self.dispatcher.settings()
    }

    fn api_key(&self) -> Result<String> {
        self.settings()
            .load()
            .api_key
            .ok_or_else(|| anyhow!("API Key not set. Please configure it in settings."))
    }
}

pub async fn execute(app: &App, command: Command) -> Result<ExitCode> {
    match command {
        Command::Run { prompt, text, clipboard, into } => run(app, prompt, text, clipboard, into).await,
        Command::Settings { action } => settings(app, action).map(|_| ExitCode::SUCCESS),
        Command::Prompts { action } => prompts(app, action).map(|_| ExitCode::SUCCESS),
        Command::Models { action } => models(app, action).await.map(|_| ExitCode::SUCCESS),
        Command::History { action } => history(app, action).await.map(|_| ExitCode::SUCCESS),
        #[cfg(windows)]
        Command::Tray => bail!("the tray runs on the main thread"),
    }
}

async fn run(
    app: &App,
    prompt: Option<String>,
    text: Option<String>,
    clipboard: bool,
    into: Option<String>,
) -> Result<ExitCode> {
    let selection = match (text, clipboard) {
        (Some(text), _) => text,
        (None, true) => desktop::read_clipboard_string().context("Failed to read clipboard.")?,
        (None, false) => {
            let mut buf = String::new();
            if !io::stdin().is_terminal() {
                io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            }
            buf
        }
    };

    let trigger = Trigger { selection, prompt_id: prompt, target: into };
    // Failures have already been reported through the page.
    match app.dispatcher.dispatch(trigger, Some(&DesktopPage)).await {
        Ok(Outcome::Delivered { text, .. }) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Outcome::Skipped) => {
            notify(Some(&DesktopPage), Level::Info, "No text selected; nothing to do.");
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn settings(app: &App, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let s = app.settings().load();
            let key = match s.api_key.as_deref() {
                Some(k) if k.is_ascii() && k.len() > 8 => format!("{}...{}", &k[..4], &k[k.len() - 4..]),
                Some(_) => "(set)".to_string(),
                None => "(not set)".to_string(),
            };
            println!("file:        {}", app.paths.settings_file().display());
            println!("api key:     {key}");
            println!("model:       {}", s.selected_model);
            println!(
                "prompt:      {}",
                s.selected_prompt().map(|p| format!("{} ({})", p.name, p.id)).unwrap_or_else(|| "(none)".into())
            );
            println!("temperature: {}", s.temperature);
            println!("timeout:     {}s", s.timeout_secs);
            println!("verbose:     {}", s.verbose_logging);
        }
        SettingsAction::Set { api_key, model, prompt, temperature, timeout, verbose } => {
            let mut s = app.settings().load_stored();
            if let Some(key) = api_key {
                let key = key.trim();
                s.api_key = (!key.is_empty()).then(|| key.to_string());
            }
            if let Some(model) = model {
                s.selected_model = model.trim().to_string();
            }
            if let Some(prompt) = prompt {
                s.selected_prompt_id = Some(prompt);
            }
            if let Some(t) = temperature {
                s.temperature = t;
            }
            if let Some(t) = timeout {
                s.timeout_secs = t;
            }
            if let Some(v) = verbose {
                s.verbose_logging = v;
            }
            app.settings().save(&s)?;
            println!("Settings saved.");
        }
    }
    Ok(())
}

fn prompts(app: &App, action: PromptsAction) -> Result<()> {
    match action {
        PromptsAction::List => {
            let s = app.settings().load();
            if s.prompts.is_empty() {
                println!("(No prompts configured)");
            }
            for p in &s.prompts {
                let mark = if s.selected_prompt_id.as_deref() == Some(p.id.as_str()) { '*' } else { ' ' };
                println!("{mark} {:>12}  {}", p.id, p.name);
            }
        }
        PromptsAction::Edit { id, name, text } => {
            let mut s = app.settings().load_stored();
            if !s.prompts.iter().any(|p| p.id == id) {
                bail!(SettingsError::UnknownPrompt(id));
            }
            if let Some(name) = name {
                s.rename_prompt(&id, &name);
            }
            if let Some(text) = text {
                s.set_prompt_text(&id, &text);
            }
            app.settings().save(&s)?;
            println!("Prompt {id} saved.");
        }
    }
    Ok(())
}

async fn models(app: &App, action: ModelsAction) -> Result<()> {
    let api_key = app.api_key()?;
    match action {
        ModelsAction::List => {
            for model in app.client.list_models(&api_key).await? {
                println!("{model}");
            }
        }
        ModelsAction::Test { models, count } => {
            let (models, sample) = if models.is_empty() {
                (app.client.list_models(&api_key).await?, count)
            } else {
                let n = models.len();
                (models, n)
            };
            let report = bench::run(&app.client, &api_key, &models, sample).await;
            for r in &report.results {
                match &r.error {
                    None => println!("ok    {:>7.2}s  {}", r.elapsed.as_secs_f64(), r.model),
                    Some(e) => println!("FAIL  {:>7.2}s  {}  ({e})", r.elapsed.as_secs_f64(), r.model),
                }
            }
            match report.average() {
                Some(avg) => println!(
                    "{}/{} succeeded, average {:.2}s",
                    report.successes(),
                    report.results.len(),
                    avg.as_secs_f64()
                ),
                None => println!("0/{} succeeded", report.results.len()),
            }
        }
    }
    Ok(())
}

async fn history(app: &App, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List => {
            let entries = app.history.list().await?;
            if entries.is_empty() {
                println!("No history found.");
            }
            for entry in &entries {
                println!("{}\n", history::describe(entry));
            }
        }
        HistoryAction::Clear { yes } => {
            let cleared = app.history.clear(|| yes || confirm("Clear all history?")).await?;
            println!("{}", if cleared { "History cleared." } else { "Cancelled." });
        }
    }
    Ok(())
}

fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}
