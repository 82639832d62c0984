//! The assistant window: last result, settings editor and history.

use eframe::egui;
use egui_phosphor::regular as icons;
use once_cell::sync::Lazy;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::cli::App;
use crate::client::HealthCheck;
use crate::config::APP_TITLE;
use crate::desktop::{show_message_box, write_clipboard_string};
use crate::history::{describe, HistoryEntry};
use crate::settings::Settings;

enum UiCommand {
    Output(String),
    Settings,
    Show,
}

enum UiEvent {
    Models(Result<Vec<String>, String>),
    Health(String, HealthCheck),
    History(Result<Vec<HistoryEntry>, String>),
    Cleared(Result<bool, String>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tab {
    Output,
    Settings,
    History,
}

static UI_SENDER: Lazy<Mutex<Option<Sender<UiCommand>>>> = Lazy::new(|| Mutex::new(None));
static WINDOW_VISIBLE: AtomicBool = AtomicBool::new(false);

fn send(cmd: UiCommand) -> bool {
    match UI_SENDER.lock() {
        Ok(guard) => guard.as_ref().is_some_and(|tx| tx.send(cmd).is_ok()),
        Err(_) => false,
    }
}

pub fn show_output_text(text: String) {
    let hidden = !WINDOW_VISIBLE.load(Ordering::Relaxed);
    if !send(UiCommand::Output(text.clone())) || hidden {
        // Window not up yet or hidden: make sure the result is seen.
        std::thread::spawn(move || show_message_box(APP_TITLE, &text));
    }
}

pub fn show_settings() {
    send(UiCommand::Settings);
}

pub fn show_window() {
    send(UiCommand::Show);
}

struct AssistApp {
    app: App,
    handle: Handle,
    refresh_tx: Sender<()>,
    commands: Receiver<UiCommand>,
    events_tx: Sender<UiEvent>,
    events: Receiver<UiEvent>,
    tab: Tab,
    output: String,
    draft: Settings,
    api_key_input: String,
    editing: Option<String>,
    prompt_name: String,
    prompt_text: String,
    models: Vec<String>,
    history: Vec<HistoryEntry>,
    confirm_clear: bool,
    status: String,
    need_show: bool,
}

impl AssistApp {
    fn new(app: App, handle: Handle, refresh_tx: Sender<()>, commands: Receiver<UiCommand>) -> Self {
        let (events_tx, events) = mpsc::channel();
        let draft = app.settings().load_stored();
        let mut this = Self {
            app,
            handle,
            refresh_tx,
            commands,
            events_tx,
            events,
            tab: Tab::Output,
            output: String::new(),
            api_key_input: String::new(),
            draft,
            editing: None,
            prompt_name: String::new(),
            prompt_text: String::new(),
            models: Vec::new(),
            history: Vec::new(),
            confirm_clear: false,
            status: String::new(),
            need_show: true,
        };
        this.reload_settings();
        if this.draft.api_key.is_none() {
            this.tab = Tab::Settings;
        }
        this
    }

    fn reload_settings(&mut self) {
        self.draft = self.app.settings().load_stored();
        self.api_key_input = self.draft.api_key.clone().unwrap_or_default();
        let first = self.draft.selected_prompt_id.clone();
        self.edit_prompt(first);
        self.status.clear();
    }

    fn edit_prompt(&mut self, id: Option<String>) {
        let found = id.as_deref().and_then(|id| self.draft.prompts.iter().find(|p| p.id == id));
        self.prompt_name = found.map(|p| p.name.clone()).unwrap_or_default();
        self.prompt_text = found.map(|p| p.text.clone()).unwrap_or_default();
        self.editing = found.map(|p| p.id.clone());
    }

    /// Fold the prompt editor back into the draft.
    fn apply_prompt_edit(&mut self) {
        if let Some(id) = self.editing.clone() {
            self.draft.rename_prompt(&id, &self.prompt_name);
            self.draft.set_prompt_text(&id, &self.prompt_text);
        }
    }

    fn save(&mut self) {
        self.apply_prompt_edit();
        let key = self.api_key_input.trim();
        self.draft.api_key = (!key.is_empty()).then(|| key.to_string());
        self.draft.selected_model = self.draft.selected_model.trim().to_string();
        match self.app.settings().save(&self.draft) {
            Ok(()) => {
                self.status = "Settings saved.".into();
                let _ = self.refresh_tx.send(());
            }
            Err(e) => {
                warn!("{}", e);
                self.status = e.to_string();
            }
        }
    }

    fn key_for_requests(&self) -> Option<String> {
        let typed = self.api_key_input.trim();
        if typed.is_empty() {
            self.app.settings().load().api_key
        } else {
            Some(typed.to_string())
        }
    }

    fn fetch_models(&mut self) {
        let Some(key) = self.key_for_requests() else {
            self.status = "Enter API key first".into();
            return;
        };
        self.status = "Loading models...".into();
        let (client, tx) = (self.app.client.clone(), self.events_tx.clone());
        self.handle.spawn(async move {
            let r = client.list_models(&key).await.map_err(|e| e.to_string());
            let _ = tx.send(UiEvent::Models(r));
        });
    }

    fn test_model(&mut self) {
        let Some(key) = self.key_for_requests() else {
            self.status = "Enter API key first".into();
            return;
        };
        let model = self.draft.selected_model.trim().to_string();
        self.status = format!("Testing {model}...");
        let (client, tx) = (self.app.client.clone(), self.events_tx.clone());
        self.handle.spawn(async move {
            let check = client.test_completion(&model, &key).await;
            let _ = tx.send(UiEvent::Health(model, check));
        });
    }

    fn refresh_history(&mut self) {
        let (history, tx) = (self.app.history.clone(), self.events_tx.clone());
        self.handle.spawn(async move {
            let r = history.list().await.map_err(|e| e.to_string());
            let _ = tx.send(UiEvent::History(r));
        });
    }

    fn clear_history(&mut self) {
        self.confirm_clear = false;
        let (history, tx) = (self.app.history.clone(), self.events_tx.clone());
        self.handle.spawn(async move {
            // Confirmed in the window already.
            let r = history.clear(|| true).await.map_err(|e| e.to_string());
            let _ = tx.send(UiEvent::Cleared(r));
        });
    }

    fn drain(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                UiCommand::Output(text) => {
                    self.output = text;
                    self.tab = Tab::Output;
                }
                UiCommand::Settings => {
                    self.reload_settings();
                    self.tab = Tab::Settings;
                }
                UiCommand::Show => {}
            }
            self.need_show = true;
        }
        while let Ok(event) = self.events.try_recv() {
            match event {
                UiEvent::Models(Ok(models)) => {
                    self.status = format!("{} models loaded.", models.len());
                    self.models = models;
                }
                UiEvent::Models(Err(e)) => self.status = format!("Error loading models: {e}"),
                UiEvent::Health(model, check) => {
                    self.status = match check.error {
                        None => format!("{model} responded."),
                        Some(e) => format!("{model} failed: {e}"),
                    }
                }
                UiEvent::History(Ok(entries)) => self.history = entries,
                UiEvent::History(Err(e)) => self.status = format!("Error loading history: {e}"),
                UiEvent::Cleared(Ok(_)) => {
                    self.history.clear();
                    self.status = "History cleared.".into();
                }
                UiEvent::Cleared(Err(e)) => self.status = format!("Error clearing history: {e}"),
            }
        }
    }

    fn output_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button(format!("{} Copy", icons::COPY)).clicked() {
                if let Err(e) = write_clipboard_string(&self.output) {
                    self.status = format!("Failed to copy to clipboard: {e}");
                }
            }
        });
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            ui.add(egui::TextEdit::multiline(&mut self.output).desired_rows(20).desired_width(f32::INFINITY));
        });
    }

    fn settings_tab(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new("settings").num_columns(2).spacing([12.0, 8.0]).show(ui, |ui| {
            ui.label("OpenRouter API key");
            ui.add(egui::TextEdit::singleline(&mut self.api_key_input).password(true).desired_width(320.0));
            ui.end_row();

            ui.label("Model");
            ui.horizontal(|ui| {
                ui.add(egui::TextEdit::singleline(&mut self.draft.selected_model).desired_width(320.0));
                if !self.models.is_empty() {
                    egui::ComboBox::from_id_source("models").selected_text("Choose").show_ui(ui, |ui| {
                        for m in &self.models {
                            ui.selectable_value(&mut self.draft.selected_model, m.clone(), m.as_str());
                        }
                    });
                }
            });
            ui.end_row();

            ui.label("Default prompt");
            let selected = self.draft.selected_prompt().map(|p| p.name.clone()).unwrap_or_default();
            egui::ComboBox::from_id_source("selected_prompt").selected_text(selected).show_ui(ui, |ui| {
                for p in &self.draft.prompts {
                    ui.selectable_value(&mut self.draft.selected_prompt_id, Some(p.id.clone()), p.name.as_str());
                }
            });
            ui.end_row();

            ui.label("Temperature");
            ui.add(egui::Slider::new(&mut self.draft.temperature, 0.0..=2.0).step_by(0.1));
            ui.end_row();

            ui.label("Timeout");
            ui.add(egui::DragValue::new(&mut self.draft.timeout_secs).clamp_range(1..=600).suffix(" s"));
            ui.end_row();

            ui.label("Verbose logging");
            ui.checkbox(&mut self.draft.verbose_logging, "Log requests and responses");
            ui.end_row();
        });

        ui.separator();
        let before = self.editing.clone();
        let mut chosen = before.clone();
        let label = self.prompt_name.clone();
        egui::ComboBox::from_label("Edit prompt").selected_text(label).show_ui(ui, |ui| {
            for p in &self.draft.prompts {
                ui.selectable_value(&mut chosen, Some(p.id.clone()), p.name.as_str());
            }
        });
        if chosen != before {
            self.apply_prompt_edit();
            self.edit_prompt(chosen);
        }
        if self.editing.is_some() {
            ui.add(egui::TextEdit::singleline(&mut self.prompt_name).hint_text("Name"));
            ui.add(
                egui::TextEdit::multiline(&mut self.prompt_text)
                    .desired_rows(4)
                    .desired_width(f32::INFINITY),
            );
            ui.small("The selected text replaces %TEXT%.");
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button(format!("{} Save", icons::FLOPPY_DISK)).clicked() {
                self.save();
            }
            if ui.button(format!("{} Load models", icons::ARROWS_CLOCKWISE)).clicked() {
                self.fetch_models();
            }
            if ui.button(format!("{} Test model", icons::PLAY)).clicked() {
                self.test_model();
            }
        });
    }

    fn history_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button(format!("{} Refresh", icons::ARROWS_CLOCKWISE)).clicked() {
                self.refresh_history();
            }
            if self.confirm_clear {
                ui.label("Clear all history?");
                if ui.button("Yes").clicked() {
                    self.clear_history();
                }
                if ui.button("No").clicked() {
                    self.confirm_clear = false;
                }
            } else if ui.button(format!("{} Clear", icons::TRASH)).clicked() {
                self.confirm_clear = true;
            }
        });
        egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
            if self.history.is_empty() {
                ui.label("No history found.");
            }
            for entry in &self.history {
                ui.group(|ui| {
                    ui.set_width(ui.available_width());
                    ui.label(describe(entry));
                });
            }
        });
    }
}

fn setup_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();
    egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
    let candidates = [
        r"C:\Windows\Fonts\msyh.ttc",
        r"C:\Windows\Fonts\msyh.ttf",
        r"C:\Windows\Fonts\simsun.ttc",
    ];
    match candidates.iter().find_map(|path| fs::read(path).ok().map(|b| (path, b))) {
        Some((path, bytes)) => {
            info!("Loaded CJK font: {}", path);
            fonts.font_data.insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
            fonts.families.entry(egui::FontFamily::Proportional).or_default().push("cjk".to_owned());
            fonts.families.entry(egui::FontFamily::Monospace).or_default().push("cjk".to_owned());
        }
        None => info!("No CJK font found; text may render as squares"),
    }
    ctx.set_fonts(fonts);
}

impl eframe::App for AssistApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Wake up periodically so the channels are polled without user input
        ctx.request_repaint_after(Duration::from_millis(120));
        self.drain();

        if ctx.input(|i| i.viewport().close_requested()) {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
            WINDOW_VISIBLE.store(false, Ordering::Relaxed);
        }
        if self.need_show {
            self.need_show = false;
            ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
            ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
            WINDOW_VISIBLE.store(true, Ordering::Relaxed);
        }

        egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.tab, Tab::Output, format!("{} Result", icons::ARTICLE));
                ui.selectable_value(&mut self.tab, Tab::Settings, format!("{} Settings", icons::GEAR));
                if ui
                    .selectable_value(&mut self.tab, Tab::History, format!("{} History", icons::CLOCK_COUNTER_CLOCKWISE))
                    .clicked()
                {
                    self.refresh_history();
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Hide").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
                        WINDOW_VISIBLE.store(false, Ordering::Relaxed);
                    }
                });
            });
        });
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(self.status.as_str());
        });
        egui::CentralPanel::default().show(ctx, |ui| match self.tab {
            Tab::Output => self.output_tab(ui),
            Tab::Settings => self.settings_tab(ui),
            Tab::History => self.history_tab(ui),
        });
    }
}

/// Run the window's event loop on the main thread (blocking).
pub fn run(app: App, handle: Handle, refresh_tx: Sender<()>) {
    let (tx, rx) = mpsc::channel();
    if let Ok(mut guard) = UI_SENDER.lock() {
        *guard = Some(tx);
    }

    info!("Main UI: starting event loop");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([800.0, 560.0])
            .with_visible(true),
        ..Default::default()
    };
    let result = eframe::run_native(
        APP_TITLE,
        native_options,
        Box::new(move |cc| {
            setup_fonts(&cc.egui_ctx);
            Box::new(AssistApp::new(app, handle, refresh_tx, rx))
        }),
    );
    match result {
        Ok(()) => info!("Main UI: event loop exited"),
        Err(e) => warn!("Main UI error: {}", e),
    }
}
