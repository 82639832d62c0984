//! Tray icon, Alt+F3 hotkey and the worker that turns their clicks into
//! dispatches.

use anyhow::Result;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem, Submenu};
use tray_icon::{ClickType, Icon, TrayIcon, TrayIconBuilder, TrayIconEvent};

use crate::cli::App;
use crate::config::APP_TITLE;
use crate::desktop::{self, DesktopPage, OUTPUT_TARGET};
use crate::dispatcher::Trigger;
use crate::settings::{Settings, SettingsProvider};
use crate::sink::{notify, Level};
use crate::ui;

const PROMPT_PREFIX: &str = "prompt:";
const SETTINGS_ID: &str = "settings";
const QUIT_ID: &str = "quit";

#[derive(Clone, Debug)]
pub enum Action {
    /// Run the clipboard text through a prompt; `None` is the selected one.
    Generate { prompt_id: Option<String> },
    OpenSettings,
    ShowWindow,
    Quit,
}

fn action_for(id: &str) -> Option<Action> {
    match id {
        SETTINGS_ID => Some(Action::OpenSettings),
        QUIT_ID => Some(Action::Quit),
        _ => id
            .strip_prefix(PROMPT_PREFIX)
            .map(|p| Action::Generate { prompt_id: Some(p.to_string()) }),
    }
}

/// One item per prompt under a parent entry, like the page context menu.
fn build_menu(settings: &Settings) -> Result<Menu> {
    let generate = Submenu::new(format!("{APP_TITLE}: Generate"), true);
    if settings.prompts.is_empty() {
        generate.append(&MenuItem::new("(No prompts configured)", false, None))?;
    }
    for p in &settings.prompts {
        generate.append(&MenuItem::with_id(format!("{PROMPT_PREFIX}{}", p.id), &p.name, true, None))?;
    }
    let menu = Menu::new();
    menu.append_items(&[
        &generate,
        &MenuItem::with_id(SETTINGS_ID, "Settings...", true, None),
        &PredefinedMenuItem::separator(),
        &MenuItem::with_id(QUIT_ID, "Quit", true, None),
    ])?;
    Ok(menu)
}

fn icon() -> Result<Icon> {
    // 16x16 teal dot
    let (w, h) = (16usize, 16usize);
    let rgba = [0x14, 0xB8, 0xA6, 0xFF].repeat(w * h);
    Ok(Icon::from_rgba(rgba, w as u32, h as u32)?)
}

struct TrayHandle {
    tray: TrayIcon,
    settings: SettingsProvider,
    action_tx: Sender<Action>,
}

impl TrayHandle {
    fn new(settings: SettingsProvider, action_tx: Sender<Action>) -> Result<Self> {
        let tray = TrayIconBuilder::new()
            .with_tooltip(APP_TITLE)
            .with_menu(Box::new(build_menu(&settings.load())?))
            .with_icon(icon()?)
            .build()?;
        Ok(Self { tray, settings, action_tx })
    }

    /// Rebuild the prompt entries after settings were saved.
    fn rebuild(&self) {
        match build_menu(&self.settings.load()) {
            Ok(menu) => {
                self.tray.set_menu(Some(Box::new(menu)));
                info!("Tray menu rebuilt");
            }
            Err(e) => error!("Tray menu rebuild failed: {}", e),
        }
    }

    fn pump(&self) {
        while let Ok(event) = MenuEvent::receiver().try_recv() {
            if let Some(action) = action_for(&event.id.0) {
                info!(?action, "tray menu clicked");
                let _ = self.action_tx.send(action);
            }
        }
        while let Ok(event) = TrayIconEvent::receiver().try_recv() {
            if matches!(event.click_type, ClickType::Left | ClickType::Double) {
                let _ = self.action_tx.send(Action::ShowWindow);
            }
        }
    }
}

/// Tray icon and its message pump on a dedicated thread; non-Send handles
/// stay there.
pub fn spawn_tray(settings: SettingsProvider, action_tx: Sender<Action>, refresh_rx: Receiver<()>) {
    thread::spawn(move || {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging as wm;

        let tray = match TrayHandle::new(settings, action_tx) {
            Ok(tray) => tray,
            Err(e) => {
                error!("Tray failed: {}", e);
                desktop::toast(APP_TITLE, &format!("Tray failed: {e}"));
                return;
            }
        };
        info!("Tray created");
        loop {
            unsafe {
                let mut msg = wm::MSG::default();
                while wm::PeekMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0, wm::PM_REMOVE).into() {
                    let _ = wm::TranslateMessage(&msg);
                    wm::DispatchMessageW(&msg);
                }
            }
            if refresh_rx.try_recv().is_ok() {
                tray.rebuild();
            }
            tray.pump();
            thread::sleep(Duration::from_millis(25));
        }
    });
}

pub const HOTKEY_ID: i32 = 1;

/// Alt+F3 generates with the selected prompt.
pub fn spawn_hotkey_listener(tx: Sender<Action>) {
    thread::spawn(move || unsafe {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::Input::KeyboardAndMouse as km;
        use windows::Win32::UI::WindowsAndMessaging as wm;

        let modifiers = km::HOT_KEY_MODIFIERS(km::MOD_ALT.0);
        if km::RegisterHotKey(HWND(std::ptr::null_mut()), HOTKEY_ID, modifiers, km::VK_F3.0 as u32).is_err() {
            warn!("RegisterHotKey Alt+F3 failed");
            desktop::toast(APP_TITLE, "Failed to register Alt+F3 hotkey (in use?)");
        } else {
            info!("RegisterHotKey Alt+F3 OK");
        }
        loop {
            let mut msg = wm::MSG::default();
            let got = wm::GetMessageW(&mut msg, HWND(std::ptr::null_mut()), 0, 0);
            if got.0 == -1 {
                error!("GetMessageW returned -1, leaving hotkey loop");
                break;
            }
            if msg.message == wm::WM_HOTKEY {
                let _ = tx.send(Action::Generate { prompt_id: None });
            }
            let _ = wm::TranslateMessage(&msg);
            wm::DispatchMessageW(&msg);
        }
        let _ = km::UnregisterHotKey(HWND(std::ptr::null_mut()), HOTKEY_ID);
    });
}

/// Handle tray and hotkey actions. Each generation runs as its own task, so
/// a slow request never holds up the next trigger.
pub fn spawn_worker(rt: Runtime, app: App, rx: Receiver<Action>) {
    thread::spawn(move || {
        while let Ok(action) = rx.recv() {
            match action {
                Action::Generate { prompt_id } => {
                    let Some(selection) = desktop::read_clipboard_string() else {
                        notify(Some(&DesktopPage), Level::Error, "Failed to read clipboard.");
                        continue;
                    };
                    let trigger = Trigger { selection, prompt_id, target: Some(OUTPUT_TARGET.to_string()) };
                    let dispatcher = app.dispatcher.clone();
                    rt.spawn(async move {
                        let _ = dispatcher.dispatch(trigger, Some(&DesktopPage)).await;
                    });
                }
                Action::OpenSettings => ui::show_settings(),
                Action::ShowWindow => ui::show_window(),
                Action::Quit => {
                    info!("Quit action received");
                    std::process::exit(0);
                }
            }
        }
    });
}
