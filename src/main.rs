#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

mod bench;
mod cli;
mod client;
mod config;
mod desktop;
mod dispatcher;
mod error;
mod history;
mod logger;
mod prompt;
mod settings;
mod sink;
mod store;
#[cfg(windows)]
mod tray;
#[cfg(windows)]
mod ui;

use cli::{App, Cli};
use config::{AppPaths, Overrides, Profile};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let dir = cli.data_dir.clone().unwrap_or_else(AppPaths::exe_dir);
    logger::init(&dir);

    match start(cli, dir) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn start(cli: Cli, dir: std::path::PathBuf) -> Result<ExitCode> {
    // Validated by clap's value parser.
    let profile = Profile::by_name(&cli.profile).context("unknown profile")?;
    let paths = AppPaths::new(dir, &profile);
    info!(profile = profile.name, dir = %paths.dir().display(), "starting");

    let rt = tokio::runtime::Runtime::new().context("tokio runtime")?;
    let app = {
        let _guard = rt.enter();
        App::build(profile, paths, &cli.api_base, Overrides::from_env())
    };

    match cli.command {
        #[cfg(windows)]
        None | Some(cli::Command::Tray) => {
            run_tray(rt, app);
            Ok(ExitCode::SUCCESS)
        }
        #[cfg(not(windows))]
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
        Some(command) => {
            #[cfg(windows)]
            attach_console();
            rt.block_on(cli::execute(&app, command))
        }
    }
}

/// GUI-subsystem builds have no console; borrow the parent's so CLI output shows.
#[cfg(windows)]
fn attach_console() {
    use windows::Win32::System::Console::{AttachConsole, ATTACH_PARENT_PROCESS};
    unsafe {
        let _ = AttachConsole(ATTACH_PARENT_PROCESS);
    }
}

#[cfg(windows)]
fn run_tray(rt: tokio::runtime::Runtime, app: App) {
    use std::sync::mpsc;

    let (action_tx, action_rx) = mpsc::channel::<tray::Action>();
    let (refresh_tx, refresh_rx) = mpsc::channel::<()>();

    tray::spawn_hotkey_listener(action_tx.clone());
    tray::spawn_tray(app.settings().clone(), action_tx, refresh_rx);

    if app.settings().load().api_key.is_none() {
        desktop::toast(config::APP_TITLE, "API Key not set. Please configure it in settings.");
    } else {
        desktop::toast(config::APP_TITLE, "Ready. Press Alt+F3 to run the clipboard through the selected prompt.");
    }

    let handle = rt.handle().clone();
    tray::spawn_worker(rt, app.clone(), action_rx);

    // The window's event loop owns the main thread.
    ui::run(app, handle, refresh_tx);
}
