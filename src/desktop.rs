//! The local desktop as a [`Page`]: system clipboard, files or the result
//! window as editable targets, and native alerts.

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::sink::{EditableKind, Page, TargetState};

/// Target name of the result window.
pub const OUTPUT_TARGET: &str = "output";

pub struct DesktopPage;

impl Page for DesktopPage {
    fn write_clipboard(&self, text: &str) -> Result<(), String> {
        write_clipboard_string(text)
    }

    fn target(&self, target: &str) -> TargetState {
        if target == OUTPUT_TARGET && cfg!(windows) {
            return TargetState::Editable(EditableKind::RichText);
        }
        match fs::metadata(Path::new(target)) {
            Ok(meta) if meta.is_file() && !meta.permissions().readonly() => {
                TargetState::Editable(EditableKind::PlainText)
            }
            Ok(_) => TargetState::ReadOnly,
            Err(_) => TargetState::Missing,
        }
    }

    fn replace_content(&self, target: &str, kind: EditableKind, text: &str) -> Result<(), String> {
        match kind {
            EditableKind::RichText => {
                show_output(text);
                Ok(())
            }
            EditableKind::PlainText => fs::write(target, text).map_err(|e| e.to_string()),
        }
    }

    fn focus(&self, target: &str) {
        debug!(element = target, "focus requested");
    }

    fn alert(&self, message: &str) {
        show_alert(message);
    }
}

#[cfg(windows)]
fn show_output(text: &str) {
    crate::ui::show_output_text(text.to_string());
}

#[cfg(not(windows))]
fn show_output(text: &str) {
    println!("{text}");
}

pub fn read_clipboard_string() -> Option<String> {
    #[cfg(windows)]
    {
        clipboard_win::get_clipboard_string().ok()
    }
    #[cfg(not(windows))]
    {
        arboard::Clipboard::new().and_then(|mut c| c.get_text()).ok()
    }
}

pub fn write_clipboard_string(s: &str) -> Result<(), String> {
    #[cfg(windows)]
    {
        clipboard_win::set_clipboard_string(s).map_err(|e| e.to_string())
    }
    #[cfg(not(windows))]
    {
        // On X11 the selection is served by this process, so it lasts only
        // while the process does.
        arboard::Clipboard::new()
            .and_then(|mut c| c.set_text(s))
            .map_err(|e| e.to_string())
    }
}

#[cfg(windows)]
pub fn toast(title: &str, body: &str) {
    let _ = winrt_notification::Toast::new(winrt_notification::Toast::POWERSHELL_APP_ID)
        .title(title)
        .text1(body)
        .show();
}

#[cfg(windows)]
pub(crate) fn show_message_box(title: &str, text: &str) {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging as wm;
    fn wide(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
    }
    unsafe {
        let _ = wm::MessageBoxW(
            HWND(std::ptr::null_mut()),
            windows::core::PCWSTR(wide(text).as_ptr()),
            windows::core::PCWSTR(wide(title).as_ptr()),
            wm::MB_OK | wm::MB_TOPMOST | wm::MB_SETFOREGROUND,
        );
    }
}

/// The first line is the title, the rest the body.
#[cfg(windows)]
fn show_alert(message: &str) {
    let (title, body) = message.split_once('\n').unwrap_or((crate::config::APP_TITLE, message));
    toast(title, body);
}

#[cfg(not(windows))]
fn show_alert(message: &str) {
    eprintln!("{message}");
}
