//! Delivery of generated text and user notification.

use tracing::{info, warn};

use crate::config::APP_TITLE;
use crate::error::AssistError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableKind {
    /// Single or multi line plain text box.
    PlainText,
    /// Rich editing region.
    RichText,
}

/// What a page knows about a delivery target right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Missing,
    ReadOnly,
    Editable(EditableKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Clipboard,
    Editable { target: String },
}

/// The surface a trigger came from. Results and alerts go back to it.
pub trait Page: Send + Sync {
    fn write_clipboard(&self, text: &str) -> Result<(), String>;

    fn target(&self, target: &str) -> TargetState;

    fn replace_content(&self, target: &str, kind: EditableKind, text: &str) -> Result<(), String>;

    fn focus(&self, target: &str);

    /// Blocking-free, user-visible message.
    fn alert(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Info => "",
            Level::Success => "Success: ",
            Level::Error => "Error: ",
        }
    }
}

pub fn notify(page: Option<&dyn Page>, level: Level, message: &str) {
    let line = format!("{}{}", level.prefix(), message);
    info!("Notification: {}", line);
    match page {
        Some(page) => page.alert(&format!("{APP_TITLE}\n{line}")),
        None => warn!("Cannot show alert, no page context available."),
    }
}

/// How a result reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    Copied,
    Inserted,
    /// The target had gone away; the text was shown instead.
    Shown,
}

impl Delivered {
    pub fn message(self) -> &'static str {
        match self {
            Delivered::Copied => "Result copied to clipboard!",
            Delivered::Inserted => "Result inserted.",
            Delivered::Shown => "Target field is gone; result shown instead.",
        }
    }
}

pub struct ResultSink;

impl ResultSink {
    pub fn deliver(
        text: &str,
        destination: &Destination,
        page: Option<&dyn Page>,
    ) -> Result<Delivered, AssistError> {
        let page = page.ok_or_else(|| AssistError::Delivery("no page context to deliver to".into()))?;
        match destination {
            Destination::Clipboard => {
                page.write_clipboard(text).map_err(AssistError::Clipboard)?;
                info!("Clipboard write accepted");
                Ok(Delivered::Copied)
            }
            Destination::Editable { target } => match page.target(target) {
                TargetState::Editable(kind) => {
                    page.replace_content(target, kind, text).map_err(AssistError::Delivery)?;
                    page.focus(target);
                    info!(element = %target, ?kind, "Result inserted");
                    Ok(Delivered::Inserted)
                }
                TargetState::Missing => {
                    warn!(element = %target, "target gone, presenting result directly");
                    page.alert(&format!("{APP_TITLE}\n{text}"));
                    Ok(Delivered::Shown)
                }
                TargetState::ReadOnly => {
                    Err(AssistError::Delivery(format!("target \"{target}\" is not editable")))
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Page double that records every side effect.
    #[derive(Default)]
    pub struct RecordingPage {
        pub clipboard: Mutex<Option<String>>,
        pub clipboard_error: Option<String>,
        pub targets: Mutex<HashMap<String, (TargetState, String)>>,
        pub focused: Mutex<Option<String>>,
        pub alerts: Mutex<Vec<String>>,
    }

    impl RecordingPage {
        pub fn with_target(self, name: &str, state: TargetState) -> Self {
            self.targets.lock().unwrap().insert(name.into(), (state, String::new()));
            self
        }

        pub fn content(&self, name: &str) -> Option<String> {
            self.targets.lock().unwrap().get(name).map(|(_, c)| c.clone())
        }

        pub fn alerts(&self) -> Vec<String> {
            self.alerts.lock().unwrap().clone()
        }
    }

    impl Page for RecordingPage {
        fn write_clipboard(&self, text: &str) -> Result<(), String> {
            if let Some(e) = &self.clipboard_error {
                return Err(e.clone());
            }
            *self.clipboard.lock().unwrap() = Some(text.to_string());
            Ok(())
        }

        fn target(&self, target: &str) -> TargetState {
            self.targets.lock().unwrap().get(target).map(|(s, _)| *s).unwrap_or(TargetState::Missing)
        }

        fn replace_content(&self, target: &str, _kind: EditableKind, text: &str) -> Result<(), String> {
            match self.targets.lock().unwrap().get_mut(target) {
                Some((_, content)) => {
                    *content = text.to_string();
                    Ok(())
                }
                None => Err("gone".into()),
            }
        }

        fn focus(&self, target: &str) {
            *self.focused.lock().unwrap() = Some(target.to_string());
        }

        fn alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingPage;
    use super::*;

    #[test]
    fn clipboard_delivery() {
        let page = RecordingPage::default();
        let got = ResultSink::deliver("hi", &Destination::Clipboard, Some(&page)).unwrap();
        assert_eq!(got, Delivered::Copied);
        assert_eq!(page.clipboard.lock().unwrap().as_deref(), Some("hi"));
    }

    #[test]
    fn clipboard_rejection_carries_reason() {
        let page = RecordingPage { clipboard_error: Some("Document is not focused.".into()), ..Default::default() };
        let err = ResultSink::deliver("hi", &Destination::Clipboard, Some(&page)).unwrap_err();
        assert_eq!(err, AssistError::Clipboard("Document is not focused.".into()));
        assert_eq!(err.to_string(), "Failed to copy to clipboard: Document is not focused.");
    }

    #[test]
    fn editable_delivery_replaces_and_focuses() {
        let page = RecordingPage::default().with_target("reply-box", TargetState::Editable(EditableKind::RichText));
        let dest = Destination::Editable { target: "reply-box".into() };
        assert_eq!(ResultSink::deliver("drafted", &dest, Some(&page)).unwrap(), Delivered::Inserted);
        assert_eq!(page.content("reply-box").as_deref(), Some("drafted"));
        assert_eq!(page.focused.lock().unwrap().as_deref(), Some("reply-box"));
    }

    #[test]
    fn missing_target_falls_back_to_showing_text() {
        let page = RecordingPage::default();
        let dest = Destination::Editable { target: "gone".into() };
        assert_eq!(ResultSink::deliver("drafted", &dest, Some(&page)).unwrap(), Delivered::Shown);
        assert_eq!(page.alerts(), vec![format!("{APP_TITLE}\ndrafted")]);
    }

    #[test]
    fn read_only_target_is_delivery_error() {
        let page = RecordingPage::default().with_target("label", TargetState::ReadOnly);
        let dest = Destination::Editable { target: "label".into() };
        assert!(matches!(ResultSink::deliver("x", &dest, Some(&page)), Err(AssistError::Delivery(_))));
    }

    #[test]
    fn no_page_context() {
        assert!(matches!(
            ResultSink::deliver("x", &Destination::Clipboard, None),
            Err(AssistError::Delivery(_))
        ));
        notify(None, Level::Error, "only logged");
    }

    #[test]
    fn notification_prefixes() {
        let page = RecordingPage::default();
        notify(Some(&page), Level::Success, "done");
        notify(Some(&page), Level::Error, "broke");
        notify(Some(&page), Level::Info, "fyi");
        assert_eq!(
            page.alerts(),
            vec![
                "Smart Browser Assistant\nSuccess: done".to_string(),
                "Smart Browser Assistant\nError: broke".to_string(),
                "Smart Browser Assistant\nfyi".to_string(),
            ]
        );
    }
}
