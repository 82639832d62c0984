use super::*;
use crate::sink::testing::RecordingPage;
use crate::sink::{EditableKind, TargetState};
use crate::store::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

struct Rig {
    dispatcher: Dispatcher,
    history: HistoryLog,
    _server: MockServer,
}

async fn rig(profile: Profile, stored: serde_json::Value, reply: ResponseTemplate) -> Rig {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/chat/completions"))
        .respond_with(reply)
        .mount(&server)
        .await;
    let settings = SettingsProvider::new(Arc::new(MemoryStore::with(stored)), &profile);
    let history = HistoryLog::spawn(Arc::new(MemoryStore::default()));
    let client = CompletionClient::new(&server.uri()).with_system_prompt(&profile.system_prompt);
    let dispatcher = Dispatcher::new(profile, settings, client, Some(history.clone()));
    Rig { dispatcher, history, _server: server }
}

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "choices": [{ "message": { "content": content } }] }))
}

fn configured() -> serde_json::Value {
    json!({ "openRouterApiKey": "sk-or-test", "selectedModel": "openai/gpt-4o-mini" })
}

fn trigger(text: &str, prompt: Option<&str>) -> Trigger {
    Trigger { selection: text.into(), prompt_id: prompt.map(str::to_string), target: None }
}

#[tokio::test]
async fn success_logs_history_copies_and_notifies() {
    let rig = rig(Profile::assistant(), configured(), reply(" A rebuttal. ")).await;
    let page = RecordingPage::default();

    let out = rig.dispatcher.dispatch(trigger("Taxes are theft.", Some("8")), Some(&page)).await.unwrap();
    assert!(matches!(out, Outcome::Delivered { ref text, via: Delivered::Copied, .. } if text == "A rebuttal."));
    assert_eq!(page.clipboard.lock().unwrap().as_deref(), Some("A rebuttal."));
    assert_eq!(page.alerts(), vec!["Smart Browser Assistant\nSuccess: Result copied to clipboard!".to_string()]);

    let history = rig.history.list().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].model, "openai/gpt-4o-mini");
    assert_eq!(history[0].input, "Taxes are theft.");
    assert_eq!(history[0].output, "A rebuttal.");
    assert!(history[0].duration_secs.is_some());
}

#[tokio::test]
async fn request_carries_resolved_prompt() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::body_partial_json(json!({
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Proofread the following text for grammar, spelling, and clarity:\n\n\"teh cat\"" }
            ]
        })))
        .respond_with(reply("the cat"))
        .expect(1)
        .mount(&server)
        .await;
    let profile = Profile::assistant();
    let settings = SettingsProvider::new(Arc::new(MemoryStore::with(configured())), &profile);
    let dispatcher = Dispatcher::new(profile, settings, CompletionClient::new(&server.uri()), None);

    let page = RecordingPage::default();
    dispatcher.dispatch(trigger("teh cat", Some("2")), Some(&page)).await.unwrap();
}

#[tokio::test]
async fn missing_api_key_aborts_before_request() {
    let rig = rig(Profile::assistant(), json!({}), reply("unused")).await;
    let page = RecordingPage::default();
    let err = rig.dispatcher.dispatch(trigger("text", None), Some(&page)).await.unwrap_err();
    assert!(matches!(err, AssistError::Config(_)));
    assert_eq!(
        page.alerts(),
        vec!["Smart Browser Assistant\nError: API Key not set. Please configure it in settings.".to_string()]
    );
    assert!(rig.history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_prompt_is_reported() {
    let rig = rig(Profile::assistant(), configured(), reply("unused")).await;
    let page = RecordingPage::default();
    let err = rig.dispatcher.dispatch(trigger("text", Some("42")), Some(&page)).await.unwrap_err();
    assert_eq!(err, AssistError::Config("Clicked prompt (ID: 42) not found.".into()));
}

#[tokio::test]
async fn timeout_writes_no_history() {
    let mut stored = configured();
    stored["timeout"] = json!(5);
    let rig = rig(
        Profile::assistant(),
        stored,
        reply("late").set_delay(std::time::Duration::from_secs(7)),
    )
    .await;
    let page = RecordingPage::default();
    let err = rig.dispatcher.dispatch(trigger("text", None), Some(&page)).await.unwrap_err();
    assert_eq!(err, AssistError::Timeout { seconds: 5 });
    assert_eq!(
        page.alerts(),
        vec!["Smart Browser Assistant\nError: API request timed out after 5 seconds.".to_string()]
    );
    assert!(rig.history.list().await.unwrap().is_empty());
    assert!(page.clipboard.lock().unwrap().is_none());
}

#[tokio::test]
async fn api_error_writes_no_history() {
    let rig = rig(
        Profile::assistant(),
        configured(),
        ResponseTemplate::new(401).set_body_json(json!({ "error": { "message": "bad key" } })),
    )
    .await;
    let page = RecordingPage::default();
    let err = rig.dispatcher.dispatch(trigger("text", None), Some(&page)).await.unwrap_err();
    assert_eq!(err, AssistError::Api { status: 401, message: "bad key".into() });
    assert_eq!(page.alerts(), vec!["Smart Browser Assistant\nError: API Call Failed: API Error 401: bad key".to_string()]);
    assert!(rig.history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_selection_is_skipped_silently() {
    let rig = rig(Profile::assistant(), configured(), reply("unused")).await;
    let page = RecordingPage::default();
    let out = rig.dispatcher.dispatch(trigger("   ", None), Some(&page)).await.unwrap();
    assert_eq!(out, Outcome::Skipped);
    assert!(page.alerts().is_empty());
}

#[tokio::test]
async fn editable_profile_inserts_and_skips_history() {
    let rig = rig(Profile::reply(), configured(), reply("Thanks, agreed!")).await;
    let page = RecordingPage::default().with_target("compose", TargetState::Editable(EditableKind::PlainText));
    let t = Trigger { selection: "Great post".into(), prompt_id: Some("reply".into()), target: Some("compose".into()) };

    let out = rig.dispatcher.dispatch(t, Some(&page)).await.unwrap();
    assert!(matches!(out, Outcome::Delivered { via: Delivered::Inserted, .. }));
    assert_eq!(page.content("compose").as_deref(), Some("Thanks, agreed!"));
    assert!(rig.history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn clipboard_failure_keeps_history_entry() {
    let rig = rig(Profile::assistant(), configured(), reply("ok")).await;
    let page = RecordingPage { clipboard_error: Some("denied".into()), ..Default::default() };
    let err = rig.dispatcher.dispatch(trigger("text", None), Some(&page)).await.unwrap_err();
    assert_eq!(err, AssistError::Clipboard("denied".into()));
    assert_eq!(rig.history.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_triggers_all_complete() {
    let rig = rig(Profile::assistant(), configured(), reply("same")).await;
    let page = Arc::new(RecordingPage::default());
    let mut tasks = Vec::new();
    for n in 0..5 {
        let dispatcher = rig.dispatcher.clone();
        let page = page.clone();
        tasks.push(tokio::spawn(async move {
            dispatcher.dispatch(trigger(&format!("text {n}"), None), Some(&*page)).await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    assert_eq!(rig.history.list().await.unwrap().len(), 5);
    assert_eq!(page.alerts().len(), 5);
}

#[test]
fn stages_render_for_logs() {
    assert_eq!(Stage::Requesting.to_string(), "requesting");
    assert_eq!(Stage::Idle.to_string(), "idle");
}
