use futures_util::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::time::{Duration, Instant};
use tracing::info;

use crate::client::CompletionClient;

pub const DEFAULT_SAMPLE: usize = 10;

#[derive(Debug, Clone)]
pub struct BenchResult {
    pub model: String,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl BenchResult {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BenchReport {
    pub results: Vec<BenchResult>,
}

impl BenchReport {
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.ok()).count()
    }

    /// Mean latency over successful runs.
    pub fn average(&self) -> Option<Duration> {
        let ok: Vec<_> = self.results.iter().filter(|r| r.ok()).map(|r| r.elapsed).collect();
        if ok.is_empty() {
            return None;
        }
        Some(ok.iter().sum::<Duration>() / ok.len() as u32)
    }
}

/// Health-check a random sample of `models`, one at a time so each latency
/// is measured on its own.
pub async fn run(client: &CompletionClient, api_key: &str, models: &[String], sample: usize) -> BenchReport {
    let mut picked: Vec<String> = models.iter().filter(|m| !m.is_empty()).cloned().collect();
    picked.shuffle(&mut rand::thread_rng());
    picked.truncate(sample);
    info!("Testing {} models", picked.len());

    let results = stream::iter(picked)
        .then(|model| async move {
            let started = Instant::now();
            let check = client.test_completion(&model, api_key).await;
            let elapsed = started.elapsed();
            info!(model = %model, ok = check.ok, "tested in {:.2}s", elapsed.as_secs_f64());
            BenchResult { model, elapsed, error: check.error }
        })
        .collect::<Vec<_>>()
        .await;
    BenchReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn samples_at_most_requested_and_averages_successes() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::body_partial_json(serde_json::json!({ "model": "bad/model" })))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                serde_json::json!({ "error": { "message": "No such model" } }),
            ))
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "choices": [{ "message": { "content": "I am a model." } }] }),
            ))
            .mount(&server)
            .await;

        let client = CompletionClient::new(&server.uri());
        let models: Vec<String> = ["a/one", "b/two", "bad/model", ""].iter().map(|s| s.to_string()).collect();

        let report = run(&client, "sk-test", &models, DEFAULT_SAMPLE).await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.successes(), 2);
        assert!(report.average().is_some());
        let bad = report.results.iter().find(|r| r.model == "bad/model").unwrap();
        assert_eq!(bad.error.as_deref(), Some("API Error 404: No such model"));

        let report = run(&client, "sk-test", &models, 1).await;
        assert_eq!(report.results.len(), 1);
    }

    #[test]
    fn average_is_none_without_successes() {
        let report = BenchReport {
            results: vec![BenchResult { model: "m".into(), elapsed: Duration::from_secs(1), error: Some("x".into()) }],
        };
        assert_eq!(report.average(), None);
    }
}
