use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::controller::counters::{char_count, word_count};
use crate::core::config::Settings;
use crate::schemas::essay::Mode;

pub(crate) const API_VERSION: &str = "1.0";
pub(crate) const TASK_TYPE: &str = "argumentative";

pub(crate) const BACKEND_URL_NOT_CONFIGURED: &str = "BACKEND_URL_NOT_CONFIGURED";
pub(crate) const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";
pub(crate) const BACKEND_TIMEOUT: &str = "BACKEND_TIMEOUT";
pub(crate) const INVALID_BACKEND_RESPONSE: &str = "INVALID_BACKEND_RESPONSE";

const PREVIEW_CHARS: usize = 300;
const DETAIL_CHARS: usize = 500;

const RUBRIC: &[(&str, &str)] = &[
    ("grammar", "Grammar"),
    ("vocabulary", "Vocabulary"),
    ("coherence", "Coherence & Cohesion"),
    ("task_response", "Task Response"),
];

/// Body sent to the scoring backend: `{meta, config, prompt, essay}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ScoringRequest {
    pub(crate) meta: RequestMeta,
    pub(crate) config: RequestConfig,
    pub(crate) prompt: RequestPrompt,
    pub(crate) essay: RequestEssay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RequestMeta {
    pub(crate) api_version: &'static str,
    pub(crate) request_id: Uuid,
    pub(crate) widget_id: String,
    pub(crate) course_id: String,
    pub(crate) user_id: String,
    pub(crate) mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RequestConfig {
    pub(crate) language: String,
    pub(crate) limits: RequestLimits,
    pub(crate) scoring: ScoringScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct RequestLimits {
    pub(crate) min_words: u32,
    pub(crate) max_words: u32,
    pub(crate) max_chars: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ScoringScale {
    pub(crate) scale_min: u32,
    pub(crate) scale_max: u32,
    pub(crate) normalize: bool,
    pub(crate) categories: Vec<RubricCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RubricCategory {
    pub(crate) id: &'static str,
    pub(crate) label: &'static str,
    pub(crate) weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RequestPrompt {
    pub(crate) instructions: String,
    pub(crate) task_type: &'static str,
    pub(crate) topic_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RequestEssay {
    pub(crate) text: String,
    pub(crate) word_count: usize,
    pub(crate) char_count: usize,
    pub(crate) attempt_index: u32,
    pub(crate) max_attempts: u32,
}

impl ScoringRequest {
    pub(crate) fn build(
        settings: &Settings,
        learner_id: &str,
        essay_text: &str,
        attempt_index: u32,
    ) -> Self {
        let scoring = settings.scoring();
        let widget = settings.widget();
        let weight = 1.0 / RUBRIC.len() as f64;

        Self {
            meta: RequestMeta {
                api_version: API_VERSION,
                request_id: Uuid::new_v4(),
                widget_id: scoring.widget_id.clone(),
                course_id: scoring.course_id.clone(),
                user_id: learner_id.to_string(),
                mode: widget.mode,
            },
            config: RequestConfig {
                language: scoring.language.clone(),
                limits: RequestLimits {
                    min_words: widget.min_words,
                    max_words: widget.max_words,
                    max_chars: widget.max_chars,
                },
                scoring: ScoringScale {
                    scale_min: 0,
                    scale_max: 100,
                    normalize: true,
                    categories: RUBRIC
                        .iter()
                        .map(|&(id, label)| RubricCategory { id, label, weight })
                        .collect(),
                },
            },
            prompt: RequestPrompt {
                instructions: scoring.instructions.clone(),
                task_type: TASK_TYPE,
                topic_id: scoring.topic_id.clone(),
            },
            essay: RequestEssay {
                text: essay_text.to_string(),
                word_count: word_count(essay_text),
                char_count: char_count(essay_text),
                attempt_index,
                max_attempts: widget.max_attempts,
            },
        }
    }

    pub(crate) fn request_id(&self) -> Uuid {
        self.meta.request_id
    }
}

/// Sends a scoring request and returns the backend body.
///
/// Never fails: transport problems come back as `{status: "error", status_code, error}`
/// bodies so the caller can hand them to the widget unchanged.
#[async_trait]
pub(crate) trait ScoringBackend: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Value;

    fn is_configured(&self) -> bool;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpScoringBackend {
    client: Client,
    url: String,
}

impl HttpScoringBackend {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.scoring().api_url.clone(),
            Duration::from_secs(settings.scoring().timeout_seconds),
        )
    }

    pub(crate) fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, url: url.into().trim().to_string() })
    }
}

#[async_trait]
impl ScoringBackend for HttpScoringBackend {
    async fn score(&self, request: &ScoringRequest) -> Value {
        let request_id = request.request_id();

        if self.url.is_empty() {
            tracing::error!(request_id = %request_id, "Scoring backend URL is not configured");
            return error_body(
                500,
                BACKEND_URL_NOT_CONFIGURED,
                "Scoring service URL is not configured.",
                request_id,
                json!({}),
            );
        }

        tracing::info!(url = %self.url, request_id = %request_id, "Calling scoring backend");

        let timer = Instant::now();
        let sent = self.client.post(&self.url).json(request).send().await;
        let response = match sent {
            Ok(response) => response,
            Err(err) => return self.transport_error(err, request_id, timer),
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return self.transport_error(err, request_id, timer),
        };
        record_duration(timer, "response");

        tracing::info!(
            url = %self.url,
            request_id = %request_id,
            status_code = status,
            text_preview = %preview(&text, PREVIEW_CHARS),
            "Scoring backend HTTP response"
        );

        let mut data = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(data)) => data,
            _ => {
                tracing::error!(
                    url = %self.url,
                    request_id = %request_id,
                    status_code = status,
                    text_preview = %preview(&text, PREVIEW_CHARS),
                    "Scoring backend returned a non-JSON body"
                );
                return error_body(
                    status,
                    INVALID_BACKEND_RESPONSE,
                    "Scoring service returned an invalid response.",
                    request_id,
                    json!({"text": preview(&text, DETAIL_CHARS), "url": self.url}),
                );
            }
        };

        normalize_http_error(&mut data, status);

        tracing::info!(
            url = %self.url,
            request_id = %request_id,
            status = data.get("status").and_then(serde_json::Value::as_str).unwrap_or("-"),
            status_code = data.get("status_code").and_then(serde_json::Value::as_u64).unwrap_or(u64::from(status)),
            error_code = data
                .get("error")
                .and_then(|error| error.get("code"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("-"),
            "Scoring backend JSON parsed"
        );

        Value::Object(data)
    }

    fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }
}

impl HttpScoringBackend {
    fn transport_error(&self, err: reqwest::Error, request_id: Uuid, timer: Instant) -> Value {
        if err.is_timeout() {
            record_duration(timer, "timeout");
            tracing::warn!(url = %self.url, request_id = %request_id, "Scoring backend timed out");
            return error_body(
                504,
                BACKEND_TIMEOUT,
                "Scoring service took too long to respond. Please try again later.",
                request_id,
                json!({"url": self.url}),
            );
        }

        record_duration(timer, "unavailable");
        tracing::error!(
            url = %self.url,
            request_id = %request_id,
            error = %err,
            "Network error calling scoring backend"
        );
        error_body(
            503,
            BACKEND_UNAVAILABLE,
            "Scoring service is currently unavailable. Please try again later.",
            request_id,
            json!({"exception": err.to_string(), "url": self.url}),
        )
    }
}

/// Every call is timed, including the ones that never produced a body.
fn record_duration(timer: Instant, outcome: &'static str) {
    metrics::histogram!("scoring_backend_duration_seconds", "outcome" => outcome)
        .record(timer.elapsed().as_secs_f64());
}

/// HTTP errors always surface as `status: "error"`; an explicit `status_code` survives.
fn normalize_http_error(data: &mut Map<String, Value>, status: u16) {
    if status < 400 || data.get("status").and_then(Value::as_str) == Some("error") {
        return;
    }
    data.insert("status".to_string(), Value::from("error"));
    data.entry("status_code").or_insert(Value::from(status));
}

pub(crate) fn error_body(
    status_code: u16,
    code: &str,
    message: &str,
    request_id: Uuid,
    details: Value,
) -> Value {
    json!({
        "status": "error",
        "status_code": status_code,
        "request_id": request_id,
        "error": {"code": code, "message": message, "details": details},
    })
}

fn preview(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
