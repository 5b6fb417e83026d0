use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, state::AppState};
use crate::services::scoring_backend::{ScoringBackend, ScoringRequest};

/// Variables the tests may set; cleared before each test so defaults apply.
const RESET_VARS: &[&str] = &[
    "SCORING_API_URL",
    "SCORING_TIMEOUT_SECONDS",
    "ESSAY_MODE",
    "MIN_WORDS",
    "MAX_WORDS",
    "MAX_CHARS",
    "MAX_ATTEMPTS",
    "SHOW_SCORE_IN_EXAM",
    "ESSAY_PROMPT_HTML",
    "GRADE_WEIGHT",
    "API_V1_STR",
    "BACKEND_CORS_ORIGINS",
];

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) scoring: Arc<StubScoringBackend>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("ESSAY_ENV", "test");
    std::env::set_var("ESSAY_STRICT_CONFIG", "0");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    for key in RESET_VARS {
        std::env::remove_var(key);
    }
}

/// Scoring backend that answers from a script and records what it was sent.
/// Once the script runs out it answers with [`scored_body`].
#[derive(Default)]
pub(crate) struct StubScoringBackend {
    replies: StdMutex<VecDeque<Value>>,
    requests: StdMutex<Vec<ScoringRequest>>,
    configured: bool,
}

impl StubScoringBackend {
    pub(crate) fn new(replies: Vec<Value>) -> Self {
        Self { replies: StdMutex::new(replies.into()), configured: true, ..Default::default() }
    }

    pub(crate) fn unconfigured() -> Self {
        Self::default()
    }

    pub(crate) fn requests(&self) -> Vec<ScoringRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ScoringBackend for StubScoringBackend {
    async fn score(&self, request: &ScoringRequest) -> Value {
        self.requests.lock().expect("requests lock").push(request.clone());
        self.replies.lock().expect("replies lock").pop_front().unwrap_or_else(|| scored_body(70.0))
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

pub(crate) async fn setup_test_context(scoring: StubScoringBackend) -> TestContext {
    setup_test_context_with_env(scoring, &[]).await
}

pub(crate) async fn setup_test_context_with_env(
    scoring: StubScoringBackend,
    vars: &[(&str, &str)],
) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let settings = Settings::load().expect("settings");
    let scoring = Arc::new(scoring);
    let state = AppState::new(settings, scoring.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, scoring, _guard: guard }
}

/// A successful scoring body on a 0-100 scale.
pub(crate) fn scored_body(raw: f64) -> Value {
    json!({
        "status": "ok",
        "score": {"raw": raw, "scale_min": 0, "scale_max": 100},
        "categories": [{"id": "grammar", "label": "Grammar", "raw": raw, "comment": "Fine"}],
        "feedback": {"summary": "Good work.", "strengths": ["Clear"], "improvements": []},
        "annotations": {
            "spans": [{"start": 4, "end": 7, "type": "grammar", "message": "Agreement"}],
            "legend": {"grammar": {"label": "Grammar"}}
        }
    })
}

pub(crate) fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
