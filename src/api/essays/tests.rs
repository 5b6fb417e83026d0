use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::test_support::{self, StubScoringBackend, TestContext};

const ESSAY: &str = "The cat sat on the mat and wrote an essay about it.";

async fn submit(ctx: &TestContext, learner_id: &str, essay_text: &str) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/essays/{learner_id}/submit"),
            Some(json!({ "essay_text": essay_text })),
        ))
        .await
        .expect("submit");

    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn init(ctx: &TestContext, learner_id: &str) -> (StatusCode, Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/essays/{learner_id}"),
            None,
        ))
        .await
        .expect("init");

    let status = response.status();
    (status, test_support::read_json(response).await)
}

#[tokio::test]
async fn init_returns_widget_defaults_for_new_learner() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;

    let (status, body) = init(&ctx, "learner-1").await;

    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["mode"], "practice");
    assert_eq!(body["min_words"], 150);
    assert_eq!(body["max_words"], 250);
    assert_eq!(body["max_chars"], 1500);
    assert_eq!(body["max_attempts"], 3);
    assert_eq!(body["attempts_used"], 0);
    assert_eq!(body["show_score_in_exam"], true);
    assert_eq!(body["has_previous_result"], false);
    assert!(body["prompt_html"]
        .as_str()
        .is_some_and(|prompt| prompt.starts_with("<p><strong>Sample essay prompt:</strong>")));
    assert!(body.get("last_result").is_none());
}

#[tokio::test]
async fn init_serves_configured_prompt_unescaped() {
    let ctx = test_support::setup_test_context_with_env(
        StubScoringBackend::new(vec![]),
        &[("ESSAY_PROMPT_HTML", "<p>Cities or <em>countryside</em>?</p>")],
    )
    .await;

    let (status, body) = init(&ctx, "learner-1").await;

    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["prompt_html"], "<p>Cities or <em>countryside</em>?</p>");
}

#[tokio::test]
async fn successful_submit_consumes_attempt_and_echoes_context() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;

    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mode"], "practice");
    assert_eq!(body["attempts_used"], 1);
    assert_eq!(body["max_attempts"], 3);
    assert_eq!(body["show_score_in_exam"], true);

    let requests = ctx.scoring.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].meta.user_id, "learner-1");
    assert_eq!(requests[0].essay.attempt_index, 1);
    assert_eq!(requests[0].essay.word_count, 12);

    let record = ctx.state.ledger().snapshot("learner-1");
    assert_eq!(record.attempts_used, 1);
    assert_eq!(record.last_essay_text.as_deref(), Some(ESSAY));
    let grade = record.last_grade.expect("grade");
    assert!((grade.value - 0.7).abs() < 1e-9);
    assert_eq!(grade.max_value, 1.0);

    let (_, body) = init(&ctx, "learner-1").await;
    assert_eq!(body["attempts_used"], 1);
    assert_eq!(body["has_previous_result"], true);
    assert_eq!(body["last_essay_text"], ESSAY);
    assert_eq!(body["last_result"]["attempts_used"], 1);
    assert!(body["last_graded_at"].is_string());
}

#[tokio::test]
async fn empty_essay_is_rejected_without_scoring() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;

    let (status, body) = submit(&ctx, "learner-1", "  \n\t ").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["status_code"], 422);
    assert_eq!(body["error"]["code"], "EMPTY_ESSAY");
    assert_eq!(body["attempts_used"], 0);
    assert!(ctx.scoring.requests().is_empty());
}

#[tokio::test]
async fn unreadable_body_gets_widget_error_shape() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/essays/learner-1/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{essay_text: oops"))
        .expect("request");

    let response = ctx.app.clone().oneshot(request).await.expect("submit");
    let status = response.status();
    let body = test_support::read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["status"], "error");
    assert_eq!(body["status_code"], 400);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    assert_eq!(body["mode"], "practice");
    assert_eq!(body["attempts_used"], 0);
    assert_eq!(body["max_attempts"], 3);
    assert!(ctx.scoring.requests().is_empty());
}

#[tokio::test]
async fn exhausted_attempts_are_refused() {
    let ctx = test_support::setup_test_context_with_env(
        StubScoringBackend::new(vec![]),
        &[("MAX_ATTEMPTS", "1")],
    )
    .await;

    let (status, _) = submit(&ctx, "learner-1", ESSAY).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "MAX_ATTEMPTS_REACHED");
    assert_eq!(body["error"]["details"]["attempts_used"], 1);
    assert_eq!(body["error"]["details"]["max_attempts"], 1);
    assert_eq!(ctx.scoring.requests().len(), 1);
}

#[tokio::test]
async fn exhausted_attempts_win_over_empty_text() {
    let ctx = test_support::setup_test_context_with_env(
        StubScoringBackend::new(vec![]),
        &[("MAX_ATTEMPTS", "1")],
    )
    .await;
    submit(&ctx, "learner-1", ESSAY).await;

    let (status, body) = submit(&ctx, "learner-1", "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "MAX_ATTEMPTS_REACHED");
}

#[tokio::test]
async fn backend_error_does_not_consume_attempt() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![json!({
        "status": "error",
        "status_code": 503,
        "error": {"code": "BACKEND_UNAVAILABLE", "message": "Try later."}
    })]))
    .await;

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "BACKEND_UNAVAILABLE");
    assert_eq!(body["mode"], "practice");
    assert_eq!(body["attempts_used"], 0);
    assert_eq!(body["max_attempts"], 3);
    assert_eq!(ctx.state.ledger().snapshot("learner-1").attempts_used, 0);

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempts_used"], 1);
}

#[tokio::test]
async fn error_without_usable_status_code_maps_to_bad_gateway() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![
        json!({"status": "error", "error": {"code": "X"}}),
        json!("not an object"),
    ]))
    .await;

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "X");

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "INVALID_BACKEND_RESPONSE");
}

#[tokio::test]
async fn concurrent_submit_for_same_learner_conflicts() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;
    let reservation = ctx.state.ledger().reserve("learner-1").expect("reserve");

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "SUBMISSION_IN_PROGRESS");
    assert!(ctx.scoring.requests().is_empty());

    let (status, _) = submit(&ctx, "learner-2", ESSAY).await;
    assert_eq!(status, StatusCode::OK);

    drop(reservation);
    let (status, _) = submit(&ctx, "learner-1", ESSAY).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_learner_id_is_bad_request() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;

    let (status, body) = submit(&ctx, "bad%20id", ESSAY).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn exam_mode_is_reported_to_backend_and_widget() {
    let ctx = test_support::setup_test_context_with_env(
        StubScoringBackend::new(vec![]),
        &[("ESSAY_MODE", "exam"), ("SHOW_SCORE_IN_EXAM", "0")],
    )
    .await;

    let (status, body) = submit(&ctx, "learner-1", ESSAY).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "exam");
    assert_eq!(body["show_score_in_exam"], false);
    assert_eq!(ctx.scoring.requests()[0].meta.mode, crate::schemas::essay::Mode::Exam);
}

#[tokio::test]
async fn render_returns_presented_html() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/essays/render",
            Some(json!({
                "essay_text": "The cat sat.",
                "result": test_support::scored_body(82.0),
            })),
        ))
        .await
        .expect("render");

    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["mode"], "practice");
    let html = body["html"].as_str().expect("html");
    assert!(html.contains("Score: 82 / 100"));
    assert!(html.contains("class=\"essay-issue error-grammar\""));
    assert!(html.contains("Agreement"));
}

#[tokio::test]
async fn render_in_exam_mode_hides_feedback() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;
    let mut result = test_support::scored_body(82.0);
    result["mode"] = json!("exam");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/essays/render",
            Some(json!({"essay_text": "The cat sat.", "result": result, "show_score_in_exam": false})),
        ))
        .await
        .expect("render");

    let body = test_support::read_json(response).await;
    assert_eq!(body["mode"], "exam");
    let html = body["html"].as_str().expect("html");
    assert!(!html.contains("Score"));
    assert!(!html.contains("essay-issue"));
}

#[tokio::test]
async fn render_rejects_error_results() {
    let ctx = test_support::setup_test_context(StubScoringBackend::new(vec![])).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/essays/render",
            Some(json!({"essay_text": "x", "result": {"status": "error", "error": {}}})),
        ))
        .await
        .expect("render");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
