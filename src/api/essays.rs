use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};

use crate::api::errors::ApiError;
use crate::api::validation::validate_learner_id;
use crate::controller::failure::{
    EMPTY_ESSAY, EMPTY_ESSAY_MESSAGE, MAX_ATTEMPTS_MESSAGE, MAX_ATTEMPTS_REACHED,
};
use crate::core::state::AppState;
use crate::core::time::format_offset;
use crate::feedback::presenter::FeedbackPresenter;
use crate::schemas::essay::{ingest, EssayPayload, Mode, SubmissionResponse, STATUS_OK};
use crate::schemas::widget::{EssayInitResponse, RenderRequest, RenderResponse};
use crate::services::grading::{self, Grade};
use crate::services::scoring_backend::{ScoringRequest, INVALID_BACKEND_RESPONSE};

pub(crate) const SUBMISSION_IN_PROGRESS: &str = "SUBMISSION_IN_PROGRESS";
pub(crate) const INVALID_REQUEST: &str = "INVALID_REQUEST";
const IN_PROGRESS_MESSAGE: &str = "Your essay is already being scored. Please wait.";
const INVALID_REQUEST_MESSAGE: &str = "Your essay could not be read. Please try again.";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/render", post(render_feedback))
        .route("/:learner_id", get(init_widget))
        .route("/:learner_id/submit", post(submit_essay))
}

/// Mode and attempt counters echoed on every submit answer.
#[derive(Debug, Clone, Copy)]
struct SessionContext {
    mode: Mode,
    attempts_used: u32,
    max_attempts: u32,
}

impl SessionContext {
    fn fill_missing(&self, body: &mut Map<String, Value>) {
        body.entry("mode").or_insert(json!(self.mode));
        body.entry("attempts_used").or_insert(json!(self.attempts_used));
        body.entry("max_attempts").or_insert(json!(self.max_attempts));
    }

    fn overwrite(&self, body: &mut Map<String, Value>) {
        body.insert("mode".to_string(), json!(self.mode));
        body.insert("attempts_used".to_string(), json!(self.attempts_used));
        body.insert("max_attempts".to_string(), json!(self.max_attempts));
    }

    fn error(&self, status: StatusCode, code: &str, message: &str, details: Value) -> Response {
        let mut body = Map::new();
        body.insert("status".to_string(), json!("error"));
        body.insert("status_code".to_string(), json!(status.as_u16()));
        body.insert(
            "error".to_string(),
            json!({"code": code, "message": message, "details": details}),
        );
        self.overwrite(&mut body);
        (status, Json(Value::Object(body))).into_response()
    }
}

pub(crate) async fn init_widget(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
) -> Result<Json<EssayInitResponse>, ApiError> {
    validate_learner_id(&learner_id)?;

    let record = state.ledger().snapshot(&learner_id);
    let config =
        state.settings().widget_config(record.attempts_used, record.last_result.is_some());

    Ok(Json(EssayInitResponse {
        config,
        prompt_html: state.settings().widget().prompt_html.clone(),
        last_result: record.last_result,
        last_essay_text: record.last_essay_text,
        last_graded_at: record.last_graded_at.map(format_offset),
    }))
}

pub(crate) async fn submit_essay(
    State(state): State<AppState>,
    Path(learner_id): Path<String>,
    payload: Result<Json<EssayPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    validate_learner_id(&learner_id)?;

    let widget = state.settings().widget();
    let mut context = SessionContext {
        mode: widget.mode,
        attempts_used: 0,
        max_attempts: widget.max_attempts,
    };

    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            let reason = rejection.body_text();
            tracing::warn!(learner_id = %learner_id, reason = %reason, "Essay submission body rejected");
            record_outcome("rejected");
            context.attempts_used = state.ledger().snapshot(&learner_id).attempts_used;
            return Ok(context.error(
                rejection.status(),
                INVALID_REQUEST,
                INVALID_REQUEST_MESSAGE,
                json!({"reason": reason}),
            ));
        }
    };

    let reservation = match state.ledger().reserve(&learner_id) {
        Ok(reservation) => reservation,
        Err(err) => {
            tracing::warn!(learner_id = %learner_id, error = %err, "Concurrent essay submission refused");
            record_outcome("conflict");
            context.attempts_used = state.ledger().snapshot(&learner_id).attempts_used;
            return Ok(context.error(
                StatusCode::CONFLICT,
                SUBMISSION_IN_PROGRESS,
                IN_PROGRESS_MESSAGE,
                json!({}),
            ));
        }
    };
    context.attempts_used = reservation.attempts_used();

    if context.attempts_used >= context.max_attempts {
        tracing::info!(
            learner_id = %learner_id,
            attempts_used = context.attempts_used,
            max_attempts = context.max_attempts,
            "Essay submission refused: attempts exhausted"
        );
        record_outcome("rejected");
        return Ok(context.error(
            StatusCode::FORBIDDEN,
            MAX_ATTEMPTS_REACHED,
            MAX_ATTEMPTS_MESSAGE,
            json!({"attempts_used": context.attempts_used, "max_attempts": context.max_attempts}),
        ));
    }

    if payload.essay_text.trim().is_empty() {
        record_outcome("rejected");
        return Ok(context.error(
            StatusCode::UNPROCESSABLE_ENTITY,
            EMPTY_ESSAY,
            EMPTY_ESSAY_MESSAGE,
            json!({}),
        ));
    }

    let request = ScoringRequest::build(
        state.settings(),
        &learner_id,
        &payload.essay_text,
        context.attempts_used + 1,
    );
    let request_id = request.request_id();
    let mut body = into_object(state.scoring().score(&request).await, request_id);

    if body.get("status").and_then(Value::as_str) != Some(STATUS_OK) {
        context.fill_missing(&mut body);
        let status = error_status(&body);
        tracing::warn!(
            learner_id = %learner_id,
            request_id = %request_id,
            status_code = status.as_u16(),
            error_code = body
                .get("error")
                .and_then(|error| error.get("code"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("-"),
            "Essay scoring failed; attempt not consumed"
        );
        record_outcome("backend_error");
        return Ok((status, Json(Value::Object(body))).into_response());
    }

    let score = match ingest(Value::Object(body.clone())) {
        SubmissionResponse::Success(result) => result.score,
        SubmissionResponse::Failure(_) | SubmissionResponse::Malformed => None,
    };
    let grade = Grade::compute(score.as_ref(), state.settings().scoring().grade_weight);

    context.attempts_used += 1;
    context.overwrite(&mut body);
    body.insert("show_score_in_exam".to_string(), json!(widget.show_score_in_exam));

    let attempts_used = reservation.commit(&payload.essay_text, Value::Object(body.clone()), grade);
    grading::publish(&learner_id, grade);
    record_outcome("scored");

    tracing::info!(
        learner_id = %learner_id,
        request_id = %request_id,
        attempts_used,
        max_attempts = context.max_attempts,
        "Essay scored"
    );

    Ok((StatusCode::OK, Json(Value::Object(body))).into_response())
}

pub(crate) async fn render_feedback(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, ApiError> {
    let SubmissionResponse::Success(result) = ingest(request.result) else {
        return Err(ApiError::UnprocessableEntity(
            "Result is not a successful submission".to_string(),
        ));
    };

    let widget = state.settings().widget();
    let show_score_in_exam = request
        .show_score_in_exam
        .or(result.show_score_in_exam)
        .unwrap_or(widget.show_score_in_exam);
    let view =
        FeedbackPresenter::new(widget.mode).present(&result, &request.essay_text, show_score_in_exam);

    Ok(Json(RenderResponse { mode: view.mode, html: view.to_html() }))
}

fn into_object(value: Value, request_id: uuid::Uuid) -> Map<String, Value> {
    match value {
        Value::Object(body) => body,
        other => {
            tracing::error!(request_id = %request_id, body = %other, "Scoring backend body is not an object");
            let mut body = Map::new();
            body.insert("status".to_string(), json!("error"));
            body.insert("status_code".to_string(), json!(StatusCode::BAD_GATEWAY.as_u16()));
            body.insert(
                "error".to_string(),
                json!({
                    "code": INVALID_BACKEND_RESPONSE,
                    "message": "Scoring service returned an invalid response.",
                    "details": {},
                }),
            );
            body
        }
    }
}

/// HTTP status for an error body: its `status_code` when that is an error code, else 502.
fn error_status(body: &Map<String, Value>) -> StatusCode {
    body.get("status_code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .filter(|code| (400..=599).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!("essay_submissions_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests;
