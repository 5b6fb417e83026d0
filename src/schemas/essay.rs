//! Wire model for essay submissions and the ingestion step that turns loosely shaped
//! scoring responses into typed values.
//!
//! Everything coming back from the scoring side is treated as untrusted: fields that are
//! missing or carry the wrong JSON type are read as absent instead of failing the parse.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

pub const STATUS_OK: &str = "ok";
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Practice,
    Exam,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Practice => "practice",
            Mode::Exam => "exam",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "practice" => Some(Mode::Practice),
            "exam" => Some(Mode::Exam),
            _ => None,
        }
    }
}

/// A character range `[start, end)` flagged by the scoring backend.
///
/// Offsets are kept signed and unclamped; the compositor is responsible for bringing them
/// into range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationSpan {
    pub start: i64,
    pub end: i64,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnnotationSpan {
    pub fn new(start: i64, end: i64, category: impl Into<String>) -> Self {
        Self { start, end, category: category.into(), message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn from_value(value: &Value) -> Option<Self> {
        let start = offset(value.get("start")?)?;
        let end = offset(value.get("end")?)?;
        let category = value.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
        let message = non_empty(value.get("message"));
        Some(Self { start, end, category, message })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl LegendEntry {
    pub fn new(key: impl Into<String>, label: Option<&str>) -> Self {
        Self { key: key.into(), label: label.map(str::to_string) }
    }

    /// The human label, or the raw key when the backend sent none.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }
}

/// Legend keyed by span type, in the order the backend listed it.
pub type Legend = IndexMap<String, LegendEntry>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, deserialize_with = "lenient_spans")]
    pub spans: Vec<AnnotationSpan>,
    #[serde(default, deserialize_with = "lenient_legend")]
    pub legend: Legend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    #[serde(default, deserialize_with = "lenient")]
    pub raw: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub normalized: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub scale_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub scale_max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub raw: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackBody {
    #[serde(default, deserialize_with = "lenient")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub improvements: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model_essay: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_mode")]
    pub mode: Option<Mode>,
    #[serde(default, deserialize_with = "lenient")]
    pub attempts_used: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_attempts: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub show_score_in_exam: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<ScoreSummary>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub categories: Vec<CategoryScore>,
    #[serde(default, deserialize_with = "lenient")]
    pub feedback: Option<FeedbackBody>,
    #[serde(default, deserialize_with = "lenient")]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, deserialize_with = "lenient")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
}

impl ErrorDetail {
    pub fn code(&self) -> &str {
        self.code.as_deref().filter(|code| !code.is_empty()).unwrap_or(UNKNOWN_ERROR)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionError {
    #[serde(default, deserialize_with = "lenient")]
    pub error: ErrorDetail,
    #[serde(default, deserialize_with = "lenient")]
    pub status_code: Option<u16>,
    #[serde(default, deserialize_with = "lenient_mode")]
    pub mode: Option<Mode>,
    #[serde(default, deserialize_with = "lenient")]
    pub attempts_used: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_attempts: Option<u32>,
}

/// A response body after ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResponse {
    Success(SubmissionResult),
    Failure(SubmissionError),
    Malformed,
}

/// The single outbound request of the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssayPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub essay_text: String,
}

impl EssayPayload {
    pub fn new(essay_text: impl Into<String>) -> Self {
        Self { essay_text: essay_text.into() }
    }
}

/// Initialization arguments handed to the widget by its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WidgetConfig {
    #[serde(default, deserialize_with = "lenient_mode_or_default")]
    pub mode: Mode,
    #[serde(default)]
    pub min_words: u32,
    #[serde(default)]
    pub max_words: u32,
    #[serde(default)]
    pub max_chars: u32,
    #[validate(range(min = 1, message = "max_attempts must be at least 1"))]
    pub max_attempts: u32,
    #[serde(default)]
    pub attempts_used: u32,
    #[serde(default)]
    pub show_score_in_exam: bool,
    #[serde(default)]
    pub has_previous_result: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Practice,
            min_words: 0,
            max_words: 0,
            max_chars: 0,
            max_attempts: 1,
            attempts_used: 0,
            show_score_in_exam: false,
            has_previous_result: false,
        }
    }
}

/// Map a raw response body onto the typed model.
///
/// Legacy bodies that carry `annotations.marks` are rewritten to `annotations.spans` first;
/// when both keys are present `spans` wins.
pub fn ingest(mut value: Value) -> SubmissionResponse {
    normalize_annotations(&mut value);

    if !value.is_object() {
        return SubmissionResponse::Malformed;
    }

    if value.get("status").and_then(Value::as_str) == Some(STATUS_OK) {
        return serde_json::from_value(value)
            .map(SubmissionResponse::Success)
            .unwrap_or(SubmissionResponse::Malformed);
    }

    if value.get("error").is_some_and(Value::is_object) {
        return serde_json::from_value(value)
            .map(SubmissionResponse::Failure)
            .unwrap_or(SubmissionResponse::Malformed);
    }

    SubmissionResponse::Malformed
}

fn normalize_annotations(value: &mut Value) {
    let Some(annotations) = value.get_mut("annotations").and_then(Value::as_object_mut) else {
        return;
    };

    if let Some(marks) = annotations.remove("marks") {
        annotations.entry("spans").or_insert(marks);
    }
}

fn offset(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    if value.as_u64().is_some() {
        return Some(i64::MAX);
    }
    value.as_f64().filter(|number| number.is_finite()).map(|number| number.floor() as i64)
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).filter(|text| !text.is_empty()).map(str::to_string)
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items.into_iter().filter_map(|item| serde_json::from_value(item).ok()).collect())
}

fn lenient_mode<'de, D>(deserializer: D) -> Result<Option<Mode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(Mode::parse))
}

fn lenient_mode_or_default<'de, D>(deserializer: D) -> Result<Mode, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_mode(deserializer).map(Option::unwrap_or_default)
}

fn lenient_spans<'de, D>(deserializer: D) -> Result<Vec<AnnotationSpan>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_array()
        .map(|items| items.iter().filter_map(AnnotationSpan::from_value).collect())
        .unwrap_or_default())
}

fn lenient_legend<'de, D>(deserializer: D) -> Result<Legend, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(map) = value else {
        return Ok(Legend::new());
    };

    Ok(map
        .into_iter()
        .map(|(key, entry)| {
            let label = match &entry {
                Value::String(label) if !label.is_empty() => Some(label.clone()),
                Value::Object(fields) => non_empty(fields.get("label")),
                _ => None,
            };
            let entry = LegendEntry { key: key.clone(), label };
            (key, entry)
        })
        .collect())
}
