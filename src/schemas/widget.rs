use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schemas::essay::{Mode, WidgetConfig};

/// Widget initialization arguments plus the learner's last graded attempt, if any.
#[derive(Debug, Serialize)]
pub(crate) struct EssayInitResponse {
    #[serde(flatten)]
    pub(crate) config: WidgetConfig,
    pub(crate) prompt_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_essay_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) last_graded_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RenderRequest {
    #[serde(default)]
    pub(crate) essay_text: String,
    pub(crate) result: Value,
    #[serde(default)]
    pub(crate) show_score_in_exam: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RenderResponse {
    pub(crate) mode: Mode,
    pub(crate) html: String,
}
