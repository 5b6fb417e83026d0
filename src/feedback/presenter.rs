use serde::Serialize;

use crate::feedback::compositor::compose;
use crate::feedback::markup::{push_escaped, render, AnnotatedMarkup};
use crate::schemas::essay::{CategoryScore, FeedbackBody, Mode, ScoreSummary, SubmissionResult};

pub(crate) const EXAM_CONFIRMATION: &str =
    "Your essay has been submitted. Detailed feedback is not shown in exam mode.";
pub(crate) const SCORE_AVAILABLE_NOTICE: &str = "Your score is available.";

/// Screen regions the host may be asked to bring into view after a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Feedback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    pub label: String,
    /// Formatted score, blank when the backend sent none.
    pub score: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProseFeedback {
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

/// Everything the feedback region shows for one result. Sections that are `None` or empty
/// are not rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackView {
    pub mode: Mode,
    pub confirmation: Option<String>,
    pub score: Option<String>,
    pub attempts: Option<String>,
    pub categories: Vec<CategoryRow>,
    pub prose: Option<ProseFeedback>,
    pub annotated: Option<AnnotatedMarkup>,
    pub model_essay: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedbackPresenter {
    default_mode: Mode,
}

impl FeedbackPresenter {
    pub fn new(default_mode: Mode) -> Self {
        Self { default_mode }
    }

    /// Decide which sections a result may disclose and build them.
    ///
    /// Exam mode only ever shows a confirmation, the attempt counter and, when
    /// `show_score_in_exam` is set, the score.
    pub fn present(
        &self,
        result: &SubmissionResult,
        original_text: &str,
        show_score_in_exam: bool,
    ) -> FeedbackView {
        let mode = result.mode.unwrap_or(self.default_mode);
        let attempts = attempts_line(result);

        match mode {
            Mode::Exam => FeedbackView {
                mode,
                confirmation: Some(EXAM_CONFIRMATION.to_string()),
                score: if show_score_in_exam { result.score.as_ref().map(score_text) } else { None },
                attempts,
                categories: Vec::new(),
                prose: None,
                annotated: None,
                model_essay: None,
            },
            Mode::Practice => {
                let runs = compose(original_text, &result.annotations.spans);
                let annotated = render(&runs, &result.annotations.legend);

                FeedbackView {
                    mode,
                    confirmation: None,
                    score: result.score.as_ref().map(score_text),
                    attempts,
                    categories: result.categories.iter().map(category_row).collect(),
                    prose: result.feedback.as_ref().and_then(prose_feedback),
                    annotated: Some(annotated),
                    model_essay: result
                        .feedback
                        .as_ref()
                        .and_then(|feedback| feedback.model_essay.as_deref())
                        .map(str::trim)
                        .filter(|essay| !essay.is_empty())
                        .map(str::to_string),
                }
            }
        }
    }
}

/// Score line; `raw` always wins over `normalized`.
pub fn score_text(score: &ScoreSummary) -> String {
    if let Some(raw) = score.raw {
        return match score.scale_max {
            Some(max) => format!("Score: {} / {}", format_number(raw), format_number(max)),
            None => format!("Score: {}", format_number(raw)),
        };
    }

    if let Some(normalized) = score.normalized {
        return format!("Score: {}%", (normalized * 100.0).round() as i64);
    }

    SCORE_AVAILABLE_NOTICE.to_string()
}

/// Whole numbers without a fraction, others with at most two decimals.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }

    let formatted = format!("{value:.2}");
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn attempts_line(result: &SubmissionResult) -> Option<String> {
    let used = result.attempts_used?;
    Some(match result.max_attempts {
        Some(max) => format!("Attempts used: {used} of {max}"),
        None => format!("Attempts used: {used}"),
    })
}

fn category_row(category: &CategoryScore) -> CategoryRow {
    let label = category
        .label
        .as_deref()
        .filter(|label| !label.is_empty())
        .unwrap_or(&category.id)
        .to_string();

    CategoryRow {
        label,
        score: category.raw.map(format_number).unwrap_or_default(),
        comment: category.comment.clone().unwrap_or_default(),
    }
}

fn prose_feedback(feedback: &FeedbackBody) -> Option<ProseFeedback> {
    let summary = feedback
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|summary| !summary.is_empty())
        .map(str::to_string);
    let strengths = non_blank(&feedback.strengths);
    let improvements = non_blank(&feedback.improvements);

    if summary.is_none() && strengths.is_empty() && improvements.is_empty() {
        return None;
    }

    Some(ProseFeedback { summary, strengths, improvements })
}

fn non_blank(items: &[String]) -> Vec<String> {
    items.iter().map(|item| item.trim()).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

impl FeedbackView {
    pub fn to_html(&self) -> String {
        let mut out = format!("<section class=\"essay-feedback essay-feedback-{}\">", self.mode.as_str());

        if let Some(confirmation) = &self.confirmation {
            push_element(&mut out, "p", "essay-confirmation", confirmation);
        }
        if let Some(score) = &self.score {
            push_element(&mut out, "div", "essay-score", score);
        }
        if let Some(attempts) = &self.attempts {
            push_element(&mut out, "p", "essay-attempts", attempts);
        }

        if !self.categories.is_empty() {
            out.push_str(
                "<table class=\"essay-categories\"><thead><tr><th>Category</th><th>Score</th>\
                 <th>Comment</th></tr></thead><tbody>",
            );
            for row in &self.categories {
                out.push_str("<tr>");
                for cell in [&row.label, &row.score, &row.comment] {
                    out.push_str("<td>");
                    push_escaped(&mut out, cell);
                    out.push_str("</td>");
                }
                out.push_str("</tr>");
            }
            out.push_str("</tbody></table>");
        }

        if let Some(prose) = &self.prose {
            out.push_str("<div class=\"essay-prose\">");
            if let Some(summary) = &prose.summary {
                push_element(&mut out, "p", "essay-summary", summary);
            }
            push_list(&mut out, "Strengths", "essay-strengths", &prose.strengths);
            push_list(&mut out, "Areas to improve", "essay-improvements", &prose.improvements);
            out.push_str("</div>");
        }

        if let Some(annotated) = &self.annotated {
            out.push_str(&annotated.to_html());
        }

        if let Some(model_essay) = &self.model_essay {
            out.push_str("<details class=\"essay-model\"><summary>Model essay</summary><div>");
            push_escaped(&mut out, model_essay);
            out.push_str("</div></details>");
        }

        out.push_str("</section>");
        out
    }
}

fn push_element(out: &mut String, tag: &str, class: &str, text: &str) {
    out.push_str(&format!("<{tag} class=\"{class}\">"));
    push_escaped(out, text);
    out.push_str(&format!("</{tag}>"));
}

fn push_list(out: &mut String, heading: &str, class: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("<h4>{heading}</h4><ul class=\"{class}\">"));
    for item in items {
        out.push_str("<li>");
        push_escaped(out, item);
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}
