use serde::Serialize;

use crate::feedback::compositor::{Run, RunKind};
use crate::schemas::essay::Legend;

pub(crate) const NO_ISSUES_NOTICE: &str = "No issues found.";
pub(crate) const EMPTY_ESSAY_NOTICE: &str = "No essay text was submitted.";

/// Escaped markup for the annotated essay and its legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedMarkup {
    pub essay: String,
    pub legend: String,
    /// Highlighted runs with visible text.
    pub issue_count: usize,
}

impl AnnotatedMarkup {
    pub fn to_html(&self) -> String {
        format!("<div class=\"essay-annotated-block\">{}{}</div>", self.essay, self.legend)
    }
}

/// Render composed runs and the legend into escaped markup.
///
/// This never fails: a legend entry without a label shows its key, and a span type that is
/// not a usable style token is rewritten before it becomes part of a class name.
pub fn render(runs: &[Run], legend: &Legend) -> AnnotatedMarkup {
    let mut essay = String::from("<div class=\"essay-annotated\">");
    let mut issue_count = 0;

    for run in runs {
        match run.kind {
            RunKind::Plain => push_escaped(&mut essay, &run.text),
            RunKind::Highlighted => {
                if !run.is_empty() {
                    issue_count += 1;
                }
                push_highlight(&mut essay, run);
            }
            RunKind::Empty => {
                essay.push_str("<span class=\"essay-empty\">");
                essay.push_str(EMPTY_ESSAY_NOTICE);
                essay.push_str("</span>");
            }
        }
    }
    essay.push_str("</div>");

    let legend = if issue_count == 0 {
        format!("<p class=\"essay-no-issues\">{NO_ISSUES_NOTICE}</p>")
    } else {
        render_legend(legend)
    };

    AnnotatedMarkup { essay, legend, issue_count }
}

fn push_highlight(out: &mut String, run: &Run) {
    let category = run.category.as_deref().unwrap_or_default();

    out.push_str("<span class=\"essay-issue error-");
    out.push_str(&style_token(category));
    out.push_str("\" data-type=\"");
    push_escaped(out, category);
    out.push('"');
    if let Some(message) = &run.message {
        out.push_str(" data-message=\"");
        push_escaped(out, message);
        out.push_str("\" title=\"");
        push_escaped(out, message);
        out.push('"');
    }
    out.push('>');
    push_escaped(out, &run.text);
    out.push_str("</span>");
}

fn render_legend(legend: &Legend) -> String {
    if legend.is_empty() {
        return String::new();
    }

    let mut out = String::from("<ul class=\"essay-legend\">");
    for (key, entry) in legend {
        out.push_str("<li class=\"essay-legend-item\"><span class=\"essay-legend-swatch error-");
        out.push_str(&style_token(key));
        out.push_str("\" data-type=\"");
        push_escaped(&mut out, key);
        out.push_str("\"></span><span class=\"essay-legend-label\">");
        push_escaped(&mut out, entry.display_label());
        out.push_str("</span></li>");
    }
    out.push_str("</ul>");
    out
}

/// Escape text for use in element content and double- or single-quoted attributes.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    push_escaped(&mut out, value);
    out
}

pub(crate) fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

/// Reduce a span type to `[A-Za-z0-9_-]` so it can sit inside a class attribute.
fn style_token(category: &str) -> String {
    let token: String = category
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '-' })
        .collect();

    if token.is_empty() {
        "unknown".to_string()
    } else {
        token
    }
}
