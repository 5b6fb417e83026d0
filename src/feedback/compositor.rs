use serde::Serialize;

use crate::schemas::essay::AnnotationSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Plain,
    Highlighted,
    /// Marker for an essay with no text at all.
    Empty,
}

/// A contiguous piece of the essay, either plain or flagged by one span.
///
/// `start`/`end` are character offsets (Unicode scalar values) into the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub kind: RunKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Run {
    fn plain(text: &str, start: usize, end: usize) -> Self {
        Self {
            kind: RunKind::Plain,
            text: text.to_string(),
            start,
            end,
            category: None,
            message: None,
        }
    }

    fn highlighted(text: &str, start: usize, end: usize, span: &AnnotationSpan) -> Self {
        Self {
            kind: RunKind::Highlighted,
            text: text.to_string(),
            start,
            end,
            category: Some(span.category.clone()),
            message: span.message.clone(),
        }
    }

    fn empty() -> Self {
        Self {
            kind: RunKind::Empty,
            text: String::new(),
            start: 0,
            end: 0,
            category: None,
            message: None,
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.kind == RunKind::Highlighted
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `text` into plain and highlighted runs according to `spans`.
///
/// Spans are clamped into the text, `end < start` collapses to a zero-width span at
/// `start`, and spans are visited in stable `start` order. A span that starts inside an
/// already highlighted region loses its overlapping prefix; one that lies entirely inside
/// it is dropped. The returned runs cover the text exactly once, left to right.
pub fn compose(text: &str, spans: &[AnnotationSpan]) -> Vec<Run> {
    if text.is_empty() {
        return vec![Run::empty()];
    }

    let index = CharIndex::new(text);
    let len = index.len();

    if spans.is_empty() {
        return vec![Run::plain(text, 0, len)];
    }

    let mut clamped: Vec<ClampedSpan<'_>> =
        spans.iter().map(|span| ClampedSpan::new(span, len)).collect();
    // `sort_by_key` is stable, so equal starts keep their input order.
    clamped.sort_by_key(|span| span.start);

    let mut runs = Vec::with_capacity(clamped.len() * 2 + 1);
    let mut cursor = 0;

    for span in clamped {
        if span.start < cursor && span.end <= cursor {
            continue;
        }

        let start = span.start.max(cursor);
        if start > cursor {
            runs.push(Run::plain(index.slice(cursor, start), cursor, start));
        }
        runs.push(Run::highlighted(index.slice(start, span.end), start, span.end, span.source));
        cursor = cursor.max(span.end);
    }

    if cursor < len {
        runs.push(Run::plain(index.slice(cursor, len), cursor, len));
    }

    runs
}

/// Number of characters in `text`, in the unit span offsets are expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

struct ClampedSpan<'a> {
    start: usize,
    end: usize,
    source: &'a AnnotationSpan,
}

impl<'a> ClampedSpan<'a> {
    fn new(source: &'a AnnotationSpan, len: usize) -> Self {
        let start = clamp(source.start, len);
        let end = clamp(source.end, len).max(start);
        Self { start, end, source }
    }
}

fn clamp(offset: i64, len: usize) -> usize {
    if offset <= 0 {
        return 0;
    }
    usize::try_from(offset).map_or(len, |offset| offset.min(len))
}

/// Byte positions of every character boundary, so character ranges can be sliced
/// without splitting a UTF-8 sequence.
pub(crate) struct CharIndex<'a> {
    text: &'a str,
    boundaries: Vec<usize>,
}

impl<'a> CharIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let boundaries = text
            .char_indices()
            .map(|(position, _)| position)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, boundaries }
    }

    pub(crate) fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub(crate) fn byte_offset(&self, char_offset: usize) -> usize {
        self.boundaries[char_offset.min(self.len())]
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.byte_offset(start)..self.byte_offset(end)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: i64, end: i64, category: &str) -> AnnotationSpan {
        AnnotationSpan::new(start, end, category)
    }

    fn joined(runs: &[Run]) -> String {
        runs.iter().map(|run| run.text.as_str()).collect()
    }

    fn shape(runs: &[Run]) -> Vec<(RunKind, &str)> {
        runs.iter().map(|run| (run.kind, run.text.as_str())).collect()
    }

    #[test]
    fn splits_sentence_around_single_span() {
        let spans = vec![span(4, 7, "grammar").with_message("subject-verb")];
        let runs = compose("The cat sat.", &spans);

        assert_eq!(
            shape(&runs),
            vec![
                (RunKind::Plain, "The "),
                (RunKind::Highlighted, "cat"),
                (RunKind::Plain, " sat."),
            ]
        );
        assert_eq!(runs[1].category.as_deref(), Some("grammar"));
        assert_eq!(runs[1].message.as_deref(), Some("subject-verb"));
    }

    #[test]
    fn no_spans_yields_one_plain_run() {
        let runs = compose("Hello world", &[]);
        assert_eq!(shape(&runs), vec![(RunKind::Plain, "Hello world")]);
        assert_eq!((runs[0].start, runs[0].end), (0, 11));
    }

    #[test]
    fn empty_text_yields_empty_marker() {
        assert_eq!(compose("", &[]), vec![Run::empty()]);
        assert_eq!(compose("", &[span(0, 3, "x")]), vec![Run::empty()]);
    }

    #[test]
    fn reversed_span_collapses_to_zero_width_at_clamped_start() {
        let runs = compose("abcde", &[span(10, 2, "x")]);

        assert_eq!(shape(&runs), vec![(RunKind::Plain, "abcde"), (RunKind::Highlighted, "")]);
        assert_eq!((runs[1].start, runs[1].end), (5, 5));
        assert_eq!(joined(&runs), "abcde");
    }

    #[test]
    fn out_of_range_spans_are_clamped() {
        let text = "short";
        let runs = compose(text, &[span(-20, 2, "a"), span(3, 900, "b")]);

        assert_eq!(
            shape(&runs),
            vec![
                (RunKind::Highlighted, "sh"),
                (RunKind::Plain, "o"),
                (RunKind::Highlighted, "rt"),
            ]
        );
        assert!(runs.iter().all(|run| run.start <= run.end && run.end <= char_len(text)));
    }

    #[test]
    fn unsorted_spans_are_emitted_in_document_order() {
        let runs = compose("one two three", &[span(8, 13, "c"), span(0, 3, "a"), span(4, 7, "b")]);
        let categories: Vec<_> = runs.iter().filter_map(|run| run.category.as_deref()).collect();
        assert_eq!(categories, vec!["a", "b", "c"]);
        assert_eq!(joined(&runs), "one two three");
    }

    #[test]
    fn equal_starts_keep_input_order() {
        let runs = compose("abcdef", &[span(1, 1, "first"), span(1, 3, "second")]);
        let categories: Vec<_> = runs.iter().filter_map(|run| run.category.as_deref()).collect();
        assert_eq!(categories, vec!["first", "second"]);
        assert_eq!(joined(&runs), "abcdef");
    }

    #[test]
    fn overlapping_prefix_is_skipped() {
        let runs = compose("abcdefghij", &[span(0, 5, "a"), span(3, 8, "b")]);
        assert_eq!(
            shape(&runs),
            vec![
                (RunKind::Highlighted, "abcde"),
                (RunKind::Highlighted, "fgh"),
                (RunKind::Plain, "ij"),
            ]
        );
        assert_eq!((runs[1].start, runs[1].end), (5, 8));
    }

    #[test]
    fn fully_covered_span_is_dropped() {
        let runs = compose("abcdefghij", &[span(0, 6, "outer"), span(2, 4, "inner")]);
        assert_eq!(shape(&runs), vec![(RunKind::Highlighted, "abcdef"), (RunKind::Plain, "ghij")]);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let runs = compose("café au lait", &[span(3, 4, "accent")]);
        assert_eq!(
            shape(&runs),
            vec![
                (RunKind::Plain, "caf"),
                (RunKind::Highlighted, "é"),
                (RunKind::Plain, " au lait"),
            ]
        );
    }

    #[test]
    fn runs_always_reassemble_the_text() {
        let text = "Il était une fois, a <tale> & \"quotes\" über done.";
        let len = char_len(text) as i64;
        let mut seed: i64 = 17;
        let mut next = move || {
            seed = (seed * 1_103_515_245 + 12_345) % 2_147_483_648;
            seed % (len + 10) - 5
        };

        for _ in 0..200 {
            let spans: Vec<_> = (0..4).map(|_| span(next(), next(), "x")).collect();
            let runs = compose(text, &spans);

            assert_eq!(joined(&runs), text);
            let mut expected_start = 0;
            for run in &runs {
                assert_eq!(run.start, expected_start);
                assert!(run.end >= run.start);
                assert!(run.end as i64 <= len);
                expected_start = run.end;
            }
            assert_eq!(expected_start as i64, len);
        }
    }
}
