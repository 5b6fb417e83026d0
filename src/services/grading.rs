use serde::Serialize;

use crate::schemas::essay::ScoreSummary;

/// Gradebook entry: `value` out of `max_value` points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Grade {
    pub(crate) value: f64,
    pub(crate) max_value: f64,
}

impl Grade {
    pub(crate) fn compute(score: Option<&ScoreSummary>, weight: f64) -> Self {
        Self { value: normalized_score(score) * weight, max_value: weight }
    }
}

/// `normalized` as sent, else derived from `raw` on `[scale_min, scale_max]`
/// (defaults `0` and `1`). Anything unusable counts as `0`.
pub(crate) fn normalized_score(score: Option<&ScoreSummary>) -> f64 {
    let Some(score) = score else {
        return 0.0;
    };

    if let Some(normalized) = score.normalized {
        return normalized;
    }

    let Some(raw) = score.raw else {
        return 0.0;
    };
    let scale_min = score.scale_min.unwrap_or(0.0);
    let scale_max = score.scale_max.unwrap_or(1.0);
    let denominator = scale_max - scale_min;

    if denominator > 0.0 {
        (raw - scale_min) / denominator
    } else {
        0.0
    }
}

pub(crate) fn publish(learner_id: &str, grade: Grade) {
    tracing::info!(
        learner_id = %learner_id,
        value = grade.value,
        max_value = grade.max_value,
        "Grade published"
    );
    metrics::counter!("essay_grades_published_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(raw: Option<f64>, normalized: Option<f64>, min: Option<f64>, max: Option<f64>) -> ScoreSummary {
        ScoreSummary { raw, normalized, scale_min: min, scale_max: max }
    }

    #[test]
    fn normalized_wins() {
        let summary = score(Some(90.0), Some(0.4), Some(0.0), Some(100.0));
        assert_eq!(normalized_score(Some(&summary)), 0.4);
    }

    #[test]
    fn raw_is_scaled_onto_range() {
        let summary = score(Some(75.0), None, Some(50.0), Some(100.0));
        assert_eq!(normalized_score(Some(&summary)), 0.5);

        let summary = score(Some(0.25), None, None, None);
        assert_eq!(normalized_score(Some(&summary)), 0.25);
    }

    #[test]
    fn degenerate_scale_and_missing_values_are_zero() {
        let summary = score(Some(5.0), None, Some(10.0), Some(10.0));
        assert_eq!(normalized_score(Some(&summary)), 0.0);
        assert_eq!(normalized_score(Some(&ScoreSummary::default())), 0.0);
        assert_eq!(normalized_score(None), 0.0);
    }

    #[test]
    fn grade_is_scaled_by_weight() {
        let summary = score(None, Some(0.5), None, None);
        assert_eq!(Grade::compute(Some(&summary), 4.0), Grade { value: 2.0, max_value: 4.0 });
        assert_eq!(Grade::compute(None, 2.0), Grade { value: 0.0, max_value: 2.0 });
    }
}
