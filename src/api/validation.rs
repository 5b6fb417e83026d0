use crate::api::errors::ApiError;

pub(crate) const MAX_LEARNER_ID_LEN: usize = 128;

/// Learner ids are opaque but must be short and URL-safe.
pub(crate) fn validate_learner_id(learner_id: &str) -> Result<(), ApiError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@');

    if learner_id.is_empty() || learner_id.len() > MAX_LEARNER_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "Learner id must be between 1 and {MAX_LEARNER_ID_LEN} characters long"
        )));
    }

    if learner_id.chars().all(allowed) {
        Ok(())
    } else {
        Err(ApiError::BadRequest("Invalid learner id format".to_string()))
    }
}
