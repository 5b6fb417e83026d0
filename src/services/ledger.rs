//! Per-learner attempt bookkeeping for the lifetime of the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::services::grading::Grade;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum LedgerError {
    #[error("a submission for learner {0} is already in progress")]
    InFlight(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LearnerRecord {
    pub(crate) attempts_used: u32,
    pub(crate) last_essay_text: Option<String>,
    pub(crate) last_result: Option<Value>,
    pub(crate) last_grade: Option<Grade>,
    pub(crate) last_graded_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct Entry {
    record: LearnerRecord,
    in_flight: bool,
}

#[derive(Debug, Default)]
pub(crate) struct LearnerLedger {
    entries: Mutex<HashMap<String, Entry>>,
}

impl LearnerLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn snapshot(&self, learner_id: &str) -> LearnerRecord {
        self.lock().get(learner_id).map(|entry| entry.record.clone()).unwrap_or_default()
    }

    /// Claim the learner's single submission slot until the reservation is dropped.
    pub(crate) fn reserve(&self, learner_id: &str) -> Result<Reservation<'_>, LedgerError> {
        let mut entries = self.lock();
        let entry = entries.entry(learner_id.to_string()).or_default();
        if entry.in_flight {
            return Err(LedgerError::InFlight(learner_id.to_string()));
        }
        entry.in_flight = true;

        Ok(Reservation {
            ledger: self,
            learner_id: learner_id.to_string(),
            attempts_used: entry.record.attempts_used,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct Reservation<'a> {
    ledger: &'a LearnerLedger,
    learner_id: String,
    attempts_used: u32,
}

impl Reservation<'_> {
    pub(crate) fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    /// Record a scored attempt. Returns the new attempt count.
    pub(crate) fn commit(self, essay_text: &str, result: Value, grade: Grade) -> u32 {
        let attempts_used = self.attempts_used + 1;
        let mut entries = self.ledger.lock();
        let entry = entries.entry(self.learner_id.clone()).or_default();
        entry.record = LearnerRecord {
            attempts_used,
            last_essay_text: Some(essay_text.to_string()),
            last_result: Some(result),
            last_grade: Some(grade),
            last_graded_at: Some(OffsetDateTime::now_utc()),
        };
        attempts_used
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.ledger.lock().get_mut(&self.learner_id) {
            entry.in_flight = false;
        }
    }
}
