use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::ledger::LearnerLedger;
use crate::services::scoring_backend::ScoringBackend;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    ledger: LearnerLedger,
    scoring: Arc<dyn ScoringBackend>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, scoring: Arc<dyn ScoringBackend>) -> Self {
        Self { inner: Arc::new(InnerState { settings, ledger: LearnerLedger::new(), scoring }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn ledger(&self) -> &LearnerLedger {
        &self.inner.ledger
    }

    pub(crate) fn scoring(&self) -> &dyn ScoringBackend {
        self.inner.scoring.as_ref()
    }
}
