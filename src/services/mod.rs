pub(crate) mod grading;
pub(crate) mod ledger;
pub(crate) mod scoring_backend;
