pub(crate) mod errors;
pub(crate) mod essays;
pub(crate) mod handlers;
pub(crate) mod router;
pub(crate) mod validation;
