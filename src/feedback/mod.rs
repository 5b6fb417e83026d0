//! Rendering of scored essay feedback: span composition, escaped markup and the
//! mode-gated feedback view.

pub mod compositor;
pub mod markup;
pub mod presenter;

pub use compositor::{compose, Run, RunKind};
pub use markup::{escape_html, render, AnnotatedMarkup};
pub use presenter::{FeedbackPresenter, FeedbackView, Region};
