//! Data models for rsannotate.

mod annotation;
mod session;

pub use annotation::AnnotationResult;
pub use session::{AnnotationSession, NewSession, SessionId, SessionOverview, SessionStatus};
