//! Error taxonomy for the tutoring core.
//!
//! Only one failure class is ever swallowed and recovered: a malformed
//! scoring reply inside the level assessor (see
//! [`AssessmentParseError`]). Everything in [`TutorError`] surfaces to the
//! orchestrator's caller, which owns user-visible messaging.

use crate::level::Level;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// Network or auth failure calling any external oracle (text generation,
    /// speech recognition, speech synthesis, avatar rendering). The session
    /// cannot proceed.
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The catalog has no words for the requested level band, even after the
    /// downward fallback.
    #[error("no vocabulary available for level {level} after downward fallback")]
    EmptyVocabulary { level: Level },

    /// The durable store is unreachable after bounded retries.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A turn was submitted to a conversation that has already closed.
    #[error("conversation {0} is closed and accepts no further turns")]
    SessionClosed(Uuid),

    /// A summary was requested before the conversation closed.
    #[error("conversation {0} is still open; the summary is produced after closure")]
    SessionOpen(Uuid),
}

impl TutorError {
    /// Wraps a transport-level failure from any external oracle.
    pub fn oracle(err: impl std::fmt::Display) -> Self {
        TutorError::OracleUnavailable(err.to_string())
    }

    /// Wraps a durable-store failure.
    pub fn store(err: impl std::fmt::Display) -> Self {
        TutorError::StoreUnavailable(err.to_string())
    }
}

/// Parse failure inside the level assessor's scoring reply.
///
/// This is a typed result, not an exception path: the assessor catches it as
/// a unit and falls back to `(current level, 0.5)` rather than propagating.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentParseError {
    #[error("scoring reply is missing a `{0}` line")]
    MissingLabel(&'static str),
    #[error("scoring reply has a non-numeric `{label}` value: `{value}`")]
    BadNumber { label: &'static str, value: String },
}
