//! Speech-recognition boundary and pronunciation-quality payloads.

use crate::error::TutorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Recognition-quality metrics attached to a learner turn.
///
/// The sub-scores mirror what pronunciation-assessment engines report; the
/// per-word/phoneme breakdown is an opaque record passed through unmodified
/// to the assessment step and to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PronunciationReport {
    pub accuracy: f32,
    pub fluency: f32,
    pub completeness: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prosody: Option<f32>,
    pub overall: f32,
    /// Opaque per-word breakdown, engine-specific.
    #[serde(default)]
    pub words: serde_json::Value,
}

/// The outcome of a single recognition call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    pub report: Option<PronunciationReport>,
}

/// A black-box speech-to-text engine with optional pronunciation assessment.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognizes a single utterance from WAV audio.
    async fn recognize(&self, wav: &[u8]) -> Result<Recognition, TutorError>;
}
