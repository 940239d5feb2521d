//! Speech-synthesis and avatar-animation boundaries.
//!
//! Both are direct call-and-forward collaborators: the core never inspects
//! the audio or video it shuttles between them.

use crate::error::TutorError;
use async_trait::async_trait;

/// A black-box text-to-speech engine.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Renders `text` in the given cloned-voice profile and returns the raw
    /// audio bytes in the engine's configured output format.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, TutorError>;
}

/// A black-box talking-avatar renderer.
#[async_trait]
pub trait AvatarAnimator: Send + Sync {
    /// Animates the given face profile with the audio and returns a URL to
    /// the rendered video.
    async fn animate(&self, face_id: &str, audio: &[u8]) -> Result<String, TutorError>;
}
