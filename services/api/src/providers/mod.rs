//! HTTP clients for the external speech, voice and avatar services.

pub mod azure;
pub mod eleven;
pub mod simli;

pub use azure::AzureRecognizer;
pub use eleven::ElevenLabsSynthesizer;
pub use simli::SimliAnimator;
