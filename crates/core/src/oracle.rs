//! Text-generation oracle boundary.
//!
//! The core treats the chat model as a black box: `generate(prompt) -> text`.
//! [`OpenAICompatibleOracle`] works against any OpenAI-compatible endpoint
//! (OpenAI itself, or Gemini's compatibility surface), selected by the host
//! service's configuration.

use crate::error::TutorError;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use std::time::Duration;

/// A black-box text-generation service invoked via request/response.
#[async_trait]
pub trait ChatOracle: Send + Sync {
    /// Sends a single prompt (which may embed multi-line rubric text) and
    /// returns the single text block the oracle replies with.
    async fn generate(&self, prompt: &str) -> Result<String, TutorError>;
}

/// Strips a leading speaker label from an oracle reply.
///
/// The tutor is instructed, but not guaranteed, to prefix replies with
/// `老师：`. Splitting on a colon-like separator and taking the trailing
/// segment removes the label when present; the heuristic is deliberately
/// lossy for replies that themselves contain a colon.
pub fn strip_speaker_label(reply: &str) -> &str {
    reply.rsplit(['：', ':']).next().unwrap_or(reply).trim()
}

/// `ChatOracle` implementation for any OpenAI-compatible chat API.
pub struct OpenAICompatibleOracle {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Option<Duration>,
}

impl OpenAICompatibleOracle {
    /// Creates a new oracle client.
    ///
    /// `timeout` bounds each round trip; absence of a reply past the bound
    /// surfaces as [`TutorError::OracleUnavailable`]. There is no in-flight
    /// cancellation beyond that bound.
    pub fn new(config: OpenAIConfig, model: String, timeout: Option<Duration>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            timeout,
        }
    }
}

#[async_trait]
impl ChatOracle for OpenAICompatibleOracle {
    async fn generate(&self, prompt: &str) -> Result<String, TutorError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt.to_string())
                    .build()
                    .map_err(TutorError::oracle)?
                    .into(),
            ])
            .build()
            .map_err(TutorError::oracle)?;

        let chat = self.client.chat();
        let call = chat.create(request);
        let response = match self.timeout {
            Some(bound) => tokio::time::timeout(bound, call)
                .await
                .map_err(|_| TutorError::oracle("chat completion timed out"))?,
            None => call.await,
        }
        .map_err(TutorError::oracle)?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| TutorError::oracle("chat completion had no text content"))
    }
}
