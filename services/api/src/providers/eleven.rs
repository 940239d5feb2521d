//! ElevenLabs text-to-speech client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use yuban_core::error::TutorError;
use yuban_core::media::SpeechSynthesizer;

const ELEVEN_BASE: &str = "https://api.elevenlabs.io/v1";
const TTS_MODEL: &str = "eleven_multilingual_v2";
/// Raw 16 kHz PCM16, the format the avatar renderer consumes directly.
const OUTPUT_FORMAT: &str = "pcm_16000";

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct VoiceCreated {
    voice_id: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Creates a cloned-voice profile from a reference recording and returns
    /// its id.
    pub async fn clone_voice(&self, name: &str, sample: Vec<u8>) -> Result<String, TutorError> {
        let part = reqwest::multipart::Part::bytes(sample)
            .file_name("sample.wav")
            .mime_str("audio/wav")
            .map_err(TutorError::oracle)?;
        let form = reqwest::multipart::Form::new()
            .text("name", name.to_string())
            .part("files", part);

        let response = self
            .client
            .post(format!("{ELEVEN_BASE}/voices/add"))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(TutorError::oracle)?
            .error_for_status()
            .map_err(TutorError::oracle)?;

        let created: VoiceCreated = response.json().await.map_err(TutorError::oracle)?;
        Ok(created.voice_id)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, TutorError> {
        let response = self
            .client
            .post(format!(
                "{ELEVEN_BASE}/text-to-speech/{voice_id}?output_format={OUTPUT_FORMAT}"
            ))
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": TTS_MODEL,
            }))
            .send()
            .await
            .map_err(TutorError::oracle)?
            .error_for_status()
            .map_err(TutorError::oracle)?;

        let audio = response.bytes().await.map_err(TutorError::oracle)?;
        Ok(audio.to_vec())
    }
}
