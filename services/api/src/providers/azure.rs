//! Azure speech-to-text client with pronunciation assessment.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use yuban_core::error::TutorError;
use yuban_core::speech::{PronunciationReport, Recognition, SpeechRecognizer};

pub struct AzureRecognizer {
    client: reqwest::Client,
    api_key: String,
    region: String,
    language: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureResponse {
    recognition_status: String,
    #[serde(default)]
    n_best: Vec<AzureHypothesis>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureHypothesis {
    display: Option<String>,
    lexical: Option<String>,
    accuracy_score: Option<f32>,
    fluency_score: Option<f32>,
    completeness_score: Option<f32>,
    prosody_score: Option<f32>,
    pron_score: Option<f32>,
    #[serde(default)]
    words: serde_json::Value,
}

impl AzureRecognizer {
    pub fn new(api_key: String, region: String, language: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            region,
            language,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
            self.region
        )
    }

    /// The per-request assessment parameters, base64-encoded per the API
    /// contract. Unscripted mode: no reference text.
    fn assessment_header(&self) -> String {
        let params = json!({
            "ReferenceText": "",
            "GradingSystem": "HundredMark",
            "Granularity": "Word",
            "EnableProsodyAssessment": true,
        });
        BASE64.encode(params.to_string())
    }
}

#[async_trait]
impl SpeechRecognizer for AzureRecognizer {
    async fn recognize(&self, wav: &[u8]) -> Result<Recognition, TutorError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[
                ("language", self.language.as_str()),
                ("format", "detailed"),
            ])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Pronunciation-Assessment", self.assessment_header())
            .header("Content-Type", "audio/wav; codecs=audio/pcm")
            .header("Accept", "application/json")
            .body(wav.to_vec())
            .send()
            .await
            .map_err(TutorError::oracle)?
            .error_for_status()
            .map_err(TutorError::oracle)?;

        let parsed: AzureResponse = response.json().await.map_err(TutorError::oracle)?;
        if parsed.recognition_status != "Success" {
            return Err(TutorError::oracle(format!(
                "recognition failed: {}",
                parsed.recognition_status
            )));
        }

        let best = parsed
            .n_best
            .into_iter()
            .next()
            .ok_or_else(|| TutorError::oracle("recognition returned no hypotheses"))?;

        let text = best
            .display
            .or(best.lexical)
            .unwrap_or_default();
        // The assessment block is optional on the wire; a plain transcription
        // still counts as a successful recognition.
        let report = match (best.accuracy_score, best.fluency_score) {
            (Some(accuracy), Some(fluency)) => Some(PronunciationReport {
                accuracy,
                fluency,
                completeness: best.completeness_score.unwrap_or(0.0),
                prosody: best.prosody_score,
                overall: best.pron_score.unwrap_or(accuracy),
                words: best.words,
            }),
            _ => None,
        };

        Ok(Recognition { text, report })
    }
}
