//! Simli talking-avatar client.
//!
//! Audio goes up as base64 PCM16; the service answers with URLs to the
//! rendered video.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use yuban_core::error::TutorError;
use yuban_core::media::AvatarAnimator;

const RENDER_URL: &str = "https://api.simli.ai/audioToVideoStream";
const FACE_URL: &str = "https://api.simli.ai/generateFaceID";
/// Must match the synthesizer's output format.
const AUDIO_SAMPLE_RATE: u32 = 16_000;

pub struct SimliAnimator {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct RenderResponse {
    mp4_url: Option<String>,
    hls_url: Option<String>,
}

#[derive(Deserialize)]
struct FaceResponse {
    #[serde(rename = "faceId")]
    face_id: String,
}

impl SimliAnimator {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Creates a face profile from a reference image and returns its id.
    pub async fn generate_face_id(&self, name: &str, image: Vec<u8>) -> Result<String, TutorError> {
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("face.jpg")
            .mime_str("image/jpeg")
            .map_err(TutorError::oracle)?;
        let form = reqwest::multipart::Form::new()
            .text("face_name", name.to_string())
            .part("image", part);

        let response = self
            .client
            .post(FACE_URL)
            .query(&[("api_key", &self.api_key)])
            .multipart(form)
            .send()
            .await
            .map_err(TutorError::oracle)?
            .error_for_status()
            .map_err(TutorError::oracle)?;

        let face: FaceResponse = response.json().await.map_err(TutorError::oracle)?;
        Ok(face.face_id)
    }
}

#[async_trait]
impl AvatarAnimator for SimliAnimator {
    async fn animate(&self, face_id: &str, audio: &[u8]) -> Result<String, TutorError> {
        let response = self
            .client
            .post(RENDER_URL)
            .json(&json!({
                "simliAPIKey": self.api_key,
                "faceId": face_id,
                "audioBase64": BASE64.encode(audio),
                "audioFormat": "pcm16",
                "audioSampleRate": AUDIO_SAMPLE_RATE,
                "audioChannelCount": 1,
                "videoStartingFrame": 0,
            }))
            .send()
            .await
            .map_err(TutorError::oracle)?
            .error_for_status()
            .map_err(TutorError::oracle)?;

        let rendered: RenderResponse = response.json().await.map_err(TutorError::oracle)?;
        rendered
            .mp4_url
            .or(rendered.hls_url)
            .ok_or_else(|| TutorError::oracle("avatar render returned no video url"))
    }
}
