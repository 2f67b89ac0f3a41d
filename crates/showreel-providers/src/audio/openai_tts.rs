// OpenAI text-to-speech: immediate submission pattern, bytes in one round
// trip. $15 per million input characters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{
    AudioProvider, AudioRequest, AudioResult, Capability, ImplementationStatus, ProviderProfile,
    Voice,
};
use crate::retry::{classify_status, classify_transport};
use crate::secrets::resolve_secret;

const BASE_URL: &str = "https://api.openai.com/v1";
const COST_PER_CHAR: f64 = 0.000_015;
const VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

pub struct OpenAiTtsProvider {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl std::fmt::Debug for OpenAiTtsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiTtsProvider")
            .field("api_key", &crate::secrets::mask_secret(Some(&self.api_key)))
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiTtsProvider {
    pub fn from_env() -> ProductionResult<Self> {
        let api_key =
            resolve_secret("OPENAI_API_KEY").ok_or(ProductionError::CredentialMissing {
                provider: "openai_tts".to_string(),
            })?;
        Ok(Self {
            api_key,
            base_url: BASE_URL.to_string(),
            model: "tts-1".to_string(),
            client: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Duration estimate at ~150 words per minute, scaled by speed.
    fn estimate_duration(text: &str, speed: f64) -> f64 {
        let words = text.split_whitespace().count().max(1) as f64;
        let speed = if speed > 0.0 { speed } else { 1.0 };
        words / (150.0 * speed) * 60.0
    }
}

#[async_trait]
impl AudioProvider for OpenAiTtsProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "openai_tts".to_string(),
            capabilities: vec![Capability::TextToSpeech],
            min_duration_sec: 0.5,
            max_duration_sec: 600.0,
            aspect_ratios: Vec::new(),
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn synthesize(&self, request: &AudioRequest) -> ProductionResult<AudioResult> {
        let voice = request.voice_id.as_deref().unwrap_or("nova");
        let speed = if request.speed > 0.0 {
            request.speed.clamp(0.25, 4.0)
        } else {
            1.0
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": request.text,
                "voice": voice,
                "speed": speed,
                "response_format": "mp3",
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| format!("speech request failed with {status}"));
            return Err(classify_status(status, detail));
        }

        let bytes = response.bytes().await.map_err(classify_transport)?;
        Ok(AudioResult {
            duration_sec: Self::estimate_duration(&request.text, speed),
            cost_usd: self.estimate_cost(&request.text, &request.options),
            bytes: Some(bytes.to_vec()),
            url: None,
            format: "mp3".to_string(),
            sample_rate: 24_000,
        })
    }

    async fn list_voices(&self) -> ProductionResult<Vec<Voice>> {
        Ok(VOICES
            .iter()
            .map(|id| Voice {
                voice_id: id.to_string(),
                name: id.to_string(),
                description: String::new(),
            })
            .collect())
    }

    fn estimate_cost(&self, text: &str, _options: &BTreeMap<String, serde_json::Value>) -> f64 {
        text.len() as f64 * COST_PER_CHAR
    }

    async fn validate_credentials(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;
        matches!(result, Ok(response) if response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_scales_with_speed() {
        let text = "one two three four five six seven eight nine ten";
        let normal = OpenAiTtsProvider::estimate_duration(text, 1.0);
        let fast = OpenAiTtsProvider::estimate_duration(text, 2.0);
        assert!((normal - 4.0).abs() < 0.01);
        assert!((fast - 2.0).abs() < 0.01);
    }

    #[test]
    fn cost_is_per_character() {
        let provider = OpenAiTtsProvider {
            api_key: "k".into(),
            base_url: BASE_URL.into(),
            model: "tts-1".into(),
            client: Client::new(),
        };
        let text = "a".repeat(1000);
        assert!((provider.estimate_cost(&text, &BTreeMap::new()) - 0.015).abs() < 1e-9);
    }
}
