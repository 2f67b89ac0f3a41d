// ElevenLabs text-to-speech: immediate bytes, voice catalog endpoint.

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

const BASE_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
const COST_PER_CHAR: f64 = 0.000_30;

pub struct ElevenLabsProvider {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl std::fmt::Debug for ElevenLabsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsProvider")
            .field("api_key", &crate::secrets::mask_secret(Some(&self.api_key)))
            .field("model", &self.model)
            .finish()
    }
}

impl ElevenLabsProvider {
    pub fn from_env() -> ProductionResult<Self> {
        let api_key =
            resolve_secret("ELEVENLABS_API_KEY").ok_or(ProductionError::CredentialMissing {
                provider: "elevenlabs".to_string(),
            })?;
        Ok(Self {
            api_key,
            base_url: BASE_URL.to_string(),
            model: "eleven_multilingual_v2".to_string(),
            client: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl AudioProvider for ElevenLabsProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "elevenlabs".to_string(),
            capabilities: vec![Capability::TextToSpeech],
            min_duration_sec: 0.5,
            max_duration_sec: 600.0,
            aspect_ratios: Vec::new(),
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn synthesize(&self, request: &AudioRequest) -> ProductionResult<AudioResult> {
        let voice = request.voice_id.as_deref().unwrap_or(DEFAULT_VOICE);

        let response = self
            .client
            .post(format!("{}/text-to-speech/{voice}", self.base_url))
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": request.text,
                "model_id": self.model,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75,
                },
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| format!("text-to-speech failed with {status}"));
            return Err(classify_status(status, detail));
        }

        let bytes = response.bytes().await.map_err(classify_transport)?;
        let words = request.text.split_whitespace().count().max(1) as f64;
        Ok(AudioResult {
            duration_sec: words / 150.0 * 60.0,
            cost_usd: self.estimate_cost(&request.text, &request.options),
            bytes: Some(bytes.to_vec()),
            url: None,
            format: "mp3".to_string(),
            sample_rate: 44_100,
        })
    }

    async fn list_voices(&self) -> ProductionResult<Vec<Voice>> {
        let response = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = response.status();
        let value: serde_json::Value = response.json().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(
                status,
                format!("voice listing failed with {status}"),
            ));
        }

        let voices = value
            .get("voices")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(Voice {
                            voice_id: item.get("voice_id")?.as_str()?.to_string(),
                            name: item
                                .get("name")
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            description: item
                                .get("description")
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(voices)
    }

    fn estimate_cost(&self, text: &str, _options: &BTreeMap<String, serde_json::Value>) -> f64 {
        text.len() as f64 * COST_PER_CHAR
    }

    async fn validate_credentials(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/user", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await;
        matches!(result, Ok(response) if response.status().is_success())
    }
}
