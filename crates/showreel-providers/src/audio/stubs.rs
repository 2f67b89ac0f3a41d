use std::collections::BTreeMap;

use async_trait::async_trait;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{
    AudioProvider, AudioRequest, AudioResult, Capability, ImplementationStatus, ProviderProfile,
    Voice,
};
use crate::secrets::resolve_secret;

pub struct StubAudioProvider {
    name: &'static str,
    key_name: &'static str,
}

impl StubAudioProvider {
    pub fn inworld() -> Self {
        Self {
            name: "inworld",
            key_name: "INWORLD_API_KEY",
        }
    }
}

#[async_trait]
impl AudioProvider for StubAudioProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: self.name.to_string(),
            capabilities: vec![Capability::TextToSpeech],
            min_duration_sec: 0.5,
            max_duration_sec: 300.0,
            aspect_ratios: Vec::new(),
            status: ImplementationStatus::Stub,
            requires_seed_image: false,
        }
    }

    async fn synthesize(&self, _request: &AudioRequest) -> ProductionResult<AudioResult> {
        Err(ProductionError::ProviderPermanent(format!(
            "provider `{}` is not implemented",
            self.name
        )))
    }

    async fn list_voices(&self) -> ProductionResult<Vec<Voice>> {
        Ok(Vec::new())
    }

    fn estimate_cost(&self, text: &str, _options: &BTreeMap<String, serde_json::Value>) -> f64 {
        text.len() as f64 * 0.000_02
    }

    async fn validate_credentials(&self) -> bool {
        resolve_secret(self.key_name).is_some()
    }
}
