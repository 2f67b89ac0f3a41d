use std::collections::BTreeMap;

use async_trait::async_trait;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{
    Capability, ImplementationStatus, MusicProvider, MusicResult, ProviderProfile,
};
use crate::secrets::resolve_secret;

pub struct StubMusicProvider {
    name: &'static str,
    key_name: &'static str,
    cost_per_second: f64,
}

impl StubMusicProvider {
    pub fn mubert() -> Self {
        Self {
            name: "mubert",
            key_name: "MUBERT_API_KEY",
            cost_per_second: 0.002,
        }
    }

    pub fn suno() -> Self {
        Self {
            name: "suno",
            key_name: "SUNO_API_KEY",
            cost_per_second: 0.004,
        }
    }
}

#[async_trait]
impl MusicProvider for StubMusicProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: self.name.to_string(),
            capabilities: vec![Capability::MusicGeneration],
            min_duration_sec: 5.0,
            max_duration_sec: 300.0,
            aspect_ratios: Vec::new(),
            status: ImplementationStatus::Stub,
            requires_seed_image: false,
        }
    }

    async fn generate(
        &self,
        _mood: &str,
        _duration_sec: f64,
        _tempo: &str,
        _options: &BTreeMap<String, serde_json::Value>,
    ) -> ProductionResult<MusicResult> {
        Err(ProductionError::ProviderPermanent(format!(
            "provider `{}` is not implemented",
            self.name
        )))
    }

    fn estimate_cost(
        &self,
        duration_sec: f64,
        _options: &BTreeMap<String, serde_json::Value>,
    ) -> f64 {
        duration_sec * self.cost_per_second
    }

    async fn validate_credentials(&self) -> bool {
        resolve_secret(self.key_name).is_some()
    }
}
