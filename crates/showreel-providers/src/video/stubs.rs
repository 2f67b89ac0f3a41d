// Stub integrations for providers on the roster but not yet wired up.
// Stubs still price work and validate credentials; generate fails permanent.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{
    Capability, GenerateOutcome, ImplementationStatus, JobState, ProviderProfile, VideoProvider,
    VideoRequest,
};
use crate::secrets::resolve_secret;

pub struct StubVideoProvider {
    name: &'static str,
    key_name: &'static str,
    cost_per_second: f64,
}

impl StubVideoProvider {
    pub fn pika() -> Self {
        Self {
            name: "pika",
            key_name: "PIKA_API_KEY",
            cost_per_second: 0.06,
        }
    }

    pub fn stability() -> Self {
        Self {
            name: "stability",
            key_name: "STABILITY_API_KEY",
            cost_per_second: 0.04,
        }
    }

    pub fn kling() -> Self {
        Self {
            name: "kling",
            key_name: "KLING_API_KEY",
            cost_per_second: 0.07,
        }
    }
}

#[async_trait]
impl VideoProvider for StubVideoProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: self.name.to_string(),
            capabilities: vec![Capability::TextToVideo],
            min_duration_sec: 2.0,
            max_duration_sec: 10.0,
            aspect_ratios: vec!["16:9".to_string(), "9:16".to_string()],
            status: ImplementationStatus::Stub,
            requires_seed_image: false,
        }
    }

    async fn generate(&self, _request: &VideoRequest) -> ProductionResult<GenerateOutcome> {
        Err(ProductionError::ProviderPermanent(format!(
            "provider `{}` is not implemented",
            self.name
        )))
    }

    async fn poll(&self, job_id: &str) -> ProductionResult<JobState> {
        Err(ProductionError::ProviderPermanent(format!(
            "provider `{}` has no job `{job_id}`",
            self.name
        )))
    }

    async fn download(&self, _url: &str, _local_path: &Path) -> ProductionResult<u64> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_prices_work_but_refuses_to_generate() {
        let stub = StubVideoProvider::pika();
        assert_eq!(stub.profile().status, ImplementationStatus::Stub);
        assert!((stub.estimate_cost(10.0, &BTreeMap::new()) - 0.6).abs() < 1e-9);

        let err = stub.generate(&VideoRequest::default()).await.err().unwrap();
        assert!(matches!(err, ProductionError::ProviderPermanent(_)));
    }
}
