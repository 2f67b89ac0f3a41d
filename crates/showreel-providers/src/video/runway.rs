// Runway gen3a: image-to-video through the task API.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{
    Capability, GenerateOutcome, ImplementationStatus, JobHandle, JobState, ProviderProfile,
    VideoProvider, VideoRequest,
};
use crate::download::download_to_file;
use crate::retry::{classify_status, classify_transport};
use crate::secrets::resolve_secret;

const BASE_URL: &str = "https://api.dev.runwayml.com";
const API_VERSION: &str = "2024-11-06";
// gen3a_turbo, 5 credits/sec at $0.01/credit.
const COST_PER_SECOND: f64 = 0.05;

pub struct RunwayProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for RunwayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunwayProvider")
            .field("api_key", &crate::secrets::mask_secret(Some(&self.api_key)))
            .finish()
    }
}

impl RunwayProvider {
    pub fn from_env() -> ProductionResult<Self> {
        let api_key =
            resolve_secret("RUNWAY_API_KEY").ok_or(ProductionError::CredentialMissing {
                provider: "runway".to_string(),
            })?;
        Ok(Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn ratio_for(aspect_ratio: &str) -> &'static str {
        match aspect_ratio {
            "9:16" => "768:1280",
            _ => "1280:768",
        }
    }
}

#[async_trait]
impl VideoProvider for RunwayProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "runway".to_string(),
            capabilities: vec![Capability::ImageToVideo],
            min_duration_sec: 5.0,
            max_duration_sec: 10.0,
            aspect_ratios: vec!["16:9".to_string(), "9:16".to_string()],
            status: ImplementationStatus::Implemented,
            requires_seed_image: true,
        }
    }

    async fn generate(&self, request: &VideoRequest) -> ProductionResult<GenerateOutcome> {
        let Some(seed_image) = &request.seed_image_url else {
            return Err(ProductionError::ProviderPermanent(
                "runway gen3a requires a seed image".to_string(),
            ));
        };
        let duration = if request.duration_sec <= 7.5 { 5 } else { 10 };

        let response = self
            .client
            .post(format!("{}/v1/image_to_video", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .json(&json!({
                "model": "gen3a_turbo",
                "promptImage": seed_image,
                "promptText": request.prompt,
                "duration": duration,
                "ratio": Self::ratio_for(&request.aspect_ratio),
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let value: serde_json::Value = response.json().await.map_err(classify_transport)?;
        if !status.is_success() {
            let detail = value
                .get("error")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("runway task creation failed with {status}"));
            return Err(classify_status(status, detail));
        }

        let Some(id) = value.get("id").and_then(|v| v.as_str()) else {
            return Ok(GenerateOutcome::Failed(
                "runway response carried no task id".to_string(),
            ));
        };

        Ok(GenerateOutcome::Pending(JobHandle {
            job_id: id.to_string(),
            provider_tag: "runway".to_string(),
            next_poll_after: Duration::from_secs(5),
            estimated_cost_usd: self.estimate_cost(request.duration_sec, &request.options),
            expected_duration_sec: duration as f64,
        }))
    }

    async fn poll(&self, job_id: &str) -> ProductionResult<JobState> {
        let response = self
            .client
            .get(format!("{}/v1/tasks/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let value: serde_json::Value = response.json().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(
                status,
                format!("runway status check failed with {status}"),
            ));
        }

        let state = value.get("status").and_then(|v| v.as_str()).unwrap_or("");
        Ok(match state {
            "PENDING" | "THROTTLED" => JobState::Queued,
            "RUNNING" => JobState::Running,
            "SUCCEEDED" => match value
                .get("output")
                .and_then(|o| o.get(0))
                .and_then(|v| v.as_str())
            {
                Some(url) => JobState::Succeeded {
                    url: url.to_string(),
                },
                None => JobState::Failed {
                    reason: "task succeeded without output".to_string(),
                },
            },
            "FAILED" => JobState::Failed {
                reason: value
                    .get("failure")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown failure")
                    .to_string(),
            },
            "CANCELLED" => JobState::Cancelled,
            other => JobState::Failed {
                reason: format!("unexpected runway status `{other}`"),
            },
        })
    }

    async fn cancel(&self, job_id: &str) -> ProductionResult<()> {
        let _ = self
            .client
            .delete(format!("{}/v1/tasks/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .send()
            .await;
        Ok(())
    }

    async fn download(&self, url: &str, local_path: &Path) -> ProductionResult<u64> {
        download_to_file(&self.client, url, local_path).await
    }

    fn estimate_cost(
        &self,
        duration_sec: f64,
        _options: &BTreeMap<String, serde_json::Value>,
    ) -> f64 {
        let duration = if duration_sec <= 7.5 { 5.0 } else { 10.0 };
        duration * COST_PER_SECOND
    }

    async fn validate_credentials(&self) -> bool {
        // An authenticated 404 still proves the key works.
        let result = self
            .client
            .get(format!("{}/v1/tasks/credential-probe", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
            .send()
            .await;
        matches!(
            result,
            Ok(response) if response.status().is_success()
                || response.status() == reqwest::StatusCode::NOT_FOUND
        )
    }
}
