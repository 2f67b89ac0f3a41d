// Luma Dream Machine: text-to-video and image-to-video with job polling.
// Durations snap to the API's 5s/9s buckets.

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

const BASE_URL: &str = "https://api.lumalabs.ai/dream-machine/v1";
const PROMPT_LIMIT: usize = 2000;

// (resolution, duration bucket) -> USD
const COST_MAP: [((&str, &str), f64); 6] = [
    (("540p", "5s"), 0.20),
    (("540p", "9s"), 0.36),
    (("720p", "5s"), 0.40),
    (("720p", "9s"), 0.72),
    (("1080p", "5s"), 0.80),
    (("1080p", "9s"), 1.44),
];

const ASPECT_RATIOS: [&str; 7] = ["1:1", "16:9", "9:16", "4:3", "3:4", "21:9", "9:21"];

pub struct LumaProvider {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl std::fmt::Debug for LumaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LumaProvider")
            .field("api_key", &crate::secrets::mask_secret(Some(&self.api_key)))
            .field("model", &self.model)
            .finish()
    }
}

impl LumaProvider {
    pub fn from_env() -> ProductionResult<Self> {
        let api_key = resolve_secret("LUMA_API_KEY").ok_or(ProductionError::CredentialMissing {
            provider: "luma".to_string(),
        })?;
        Ok(Self {
            api_key,
            base_url: BASE_URL.to_string(),
            model: "ray-2".to_string(),
            client: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn duration_bucket(duration_sec: f64) -> (&'static str, f64) {
        if duration_sec <= 7.0 {
            ("5s", 5.0)
        } else {
            ("9s", 9.0)
        }
    }

    fn normalize_aspect_ratio(aspect_ratio: &str) -> &str {
        if ASPECT_RATIOS.contains(&aspect_ratio) {
            return ASPECT_RATIOS
                .iter()
                .find(|r| **r == aspect_ratio)
                .copied()
                .unwrap_or("16:9");
        }
        match aspect_ratio {
            "1920:1080" | "1280:720" => "16:9",
            "1080:1920" | "720:1280" => "9:16",
            _ => "16:9",
        }
    }
}

#[async_trait]
impl VideoProvider for LumaProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "luma".to_string(),
            capabilities: vec![Capability::TextToVideo, Capability::ImageToVideo],
            min_duration_sec: 5.0,
            max_duration_sec: 9.0,
            aspect_ratios: ASPECT_RATIOS.iter().map(|r| r.to_string()).collect(),
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn generate(&self, request: &VideoRequest) -> ProductionResult<GenerateOutcome> {
        let (bucket, actual_duration) = Self::duration_bucket(request.duration_sec);
        let aspect_ratio = Self::normalize_aspect_ratio(&request.aspect_ratio);

        let prompt: String = request.prompt.chars().take(PROMPT_LIMIT).collect();
        let mut body = json!({
            "prompt": prompt,
            "model": self.model,
            "aspect_ratio": aspect_ratio,
            "duration": bucket,
            "loop": false,
        });
        if let Some(seed_url) = &request.seed_image_url {
            body["keyframes"] = json!({
                "frame0": { "type": "image", "url": seed_url }
            });
        }

        let response = self
            .client
            .post(format!("{}/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let value: serde_json::Value = response.json().await.map_err(classify_transport)?;
        if !status.is_success() {
            let detail = value
                .get("detail")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("luma generation request failed with {status}"));
            return Err(classify_status(status, detail));
        }

        let Some(id) = value.get("id").and_then(|v| v.as_str()) else {
            return Ok(GenerateOutcome::Failed(
                "luma response carried no generation id".to_string(),
            ));
        };

        Ok(GenerateOutcome::Pending(JobHandle {
            job_id: id.to_string(),
            provider_tag: "luma".to_string(),
            next_poll_after: Duration::from_secs(5),
            estimated_cost_usd: self.estimate_cost(request.duration_sec, &request.options),
            expected_duration_sec: actual_duration,
        }))
    }

    async fn poll(&self, job_id: &str) -> ProductionResult<JobState> {
        let response = self
            .client
            .get(format!("{}/generations/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let value: serde_json::Value = response.json().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(
                status,
                format!("luma status check failed with {status}"),
            ));
        }

        let state = value.get("state").and_then(|v| v.as_str()).unwrap_or("");
        Ok(match state {
            "queued" => JobState::Queued,
            "dreaming" => JobState::Running,
            "completed" => match value
                .get("assets")
                .and_then(|a| a.get("video"))
                .and_then(|v| v.as_str())
            {
                Some(url) => JobState::Succeeded {
                    url: url.to_string(),
                },
                None => JobState::Failed {
                    reason: "generation completed without a video asset".to_string(),
                },
            },
            "failed" => JobState::Failed {
                reason: value
                    .get("failure_reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown failure")
                    .to_string(),
            },
            other => JobState::Failed {
                reason: format!("unexpected luma state `{other}`"),
            },
        })
    }

    async fn cancel(&self, job_id: &str) -> ProductionResult<()> {
        let _ = self
            .client
            .delete(format!("{}/generations/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
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
        options: &BTreeMap<String, serde_json::Value>,
    ) -> f64 {
        let resolution = options
            .get("resolution")
            .and_then(|v| v.as_str())
            .unwrap_or("720p");
        let (bucket, _) = Self::duration_bucket(duration_sec);
        COST_MAP
            .iter()
            .find(|((res, dur), _)| *res == resolution && *dur == bucket)
            .map(|(_, cost)| *cost)
            .unwrap_or(0.40)
    }

    async fn validate_credentials(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/generations?limit=1", self.base_url))
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
    fn durations_snap_to_api_buckets() {
        assert_eq!(LumaProvider::duration_bucket(3.0), ("5s", 5.0));
        assert_eq!(LumaProvider::duration_bucket(7.0), ("5s", 5.0));
        assert_eq!(LumaProvider::duration_bucket(8.0), ("9s", 9.0));
    }

    #[test]
    fn dimension_style_ratios_normalize() {
        assert_eq!(LumaProvider::normalize_aspect_ratio("1920:1080"), "16:9");
        assert_eq!(LumaProvider::normalize_aspect_ratio("9:16"), "9:16");
        assert_eq!(LumaProvider::normalize_aspect_ratio("weird"), "16:9");
    }

    #[test]
    fn cost_uses_resolution_and_bucket() {
        let provider = LumaProvider {
            api_key: "test".into(),
            base_url: BASE_URL.into(),
            model: "ray-2".into(),
            client: Client::new(),
        };
        let mut options = BTreeMap::new();
        assert_eq!(provider.estimate_cost(5.0, &options), 0.40);
        options.insert("resolution".into(), serde_json::json!("1080p"));
        assert_eq!(provider.estimate_cost(9.0, &options), 1.44);
    }

    #[test]
    fn debug_masks_the_api_key() {
        let provider = LumaProvider {
            api_key: "luma-secret-key-123456".into(),
            base_url: BASE_URL.into(),
            model: "ray-2".into(),
            client: Client::new(),
        };
        let rendered = format!("{provider:?}");
        assert!(!rendered.contains("luma-secret-key-123456"));
    }
}
