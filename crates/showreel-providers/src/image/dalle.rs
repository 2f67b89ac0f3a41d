// DALL-E 3 image generation: immediate submission, URL in one round trip.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{
    Capability, ImageProvider, ImageResult, ImplementationStatus, ProviderProfile,
};
use crate::retry::{classify_status, classify_transport};
use crate::secrets::resolve_secret;

const BASE_URL: &str = "https://api.openai.com/v1";

// (size, quality) -> USD
const COST_TABLE: [((&str, &str), f64); 6] = [
    (("1024x1024", "standard"), 0.04),
    (("1024x1024", "hd"), 0.08),
    (("1792x1024", "standard"), 0.08),
    (("1792x1024", "hd"), 0.12),
    (("1024x1792", "standard"), 0.08),
    (("1024x1792", "hd"), 0.12),
];

pub struct DalleProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for DalleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DalleProvider")
            .field("api_key", &crate::secrets::mask_secret(Some(&self.api_key)))
            .finish()
    }
}

impl DalleProvider {
    pub fn from_env() -> ProductionResult<Self> {
        let api_key =
            resolve_secret("OPENAI_API_KEY").ok_or(ProductionError::CredentialMissing {
                provider: "dalle".to_string(),
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
}

#[async_trait]
impl ImageProvider for DalleProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: "dalle".to_string(),
            capabilities: vec![Capability::TextToImage],
            min_duration_sec: 0.0,
            max_duration_sec: 0.0,
            aspect_ratios: vec!["1:1".to_string(), "16:9".to_string(), "9:16".to_string()],
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        size: &str,
        options: &BTreeMap<String, serde_json::Value>,
    ) -> ProductionResult<ImageResult> {
        let quality = options
            .get("quality")
            .and_then(|v| v.as_str())
            .unwrap_or("standard");

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": "dall-e-3",
                "prompt": prompt,
                "size": size,
                "quality": quality,
                "n": 1,
            }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let value: serde_json::Value = response.json().await.map_err(classify_transport)?;
        if !status.is_success() {
            let detail = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("image generation failed with {status}"));
            return Err(classify_status(status, detail));
        }

        let url = value
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|item| item.get("url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let (width, height) = match size.split_once('x') {
            Some((w, h)) => (w.parse().unwrap_or(1024), h.parse().unwrap_or(1024)),
            None => (1024, 1024),
        };

        Ok(ImageResult {
            url,
            local_path: None,
            width,
            height,
            cost_usd: self.estimate_cost(size, options),
        })
    }

    fn estimate_cost(&self, size: &str, options: &BTreeMap<String, serde_json::Value>) -> f64 {
        let quality = options
            .get("quality")
            .and_then(|v| v.as_str())
            .unwrap_or("standard");
        COST_TABLE
            .iter()
            .find(|((s, q), _)| *s == size && *q == quality)
            .map(|(_, cost)| *cost)
            .unwrap_or(0.04)
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
    fn hd_widescreen_costs_more_than_standard_square() {
        let provider = DalleProvider {
            api_key: "k".into(),
            base_url: BASE_URL.into(),
            client: Client::new(),
        };
        let standard = provider.estimate_cost("1024x1024", &BTreeMap::new());
        let mut options = BTreeMap::new();
        options.insert("quality".into(), json!("hd"));
        let hd_wide = provider.estimate_cost("1792x1024", &options);
        assert!(hd_wide > standard);
        assert_eq!(hd_wide, 0.12);
    }
}
