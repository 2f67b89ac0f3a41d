use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use showreel_types::ProductionResult;

/// What a provider can do, advertised through its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TextToVideo,
    ImageToVideo,
    TextToSpeech,
    TextToImage,
    MusicGeneration,
    FileStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationStatus {
    Implemented,
    Stub,
}

/// Provider self-description: capabilities, supported ranges, and whether
/// the integration is real or a stub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub min_duration_sec: f64,
    pub max_duration_sec: f64,
    pub aspect_ratios: Vec<String>,
    pub status: ImplementationStatus,
    /// Whether a seed image is required (image-to-video only providers).
    #[serde(default)]
    pub requires_seed_image: bool,
}

/// Reference to generated media as reported by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub duration_sec: f64,
    pub cost_usd: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Opaque handle to a provider-side job. The `provider_tag` lets the
/// supervisor route polls without a global lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub provider_tag: String,
    /// Hint for the first poll delay.
    #[serde(with = "duration_secs")]
    pub next_poll_after: Duration,
    pub estimated_cost_usd: f64,
    pub expected_duration_sec: f64,
}

mod duration_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Outcome of a generate call. Immediate providers return `Succeeded`
/// directly; job-based providers return `Pending` and are driven by the
/// supervisor.
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    Pending(JobHandle),
    Succeeded(MediaRef),
    Failed(String),
}

/// Poll states for job-based providers. Terminal transitions are monotonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded { url: String },
    Failed { reason: String },
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded { .. } | JobState::Failed { .. } | JobState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct VideoRequest {
    pub prompt: String,
    pub duration_sec: f64,
    pub aspect_ratio: String,
    pub seed_image_url: Option<String>,
    pub options: BTreeMap<String, serde_json::Value>,
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn profile(&self) -> ProviderProfile;

    async fn generate(&self, request: &VideoRequest) -> ProductionResult<GenerateOutcome>;

    async fn poll(&self, job_id: &str) -> ProductionResult<JobState>;

    /// Best-effort provider-side cancel; default is a no-op.
    async fn cancel(&self, _job_id: &str) -> ProductionResult<()> {
        Ok(())
    }

    async fn download(&self, url: &str, local_path: &Path) -> ProductionResult<u64>;

    /// Never issues a network call.
    fn estimate_cost(&self, duration_sec: f64, options: &BTreeMap<String, serde_json::Value>)
        -> f64;

    async fn validate_credentials(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct AudioRequest {
    pub text: String,
    pub voice_id: Option<String>,
    pub speed: f64,
    pub options: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct AudioResult {
    pub bytes: Option<Vec<u8>>,
    pub url: Option<String>,
    pub duration_sec: f64,
    pub format: String,
    pub sample_rate: u32,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[async_trait]
pub trait AudioProvider: Send + Sync {
    fn profile(&self) -> ProviderProfile;

    async fn synthesize(&self, request: &AudioRequest) -> ProductionResult<AudioResult>;

    async fn list_voices(&self) -> ProductionResult<Vec<Voice>>;

    fn estimate_cost(&self, text: &str, options: &BTreeMap<String, serde_json::Value>) -> f64;

    async fn validate_credentials(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct ImageResult {
    pub url: Option<String>,
    pub local_path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub cost_usd: f64,
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn profile(&self) -> ProviderProfile;

    async fn generate(
        &self,
        prompt: &str,
        size: &str,
        options: &BTreeMap<String, serde_json::Value>,
    ) -> ProductionResult<ImageResult>;

    fn estimate_cost(&self, size: &str, options: &BTreeMap<String, serde_json::Value>) -> f64;

    async fn validate_credentials(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct MusicResult {
    pub url: Option<String>,
    pub local_path: Option<String>,
    pub duration_sec: f64,
    pub format: String,
    pub cost_usd: f64,
}

#[async_trait]
pub trait MusicProvider: Send + Sync {
    fn profile(&self) -> ProviderProfile;

    async fn generate(
        &self,
        mood: &str,
        duration_sec: f64,
        tempo: &str,
        options: &BTreeMap<String, serde_json::Value>,
    ) -> ProductionResult<MusicResult>;

    fn estimate_cost(&self, duration_sec: f64, options: &BTreeMap<String, serde_json::Value>)
        -> f64;

    async fn validate_credentials(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct StorageResult {
    pub file_url: Option<String>,
    pub file_path: Option<String>,
    pub size_bytes: Option<u64>,
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn upload(&self, local_path: &Path, remote_path: &str) -> ProductionResult<StorageResult>;

    async fn download(&self, remote_path: &str, local_path: &Path)
        -> ProductionResult<StorageResult>;

    async fn get_url(&self, remote_path: &str, expires_in_secs: u64) -> ProductionResult<String>;

    async fn delete(&self, remote_path: &str) -> ProductionResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_terminality() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded { url: "u".into() }.is_terminal());
        assert!(JobState::Failed { reason: "r".into() }.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[test]
    fn job_handle_serde_round_trips_poll_hint() {
        let handle = JobHandle {
            job_id: "j1".into(),
            provider_tag: "luma".into(),
            next_poll_after: Duration::from_secs(5),
            estimated_cost_usd: 0.4,
            expected_duration_sec: 5.0,
        };
        let raw = serde_json::to_string(&handle).unwrap();
        let back: JobHandle = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.next_poll_after, Duration::from_secs(5));
    }
}
