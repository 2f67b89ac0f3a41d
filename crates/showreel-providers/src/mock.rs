// Deterministic mock providers, one per capability. Used when credentials
// are missing or mock mode is explicit. Results are schema-valid with
// realistic durations; costs are simulated and never debit real money.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::json;

use showreel_types::ProductionResult;

use crate::contract::{
    AudioProvider, AudioRequest, AudioResult, Capability, GenerateOutcome, ImageProvider,
    ImageResult, ImplementationStatus, JobState, MediaRef, MusicProvider, MusicResult,
    ProviderProfile, VideoProvider, VideoRequest, Voice,
};

pub const MOCK_PROVIDER_NAME: &str = "mock";

const SIMULATED_VIDEO_COST_PER_SECOND: f64 = 0.05;
const SIMULATED_AUDIO_COST_PER_CHAR: f64 = 0.000_015;

async fn write_placeholder(local_path: &Path, label: &str) -> ProductionResult<u64> {
    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| showreel_types::ProductionError::ProviderTransient(e.to_string()))?;
    }
    let bytes = format!("MOCK-MEDIA {label}\n").into_bytes();
    tokio::fs::write(local_path, &bytes)
        .await
        .map_err(|e| showreel_types::ProductionError::ProviderTransient(e.to_string()))?;
    Ok(bytes.len() as u64)
}

#[derive(Default)]
pub struct MockVideoProvider {
    generation_count: AtomicU32,
}

impl MockVideoProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoProvider for MockVideoProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: MOCK_PROVIDER_NAME.to_string(),
            capabilities: vec![Capability::TextToVideo, Capability::ImageToVideo],
            min_duration_sec: 1.0,
            max_duration_sec: 60.0,
            aspect_ratios: vec!["16:9".to_string(), "9:16".to_string(), "1:1".to_string()],
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn generate(&self, request: &VideoRequest) -> ProductionResult<GenerateOutcome> {
        let n = self.generation_count.fetch_add(1, Ordering::SeqCst) + 1;
        let job_id = format!("mock_job_{n}");
        let simulated = self.estimate_cost(request.duration_sec, &request.options);

        let mut metadata = BTreeMap::new();
        metadata.insert("job_id".to_string(), json!(job_id));
        metadata.insert("simulated_cost_usd".to_string(), json!(simulated));
        metadata.insert("aspect_ratio".to_string(), json!(request.aspect_ratio));
        metadata.insert("provider".to_string(), json!(MOCK_PROVIDER_NAME));

        // No external job exists, so the outcome is terminal immediately.
        Ok(GenerateOutcome::Succeeded(MediaRef {
            url: format!("mock://videos/{job_id}.mp4"),
            duration_sec: request.duration_sec,
            cost_usd: 0.0,
            metadata,
        }))
    }

    async fn poll(&self, job_id: &str) -> ProductionResult<JobState> {
        Ok(JobState::Succeeded {
            url: format!("mock://videos/{job_id}.mp4"),
        })
    }

    async fn download(&self, url: &str, local_path: &Path) -> ProductionResult<u64> {
        write_placeholder(local_path, url).await
    }

    /// Simulated pricing: callers may pass a `cost_per_second` hint (the
    /// tier's cost model) so estimates line up with live planning.
    fn estimate_cost(
        &self,
        duration_sec: f64,
        options: &BTreeMap<String, serde_json::Value>,
    ) -> f64 {
        let per_second = options
            .get("cost_per_second")
            .and_then(|v| v.as_f64())
            .unwrap_or(SIMULATED_VIDEO_COST_PER_SECOND);
        duration_sec * per_second
    }

    async fn validate_credentials(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct MockAudioProvider;

#[async_trait]
impl AudioProvider for MockAudioProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: MOCK_PROVIDER_NAME.to_string(),
            capabilities: vec![Capability::TextToSpeech],
            min_duration_sec: 0.5,
            max_duration_sec: 600.0,
            aspect_ratios: Vec::new(),
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn synthesize(&self, request: &AudioRequest) -> ProductionResult<AudioResult> {
        // ~150 words per minute at normal speed.
        let words = request.text.split_whitespace().count().max(1) as f64;
        let speed = if request.speed > 0.0 { request.speed } else { 1.0 };
        let duration_sec = words / (150.0 * speed) * 60.0;

        Ok(AudioResult {
            bytes: Some(format!("MOCK-AUDIO {}\n", request.text.len()).into_bytes()),
            url: None,
            duration_sec,
            format: "mp3".to_string(),
            sample_rate: 44_100,
            cost_usd: 0.0,
        })
    }

    async fn list_voices(&self) -> ProductionResult<Vec<Voice>> {
        Ok(vec![Voice {
            voice_id: "mock-voice".to_string(),
            name: "Mock Voice".to_string(),
            description: "Deterministic test voice".to_string(),
        }])
    }

    fn estimate_cost(&self, text: &str, _options: &BTreeMap<String, serde_json::Value>) -> f64 {
        text.len() as f64 * SIMULATED_AUDIO_COST_PER_CHAR
    }

    async fn validate_credentials(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct MockImageProvider {
    generation_count: AtomicU32,
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: MOCK_PROVIDER_NAME.to_string(),
            capabilities: vec![Capability::TextToImage],
            min_duration_sec: 0.0,
            max_duration_sec: 0.0,
            aspect_ratios: vec!["1:1".to_string(), "16:9".to_string()],
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn generate(
        &self,
        _prompt: &str,
        size: &str,
        _options: &BTreeMap<String, serde_json::Value>,
    ) -> ProductionResult<ImageResult> {
        let n = self.generation_count.fetch_add(1, Ordering::SeqCst) + 1;
        let (width, height) = match size.split_once('x') {
            Some((w, h)) => (w.parse().unwrap_or(1024), h.parse().unwrap_or(1024)),
            None => (1024, 1024),
        };
        Ok(ImageResult {
            url: Some(format!("mock://images/mock_image_{n}.png")),
            local_path: None,
            width,
            height,
            cost_usd: 0.0,
        })
    }

    fn estimate_cost(&self, _size: &str, _options: &BTreeMap<String, serde_json::Value>) -> f64 {
        0.04
    }

    async fn validate_credentials(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct MockMusicProvider;

#[async_trait]
impl MusicProvider for MockMusicProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: MOCK_PROVIDER_NAME.to_string(),
            capabilities: vec![Capability::MusicGeneration],
            min_duration_sec: 5.0,
            max_duration_sec: 300.0,
            aspect_ratios: Vec::new(),
            status: ImplementationStatus::Implemented,
            requires_seed_image: false,
        }
    }

    async fn generate(
        &self,
        mood: &str,
        duration_sec: f64,
        _tempo: &str,
        _options: &BTreeMap<String, serde_json::Value>,
    ) -> ProductionResult<MusicResult> {
        Ok(MusicResult {
            url: Some(format!("mock://music/{mood}.mp3")),
            local_path: None,
            duration_sec,
            format: "mp3".to_string(),
            cost_usd: 0.0,
        })
    }

    fn estimate_cost(
        &self,
        duration_sec: f64,
        _options: &BTreeMap<String, serde_json::Value>,
    ) -> f64 {
        duration_sec * 0.002
    }

    async fn validate_credentials(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_video_is_terminal_immediately_and_free() {
        let provider = MockVideoProvider::new();
        let request = VideoRequest {
            prompt: "logo reveal".into(),
            duration_sec: 5.0,
            aspect_ratio: "16:9".into(),
            seed_image_url: None,
            options: BTreeMap::new(),
        };

        match provider.generate(&request).await.unwrap() {
            GenerateOutcome::Succeeded(media) => {
                assert_eq!(media.duration_sec, 5.0);
                assert_eq!(media.cost_usd, 0.0);
                assert!(media.metadata.contains_key("simulated_cost_usd"));
            }
            other => panic!("expected immediate success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mock_download_writes_bytes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videos/scene_000_v0.mp4");
        let provider = MockVideoProvider::new();
        let written = provider
            .download("mock://videos/mock_job_1.mp4", &path)
            .await
            .unwrap();
        assert!(written > 0);
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn mock_audio_duration_tracks_word_count() {
        let provider = MockAudioProvider;
        let short = provider
            .synthesize(&AudioRequest {
                text: "hello world".into(),
                speed: 1.0,
                ..Default::default()
            })
            .await
            .unwrap();
        let long = provider
            .synthesize(&AudioRequest {
                text: "hello world ".repeat(30),
                speed: 1.0,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(long.duration_sec > short.duration_sec);
        assert_eq!(long.cost_usd, 0.0);
    }
}
