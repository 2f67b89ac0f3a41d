use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user's production request. Immutable after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brief {
    pub concept: String,
    pub target_duration_sec: f64,
    pub total_budget_usd: f64,
    #[serde(default)]
    pub seed_assets: Vec<SeedAsset>,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default)]
    pub audio_tier: AudioTier,
    #[serde(default)]
    pub project_name: String,
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

impl Brief {
    pub fn new(concept: impl Into<String>, target_duration_sec: f64, total_budget_usd: f64) -> Self {
        Self {
            concept: concept.into(),
            target_duration_sec,
            total_budget_usd,
            seed_assets: Vec::new(),
            aspect_ratio: default_aspect_ratio(),
            audio_tier: AudioTier::default(),
            project_name: String::new(),
        }
    }

    pub fn budget_per_second(&self) -> f64 {
        if self.target_duration_sec > 0.0 {
            self.total_budget_usd / self.target_duration_sec
        } else {
            0.0
        }
    }
}

/// Declared role of a seed asset within the production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedAssetRole {
    Logo,
    Character,
    Reference,
    Background,
    Document,
}

/// A user-supplied input asset with a declared role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAsset {
    pub asset_id: String,
    pub role: SeedAssetRole,
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SeedAsset {
    pub fn new(role: SeedAssetRole, path: impl Into<String>) -> Self {
        Self {
            asset_id: Uuid::new_v4().to_string(),
            role,
            path: path.into(),
            description: String::new(),
            tags: Vec::new(),
        }
    }
}

/// Audio production tiers with increasing sync complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioTier {
    None,
    MusicOnly,
    #[default]
    SimpleOverlay,
    TimeSynced,
    FullProduction,
}

impl AudioTier {
    pub fn wants_voiceover(&self) -> bool {
        matches!(
            self,
            AudioTier::SimpleOverlay | AudioTier::TimeSynced | AudioTier::FullProduction
        )
    }

    pub fn wants_music(&self) -> bool {
        matches!(
            self,
            AudioTier::MusicOnly | AudioTier::TimeSynced | AudioTier::FullProduction
        )
    }
}

impl std::fmt::Display for AudioTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioTier::None => write!(f, "none"),
            AudioTier::MusicOnly => write!(f, "music_only"),
            AudioTier::SimpleOverlay => write!(f, "simple_overlay"),
            AudioTier::TimeSynced => write!(f, "time_synced"),
            AudioTier::FullProduction => write!(f, "full_production"),
        }
    }
}
