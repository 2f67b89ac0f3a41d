use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Music,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Image => write!(f, "image"),
            MediaKind::Music => write!(f, "music"),
        }
    }
}

/// A generated artifact. Immutable after creation apart from the
/// quality-score assignment done by QA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub asset_id: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(default)]
    pub cost_usd: f64,
    pub provider_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl MediaAsset {
    pub fn new(kind: MediaKind, provider_name: impl Into<String>) -> Self {
        Self {
            asset_id: Uuid::new_v4().to_string(),
            kind,
            scene_id: None,
            local_path: None,
            remote_url: None,
            duration_sec: None,
            cost_usd: 0.0,
            provider_name: provider_name.into(),
            quality_score: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn for_scene(kind: MediaKind, provider_name: impl Into<String>, scene_id: &str) -> Self {
        let mut asset = Self::new(kind, provider_name);
        asset.scene_id = Some(scene_id.to_string());
        asset
    }
}
