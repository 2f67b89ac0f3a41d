use serde::{Deserialize, Serialize};

/// One contiguous clip in the final video; the atomic unit of generation.
/// Ordinals are contiguous from 0 within a pilot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub scene_id: String,
    pub ordinal: u32,
    pub title: String,
    pub description: String,
    pub target_duration_sec: f64,
    #[serde(default)]
    pub visual_elements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_text: Option<String>,
}

impl Scene {
    pub fn new(ordinal: u32, title: impl Into<String>, target_duration_sec: f64) -> Self {
        Self {
            scene_id: format!("scene_{ordinal:03}"),
            ordinal,
            title: title.into(),
            description: String::new(),
            target_duration_sec,
            visual_elements: Vec::new(),
            voiceover_text: None,
        }
    }
}

/// Verify that scene ordinals form the contiguous range `0..len`.
pub fn ordinals_contiguous(scenes: &[Scene]) -> bool {
    let mut ordinals: Vec<u32> = scenes.iter().map(|s| s.ordinal).collect();
    ordinals.sort_unstable();
    ordinals
        .iter()
        .enumerate()
        .all(|(idx, ordinal)| *ordinal == idx as u32)
}
