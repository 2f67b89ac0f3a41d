// Audio planning configuration and track assembly helpers.

use serde::{Deserialize, Serialize};

use showreel_edl::{AudioTrack, TrackType};
use showreel_types::Scene;

/// How strictly voiceover must align with visual cues. The planner only
/// passes the tolerance through; TIME_SYNCED and FULL_PRODUCTION share the
/// same pipeline shape and differ by this switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncProfile {
    #[default]
    Loose,
    Strict,
}

impl SyncProfile {
    pub fn tolerance_sec(&self) -> f64 {
        match self {
            SyncProfile::Loose => 0.5,
            SyncProfile::Strict => 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sync_profile: SyncProfile,
    pub voice_id: Option<String>,
    pub speed: f64,
    pub music_mood: String,
    pub music_tempo: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sync_profile: SyncProfile::Loose,
            voice_id: None,
            speed: 1.0,
            music_mood: "ambient".to_string(),
            music_tempo: "medium".to_string(),
        }
    }
}

/// Timeline start offset for each scene, in ordinal order.
pub fn scene_offsets(scenes: &[Scene]) -> Vec<(String, f64)> {
    let mut ordered: Vec<&Scene> = scenes.iter().collect();
    ordered.sort_by_key(|s| s.ordinal);

    let mut offsets = Vec::with_capacity(ordered.len());
    let mut position = 0.0;
    for scene in ordered {
        offsets.push((scene.scene_id.clone(), position));
        position += scene.target_duration_sec;
    }
    offsets
}

/// Build a voiceover track positioned at its scene's timeline offset.
pub fn voiceover_track(
    path: String,
    scene_id: &str,
    start_time: f64,
    duration_sec: f64,
) -> AudioTrack {
    let mut track = AudioTrack::new(path, TrackType::Voiceover, start_time);
    track.duration = Some(duration_sec);
    track.scene_id = Some(scene_id.to_string());
    track
}

/// Build the single full-length music bed.
pub fn music_track(path: String, total_duration_sec: f64) -> AudioTrack {
    let mut track = AudioTrack::new(path, TrackType::Music, 0.0);
    track.duration = Some(total_duration_sec);
    track.fade_in = 0.5;
    track.fade_out = 0.5;
    track
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate_in_ordinal_order() {
        let scenes = vec![
            Scene::new(1, "b", 5.0),
            Scene::new(0, "a", 4.0),
            Scene::new(2, "c", 6.0),
        ];
        let offsets = scene_offsets(&scenes);
        assert_eq!(
            offsets,
            vec![
                ("scene_000".to_string(), 0.0),
                ("scene_001".to_string(), 4.0),
                ("scene_002".to_string(), 9.0),
            ]
        );
    }

    #[test]
    fn strict_profile_tightens_tolerance() {
        assert!(SyncProfile::Strict.tolerance_sec() < SyncProfile::Loose.tolerance_sec());
    }

    #[test]
    fn tracks_carry_type_default_gains() {
        let vo = voiceover_track("audio/scene_000_vo.mp3".into(), "scene_000", 0.0, 4.0);
        assert_eq!(vo.volume_db, 0.0);
        let music = music_track("audio/music_bed.mp3".into(), 30.0);
        assert_eq!(music.volume_db, -18.0);
        assert_eq!(music.end_time(), Some(30.0));
    }
}
