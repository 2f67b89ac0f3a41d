// Edit decision list wire format. Serialization is byte-stable: no
// unordered maps appear anywhere in the serialized form, so
// serialize -> parse -> serialize reproduces identical bytes.

use serde::{Deserialize, Serialize};

/// Closed transition set. Fades are legal only at the very first and very
/// last clip; everything between is a cut or a symmetric cross-dissolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Cut,
    Dissolve,
    FadeIn,
    FadeOut,
}

impl TransitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionType::Cut => "cut",
            TransitionType::Dissolve => "dissolve",
            TransitionType::FadeIn => "fade_in",
            TransitionType::FadeOut => "fade_out",
        }
    }
}

/// Logical audio track types with per-type default gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Voiceover,
    Music,
    Sfx,
    Ambient,
}

impl TrackType {
    pub fn default_gain_db(&self) -> f64 {
        match self {
            TrackType::Voiceover => 0.0,
            TrackType::Music => -18.0,
            TrackType::Sfx => -6.0,
            TrackType::Ambient => -12.0,
        }
    }
}

/// An audio track to be mixed into the final render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: String,
    pub track_type: TrackType,
    pub start_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub volume_db: f64,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
    /// Extra attenuation applied while overlapping a voiceover track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duck_db: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
}

impl AudioTrack {
    pub fn new(path: impl Into<String>, track_type: TrackType, start_time: f64) -> Self {
        Self {
            path: path.into(),
            track_type,
            start_time,
            duration: None,
            volume_db: track_type.default_gain_db(),
            fade_in: 0.0,
            fade_out: 0.0,
            duck_db: None,
            scene_id: None,
        }
    }

    pub fn end_time(&self) -> Option<f64> {
        self.duration.map(|d| self.start_time + d)
    }
}

/// One edit decision for one scene of a candidate cut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditDecision {
    pub scene_id: String,
    pub selected_variation: u32,
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub in_point: f64,
    pub out_point: f64,
    pub transition_in: TransitionType,
    pub transition_in_duration: f64,
    pub transition_out: TransitionType,
    pub transition_out_duration: f64,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_overlay: Option<String>,
    pub text_position: String,
    pub text_style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One complete candidate cut with a distinct editorial style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditCandidate {
    pub candidate_id: String,
    pub name: String,
    pub style: String,
    pub total_duration: f64,
    pub estimated_quality: f64,
    pub description: String,
    pub decisions: Vec<EditDecision>,
    #[serde(default)]
    pub continuity_issues: Vec<String>,
    #[serde(default = "default_continuity_score")]
    pub continuity_score: f64,
}

fn default_continuity_score() -> f64 {
    100.0
}

/// Collection of candidate cuts; one is marked recommended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditDecisionList {
    pub edl_id: String,
    pub project_name: String,
    pub total_scenes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_candidate_id: Option<String>,
    pub candidates: Vec<EditCandidate>,
}

impl EditDecisionList {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn recommended(&self) -> Option<&EditCandidate> {
        let id = self.recommended_candidate_id.as_deref()?;
        self.candidates.iter().find(|c| c.candidate_id == id)
    }

    pub fn candidate(&self, candidate_id: &str) -> Option<&EditCandidate> {
        self.candidates
            .iter()
            .find(|c| c.candidate_id == candidate_id)
    }
}

/// Check the trim invariant for every decision of a candidate against the
/// durations of the assets it references.
pub fn validate_trims(
    candidate: &EditCandidate,
    asset_duration: impl Fn(&str) -> Option<f64>,
) -> Vec<String> {
    let mut violations = Vec::new();
    for decision in &candidate.decisions {
        if decision.in_point < 0.0 || decision.in_point > decision.out_point {
            violations.push(format!(
                "scene `{}`: in_point {} exceeds out_point {}",
                decision.scene_id, decision.in_point, decision.out_point
            ));
        }
        if let Some(duration) = asset_duration(&decision.video_url) {
            if decision.out_point > duration + 1e-6 {
                violations.push(format!(
                    "scene `{}`: out_point {} exceeds asset duration {}",
                    decision.scene_id, decision.out_point, duration
                ));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_edl() -> EditDecisionList {
        let decision = |scene: &str, variation: u32| EditDecision {
            scene_id: scene.to_string(),
            selected_variation: variation,
            video_url: format!("videos/{scene}_v{variation}.mp4"),
            audio_url: Some(format!("audio/{scene}_vo.mp3")),
            in_point: 0.0,
            out_point: 5.0,
            transition_in: TransitionType::Dissolve,
            transition_in_duration: 0.5,
            transition_out: TransitionType::Cut,
            transition_out_duration: 0.0,
            start_time: 0.0,
            duration: 5.0,
            text_overlay: Some("Key concept".to_string()),
            text_position: "bottom-left".to_string(),
            text_style: "default".to_string(),
            text_start_time: Some(0.5),
            text_duration: Some(3.0),
            notes: None,
        };

        EditDecisionList {
            edl_id: "edl-1".to_string(),
            project_name: "Demo".to_string(),
            total_scenes: 3,
            recommended_candidate_id: Some("cand-a".to_string()),
            candidates: vec![
                EditCandidate {
                    candidate_id: "cand-a".to_string(),
                    name: "Safe Cut".to_string(),
                    style: "safe".to_string(),
                    total_duration: 15.0,
                    estimated_quality: 82.0,
                    description: "Straight cuts".to_string(),
                    decisions: vec![
                        decision("scene_000", 0),
                        decision("scene_001", 1),
                        decision("scene_002", 0),
                    ],
                    continuity_issues: Vec::new(),
                    continuity_score: 100.0,
                },
                EditCandidate {
                    candidate_id: "cand-b".to_string(),
                    name: "Dynamic Edit".to_string(),
                    style: "dynamic".to_string(),
                    total_duration: 15.0,
                    estimated_quality: 78.0,
                    description: "Cross-dissolves".to_string(),
                    decisions: vec![
                        decision("scene_000", 1),
                        decision("scene_001", 0),
                        decision("scene_002", 1),
                    ],
                    continuity_issues: Vec::new(),
                    continuity_score: 100.0,
                },
            ],
        }
    }

    #[test]
    fn serialize_parse_serialize_is_byte_stable() {
        let edl = sample_edl();
        let first = edl.to_json().unwrap();
        let reparsed = EditDecisionList::from_json(&first).unwrap();
        let second = reparsed.to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn trim_validation_flags_out_of_range_points() {
        let mut edl = sample_edl();
        edl.candidates[0].decisions[1].out_point = 9.0;
        let violations = validate_trims(&edl.candidates[0], |_| Some(5.0));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("scene_001"));
    }

    #[test]
    fn music_gain_defaults_below_voiceover() {
        assert!(TrackType::Music.default_gain_db() < TrackType::Voiceover.default_gain_db());
        assert_eq!(TrackType::Music.default_gain_db(), -18.0);
    }

    #[test]
    fn recommended_lookup_follows_the_marker() {
        let edl = sample_edl();
        assert_eq!(edl.recommended().unwrap().candidate_id, "cand-a");
    }
}
