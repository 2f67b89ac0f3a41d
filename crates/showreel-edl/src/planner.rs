// Assembly Planner
// Turns a winning pilot's winning scenes into candidate edits. The plan,
// not the render: the external assembler executes it.

use std::path::Path;

use uuid::Uuid;

use showreel_types::{MediaAsset, Scene};

use crate::model::{
    validate_trims, AudioTrack, EditCandidate, EditDecision, EditDecisionList, TrackType,
    TransitionType,
};

/// A winning scene paired with its selected variation.
#[derive(Debug, Clone)]
pub struct SceneCut {
    pub scene: Scene,
    pub asset: MediaAsset,
    pub variation_index: u32,
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub max_candidates: usize,
    pub dissolve_duration: f64,
    pub fade_duration: f64,
    /// Attenuation applied to music while voiceover overlaps.
    pub duck_amount_db: f64,
    pub text_position: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            dissolve_duration: 0.5,
            fade_duration: 0.5,
            duck_amount_db: -12.0,
            text_position: "bottom-left".to_string(),
        }
    }
}

// Styles in preference order. "safe" leads so a single-candidate plan is
// the all-cuts edit.
const STYLES: [(&str, &str, &str); 3] = [
    ("safe", "Safe Cut", "Hard cuts only, full trims, no risk"),
    (
        "dynamic",
        "Dynamic Edit",
        "Cross-dissolves between every scene, fade in and out at the edges",
    ),
    (
        "balanced",
        "Balanced Cut",
        "Dissolves on alternating boundaries, fade out at the end",
    ),
];

pub struct AssemblyPlanner {
    config: PlannerConfig,
}

impl AssemblyPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Build an EDL with up to `max_candidates` stylistic candidates over
    /// the winning scenes, ordered by scene ordinal regardless of
    /// completion order.
    pub fn plan(
        &self,
        project_name: &str,
        cuts: &[SceneCut],
        audio_tracks: &[AudioTrack],
    ) -> EditDecisionList {
        let mut cuts: Vec<SceneCut> = cuts.to_vec();
        cuts.sort_by_key(|c| c.scene.ordinal);

        let mut candidates = Vec::new();
        for (style, name, description) in STYLES.iter().take(self.config.max_candidates.max(1)) {
            let mut candidate = self.build_candidate(style, name, description, &cuts, audio_tracks);
            self.check_continuity(&mut candidate, &cuts);
            candidates.push(candidate);
        }

        let recommended = candidates
            .iter()
            .max_by(|a, b| {
                (a.continuity_score, a.estimated_quality)
                    .partial_cmp(&(b.continuity_score, b.estimated_quality))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|c| c.candidate_id.clone());

        EditDecisionList {
            edl_id: format!("edl_{}", Uuid::new_v4().simple()),
            project_name: project_name.to_string(),
            total_scenes: cuts.len() as u32,
            recommended_candidate_id: recommended,
            candidates,
        }
    }

    fn build_candidate(
        &self,
        style: &str,
        name: &str,
        description: &str,
        cuts: &[SceneCut],
        audio_tracks: &[AudioTrack],
    ) -> EditCandidate {
        let last = cuts.len().saturating_sub(1);
        let mut decisions = Vec::with_capacity(cuts.len());
        let mut timeline_pos = 0.0;
        let mut quality_sum = 0.0;

        for (index, cut) in cuts.iter().enumerate() {
            let asset_duration = cut.asset.duration_sec.unwrap_or(cut.scene.target_duration_sec);
            let out_point = cut.scene.target_duration_sec.min(asset_duration);

            // Fades only at the outer edges; dissolves are symmetric
            // between clips and never applied post-concat.
            let (transition_in, in_duration) = match style {
                "dynamic" if index == 0 => (TransitionType::FadeIn, self.config.fade_duration),
                "dynamic" => (TransitionType::Dissolve, self.config.dissolve_duration),
                "balanced" if index > 0 && index % 2 == 1 => {
                    (TransitionType::Dissolve, self.config.dissolve_duration)
                }
                _ => (TransitionType::Cut, 0.0),
            };
            let (transition_out, out_duration) = match style {
                "dynamic" | "balanced" if index == last => {
                    (TransitionType::FadeOut, self.config.fade_duration)
                }
                _ => (TransitionType::Cut, 0.0),
            };

            let audio_url = audio_tracks
                .iter()
                .find(|t| {
                    t.track_type == TrackType::Voiceover
                        && t.scene_id.as_deref() == Some(cut.scene.scene_id.as_str())
                })
                .map(|t| t.path.clone());

            let text_overlay = cut.scene.visual_elements.first().cloned();
            decisions.push(EditDecision {
                scene_id: cut.scene.scene_id.clone(),
                selected_variation: cut.variation_index,
                video_url: cut
                    .asset
                    .local_path
                    .clone()
                    .or_else(|| cut.asset.remote_url.clone())
                    .unwrap_or_default(),
                audio_url,
                in_point: 0.0,
                out_point,
                transition_in,
                transition_in_duration: in_duration,
                transition_out,
                transition_out_duration: out_duration,
                start_time: timeline_pos,
                duration: out_point,
                text_start_time: text_overlay.as_ref().map(|_| 0.5),
                text_duration: text_overlay.as_ref().map(|_| (out_point - 1.0).max(1.0)),
                text_overlay,
                text_position: self.config.text_position.clone(),
                text_style: "default".to_string(),
                notes: None,
            });

            timeline_pos += out_point;
            quality_sum += cut.asset.quality_score.unwrap_or(0.0);
        }

        EditCandidate {
            candidate_id: format!("cand_{style}"),
            name: name.to_string(),
            style: style.to_string(),
            total_duration: timeline_pos,
            estimated_quality: if cuts.is_empty() {
                0.0
            } else {
                quality_sum / cuts.len() as f64
            },
            description: description.to_string(),
            decisions,
            continuity_issues: Vec::new(),
            continuity_score: 100.0,
        }
    }

    /// Validate referenced files and trim points; issues are surfaced on
    /// the candidate rather than failing the plan.
    fn check_continuity(&self, candidate: &mut EditCandidate, cuts: &[SceneCut]) {
        for decision in &candidate.decisions {
            let is_remote = decision.video_url.contains("://");
            if decision.video_url.is_empty()
                || (!is_remote && !Path::new(&decision.video_url).exists())
            {
                candidate
                    .continuity_issues
                    .push(format!("missing media file for `{}`", decision.scene_id));
            }
        }

        let violations = validate_trims(candidate, |url| {
            cuts.iter()
                .find(|c| c.asset.local_path.as_deref() == Some(url))
                .and_then(|c| c.asset.duration_sec)
        });
        candidate.continuity_issues.extend(violations);

        let penalty = 20.0 * candidate.continuity_issues.len() as f64;
        candidate.continuity_score = (100.0 - penalty).max(0.0);
    }

    /// Apply ducking: any music track overlapping a voiceover track is
    /// attenuated by the configured amount.
    pub fn apply_ducking(&self, tracks: &mut [AudioTrack]) {
        let vo_windows: Vec<(f64, f64)> = tracks
            .iter()
            .filter(|t| t.track_type == TrackType::Voiceover)
            .map(|t| (t.start_time, t.end_time().unwrap_or(f64::MAX)))
            .collect();

        for track in tracks.iter_mut() {
            if track.track_type != TrackType::Music {
                continue;
            }
            let start = track.start_time;
            let end = track.end_time().unwrap_or(f64::MAX);
            let overlaps = vo_windows
                .iter()
                .any(|(vo_start, vo_end)| start < *vo_end && *vo_start < end);
            if overlaps {
                track.duck_db = Some(self.config.duck_amount_db);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showreel_types::{MediaAsset, MediaKind};

    fn cut(ordinal: u32, duration: f64, score: f64) -> SceneCut {
        let scene = Scene::new(ordinal, format!("scene {ordinal}"), duration);
        let mut asset = MediaAsset::for_scene(MediaKind::Video, "mock", &scene.scene_id);
        asset.duration_sec = Some(duration);
        asset.quality_score = Some(score);
        asset.local_path = Some(format!("videos/{}_v0.mp4", scene.scene_id));
        SceneCut {
            scene,
            asset,
            variation_index: 0,
        }
    }

    #[test]
    fn scenes_assemble_in_ordinal_order_regardless_of_input_order() {
        let planner = AssemblyPlanner::new(PlannerConfig::default());
        let cuts = vec![cut(2, 5.0, 80.0), cut(0, 5.0, 70.0), cut(1, 5.0, 90.0)];
        let edl = planner.plan("Demo", &cuts, &[]);

        let scene_ids: Vec<&str> = edl.candidates[0]
            .decisions
            .iter()
            .map(|d| d.scene_id.as_str())
            .collect();
        assert_eq!(scene_ids, vec!["scene_000", "scene_001", "scene_002"]);
    }

    #[test]
    fn safe_candidate_is_all_cuts() {
        let planner = AssemblyPlanner::new(PlannerConfig {
            max_candidates: 1,
            ..PlannerConfig::default()
        });
        let edl = planner.plan("Demo", &[cut(0, 5.0, 80.0)], &[]);

        assert_eq!(edl.candidates.len(), 1);
        let decision = &edl.candidates[0].decisions[0];
        assert_eq!(decision.transition_in, TransitionType::Cut);
        assert_eq!(decision.transition_out, TransitionType::Cut);
        assert_eq!(decision.in_point, 0.0);
        assert_eq!(decision.out_point, 5.0);
    }

    #[test]
    fn dynamic_candidate_fades_only_at_the_edges() {
        let planner = AssemblyPlanner::new(PlannerConfig::default());
        let cuts = vec![cut(0, 5.0, 80.0), cut(1, 5.0, 80.0), cut(2, 5.0, 80.0)];
        let edl = planner.plan("Demo", &cuts, &[]);

        let dynamic = edl.candidate("cand_dynamic").unwrap();
        assert_eq!(dynamic.decisions[0].transition_in, TransitionType::FadeIn);
        assert_eq!(dynamic.decisions[1].transition_in, TransitionType::Dissolve);
        assert_eq!(dynamic.decisions[2].transition_out, TransitionType::FadeOut);
        // No fade ever appears mid-timeline.
        for decision in &dynamic.decisions[..2] {
            assert_ne!(decision.transition_out, TransitionType::FadeOut);
        }
        for decision in &dynamic.decisions[1..] {
            assert_ne!(decision.transition_in, TransitionType::FadeIn);
        }
    }

    #[test]
    fn missing_files_mark_continuity_issues() {
        let planner = AssemblyPlanner::new(PlannerConfig::default());
        let edl = planner.plan("Demo", &[cut(0, 5.0, 80.0)], &[]);
        let candidate = &edl.candidates[0];
        assert_eq!(candidate.continuity_issues.len(), 1);
        assert!(candidate.continuity_score < 100.0);
    }

    #[test]
    fn trims_never_exceed_asset_duration() {
        let planner = AssemblyPlanner::new(PlannerConfig::default());
        let mut short = cut(0, 8.0, 80.0);
        short.asset.duration_sec = Some(5.0);
        let edl = planner.plan("Demo", &[short], &[]);
        let decision = &edl.candidates[0].decisions[0];
        assert_eq!(decision.out_point, 5.0);
    }

    #[test]
    fn overlapping_music_ducks_under_voiceover() {
        let planner = AssemblyPlanner::new(PlannerConfig::default());
        let mut tracks = vec![
            {
                let mut vo = AudioTrack::new("audio/vo.mp3", TrackType::Voiceover, 0.0);
                vo.duration = Some(10.0);
                vo
            },
            {
                let mut music = AudioTrack::new("audio/bed.mp3", TrackType::Music, 5.0);
                music.duration = Some(20.0);
                music
            },
            {
                let mut late_music = AudioTrack::new("audio/outro.mp3", TrackType::Music, 30.0);
                late_music.duration = Some(10.0);
                late_music
            },
        ];
        planner.apply_ducking(&mut tracks);
        assert_eq!(tracks[1].duck_db, Some(-12.0));
        assert_eq!(tracks[2].duck_db, None);
    }
}
