// Best-effort CMX3600 interchange export. The JSON structured form is the
// contract; this is a convenience for NLE import.

use crate::model::{EditCandidate, TransitionType};

fn timecode(seconds: f64, fps: f64) -> String {
    let total_frames = (seconds * fps).round() as u64;
    let fps_u = fps.round() as u64;
    let frames = total_frames % fps_u;
    let total_seconds = total_frames / fps_u;
    format!(
        "{:02}:{:02}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds / 60) % 60,
        total_seconds % 60,
        frames
    )
}

/// Render one candidate as a CMX3600 event list at the given frame rate.
pub fn export_cmx3600(candidate: &EditCandidate, title: &str, fps: f64) -> String {
    let mut lines = vec![format!("TITLE: {title}"), "FCM: NON-DROP FRAME".to_string()];

    for (index, decision) in candidate.decisions.iter().enumerate() {
        let event = index + 1;
        let kind = match decision.transition_in {
            TransitionType::Dissolve => "D",
            _ => "C",
        };
        lines.push(format!(
            "{:03}  AX       V     {}        {} {} {} {}",
            event,
            kind,
            timecode(decision.in_point, fps),
            timecode(decision.out_point, fps),
            timecode(decision.start_time, fps),
            timecode(decision.start_time + decision.duration, fps),
        ));
        lines.push(format!("* FROM CLIP NAME: {}", decision.video_url));
    }

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EditDecision;

    #[test]
    fn timecode_formats_frames_at_30fps() {
        assert_eq!(timecode(0.0, 30.0), "00:00:00:00");
        assert_eq!(timecode(5.5, 30.0), "00:00:05:15");
        assert_eq!(timecode(3661.0, 30.0), "01:01:01:00");
    }

    #[test]
    fn export_lists_one_event_per_decision() {
        let candidate = EditCandidate {
            candidate_id: "cand_safe".into(),
            name: "Safe Cut".into(),
            style: "safe".into(),
            total_duration: 5.0,
            estimated_quality: 80.0,
            description: String::new(),
            decisions: vec![EditDecision {
                scene_id: "scene_000".into(),
                selected_variation: 0,
                video_url: "videos/scene_000_v0.mp4".into(),
                audio_url: None,
                in_point: 0.0,
                out_point: 5.0,
                transition_in: TransitionType::Cut,
                transition_in_duration: 0.0,
                transition_out: TransitionType::Cut,
                transition_out_duration: 0.0,
                start_time: 0.0,
                duration: 5.0,
                text_overlay: None,
                text_position: "bottom-left".into(),
                text_style: "default".into(),
                text_start_time: None,
                text_duration: None,
                notes: None,
            }],
            continuity_issues: Vec::new(),
            continuity_score: 100.0,
        };

        let exported = export_cmx3600(&candidate, "Demo", 30.0);
        assert!(exported.starts_with("TITLE: Demo"));
        assert!(exported.contains("001  AX       V     C"));
        assert!(exported.contains("FROM CLIP NAME: videos/scene_000_v0.mp4"));
    }
}
