// External assembler contract. The orchestrator builds the plan; ffmpeg
// executes it. A missing assembler is non-fatal: the run completes with
// the EDL but no rendered file.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use showreel_types::{ProductionError, ProductionResult};

use crate::model::{AudioTrack, EditDecisionList, TransitionType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerStatus {
    pub installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            duration: None,
            file_size: None,
            render_time: None,
            error: Some(error.into()),
        }
    }
}

pub struct FfmpegAssembler {
    binary: String,
    output_dir: PathBuf,
}

impl FfmpegAssembler {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub async fn check_installed(&self) -> AssemblerStatus {
        let output = Command::new(&self.binary).arg("-version").output().await;
        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let version = stdout.lines().next().map(str::to_string);
                AssemblerStatus {
                    installed: true,
                    version,
                    path: Some(self.binary.clone()),
                }
            }
            _ => AssemblerStatus {
                installed: false,
                version: None,
                path: None,
            },
        }
    }

    /// Execute one candidate of the EDL. Cross-dissolves compose per clip
    /// with xfade; fades apply only at the outer edges. Post-concat fade
    /// filters are never used (they leave persistent black frames in a
    /// concatenated stream).
    pub async fn render(
        &self,
        edl: &EditDecisionList,
        candidate_id: &str,
        audio_tracks: &[AudioTrack],
        run_id: &str,
    ) -> ProductionResult<RenderResult> {
        let Some(candidate) = edl.candidate(candidate_id) else {
            return Err(ProductionError::InputInvalid(format!(
                "no candidate `{candidate_id}` in EDL `{}`",
                edl.edl_id
            )));
        };
        if candidate.decisions.is_empty() {
            return Ok(RenderResult::failed("candidate has no decisions"));
        }

        let status = self.check_installed().await;
        if !status.installed {
            return Ok(RenderResult::failed("ffmpeg is not installed"));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ProductionError::InputInvalid(format!("output dir: {e}")))?;
        let output_path = self
            .output_dir
            .join(format!("{candidate_id}_final.mp4"));

        let args = build_render_args(candidate, audio_tracks, &output_path);
        tracing::info!(run_id, candidate_id, "invoking assembler");

        let started = Instant::now();
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| ProductionError::ProviderTransient(format!("assembler spawn: {e}")))?;
        let render_time = started.elapsed().as_secs_f64();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(RenderResult::failed(format!("assembler failed: {tail}")));
        }

        let file_size = tokio::fs::metadata(&output_path).await.ok().map(|m| m.len());
        Ok(RenderResult {
            success: true,
            output_path: Some(output_path.display().to_string()),
            duration: Some(candidate.total_duration),
            file_size,
            render_time: Some(render_time),
            error: None,
        })
    }
}

/// Build the ffmpeg invocation for a candidate: inputs, per-clip trims,
/// xfade chain when dissolves are present, audio mix with gains and ducking.
fn build_render_args(
    candidate: &crate::model::EditCandidate,
    audio_tracks: &[AudioTrack],
    output_path: &Path,
) -> Vec<String> {
    let mut args = vec!["-y".to_string()];

    for decision in &candidate.decisions {
        args.push("-i".to_string());
        args.push(decision.video_url.clone());
    }
    for track in audio_tracks {
        args.push("-i".to_string());
        args.push(track.path.clone());
    }

    let video_inputs = candidate.decisions.len();
    let has_dissolves = candidate
        .decisions
        .iter()
        .any(|d| d.transition_in == TransitionType::Dissolve);

    let mut filters = Vec::new();

    // Trim each clip to its edit window.
    for (i, decision) in candidate.decisions.iter().enumerate() {
        filters.push(format!(
            "[{i}:v]trim=start={}:end={},setpts=PTS-STARTPTS[v{i}]",
            decision.in_point, decision.out_point
        ));
    }

    // Compose clips: xfade chain when dissolving, concat otherwise.
    let mut video_label = if video_inputs == 1 {
        "v0".to_string()
    } else if has_dissolves {
        let mut current = "v0".to_string();
        let mut offset = 0.0;
        for (i, decision) in candidate.decisions.iter().enumerate().skip(1) {
            let previous = &candidate.decisions[i - 1];
            offset += previous.duration;
            let next = format!("vx{i}");
            let dissolve = decision.transition_in == TransitionType::Dissolve;
            let duration = if dissolve {
                decision.transition_in_duration.max(0.01)
            } else {
                0.01
            };
            let start = (offset - duration).max(0.0);
            filters.push(format!(
                "[{current}][v{i}]xfade=transition=fade:duration={duration}:offset={start}[{next}]"
            ));
            current = next;
        }
        current
    } else {
        let chain: String = (0..video_inputs).map(|i| format!("[v{i}]")).collect();
        filters.push(format!("{chain}concat=n={video_inputs}:v=1:a=0[vcat]"));
        "vcat".to_string()
    };

    // Edge fades only; mid-timeline fades are forbidden.
    let first = &candidate.decisions[0];
    let last = candidate.decisions.last().unwrap();
    if first.transition_in == TransitionType::FadeIn {
        filters.push(format!(
            "[{video_label}]fade=t=in:st=0:d={}[vfin]",
            first.transition_in_duration
        ));
        video_label = "vfin".to_string();
    }
    if last.transition_out == TransitionType::FadeOut {
        let fade_start = (candidate.total_duration - last.transition_out_duration).max(0.0);
        filters.push(format!(
            "[{video_label}]fade=t=out:st={fade_start}:d={}[vfout]",
            last.transition_out_duration
        ));
        video_label = "vfout".to_string();
    }

    // Audio: delay to position, apply gain (+ ducking), then mix.
    let mut audio_labels = Vec::new();
    for (t, track) in audio_tracks.iter().enumerate() {
        let input = video_inputs + t;
        let delay_ms = (track.start_time * 1000.0).round() as u64;
        let gain_db = track.volume_db + track.duck_db.unwrap_or(0.0);
        filters.push(format!(
            "[{input}:a]adelay={delay_ms}|{delay_ms},volume={gain_db}dB[a{t}]"
        ));
        audio_labels.push(format!("[a{t}]"));
    }
    let audio_out = if audio_labels.is_empty() {
        None
    } else if audio_labels.len() == 1 {
        Some("a0".to_string())
    } else {
        filters.push(format!(
            "{}amix=inputs={}:normalize=0[amix]",
            audio_labels.concat(),
            audio_labels.len()
        ));
        Some("amix".to_string())
    };

    args.push("-filter_complex".to_string());
    args.push(filters.join(";"));
    args.push("-map".to_string());
    args.push(format!("[{video_label}]"));
    if let Some(audio) = audio_out {
        args.push("-map".to_string());
        args.push(format!("[{audio}]"));
        args.push("-c:a".to_string());
        args.push("aac".to_string());
    }
    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    args.push(output_path.display().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EditCandidate, EditDecision, TrackType};

    fn decision(i: u32, transition_in: TransitionType) -> EditDecision {
        EditDecision {
            scene_id: format!("scene_{i:03}"),
            selected_variation: 0,
            video_url: format!("videos/scene_{i:03}_v0.mp4"),
            audio_url: None,
            in_point: 0.0,
            out_point: 5.0,
            transition_in,
            transition_in_duration: 0.5,
            transition_out: TransitionType::Cut,
            transition_out_duration: 0.0,
            start_time: i as f64 * 5.0,
            duration: 5.0,
            text_overlay: None,
            text_position: "bottom-left".into(),
            text_style: "default".into(),
            text_start_time: None,
            text_duration: None,
            notes: None,
        }
    }

    fn candidate(transitions: &[TransitionType]) -> EditCandidate {
        EditCandidate {
            candidate_id: "cand_test".into(),
            name: "Test".into(),
            style: "safe".into(),
            total_duration: 5.0 * transitions.len() as f64,
            estimated_quality: 80.0,
            description: String::new(),
            decisions: transitions
                .iter()
                .enumerate()
                .map(|(i, t)| decision(i as u32, *t))
                .collect(),
            continuity_issues: Vec::new(),
            continuity_score: 100.0,
        }
    }

    #[test]
    fn cuts_use_concat_not_xfade() {
        let candidate = candidate(&[TransitionType::Cut, TransitionType::Cut]);
        let args = build_render_args(&candidate, &[], Path::new("out.mp4"));
        let filter = args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| args[i + 1].clone())
            .unwrap();
        assert!(filter.contains("concat=n=2"));
        assert!(!filter.contains("xfade"));
    }

    #[test]
    fn dissolves_compose_per_clip_with_xfade_never_post_concat_fades() {
        let candidate = candidate(&[TransitionType::Cut, TransitionType::Dissolve]);
        let args = build_render_args(&candidate, &[], Path::new("out.mp4"));
        let filter = args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| args[i + 1].clone())
            .unwrap();
        assert!(filter.contains("xfade"));
        // The only fade filters permitted are the explicit edge fades.
        assert!(!filter.contains("fade=t="));
    }

    #[test]
    fn audio_tracks_are_delayed_and_gained() {
        let candidate = candidate(&[TransitionType::Cut]);
        let mut music = AudioTrack::new("audio/bed.mp3", TrackType::Music, 2.0);
        music.duck_db = Some(-12.0);
        let args = build_render_args(&candidate, &[music], Path::new("out.mp4"));
        let filter = args
            .iter()
            .position(|a| a == "-filter_complex")
            .map(|i| args[i + 1].clone())
            .unwrap();
        assert!(filter.contains("adelay=2000|2000"));
        assert!(filter.contains("volume=-30dB"));
    }
}
