// QA scoring: a pure function of asset metadata plus an optional
// vision-model hook. Four axes, each 0-100.

use async_trait::async_trait;

use showreel_types::{MediaAsset, QaScore, QaVisualAnalysis, Scene};

/// Black-box hook for frame-level analysis. When absent, scoring relies on
/// metadata alone.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, scene: &Scene, asset: &MediaAsset) -> Option<QaVisualAnalysis>;
}

/// Score one variation. Deterministic given the same inputs.
pub fn score_variation(
    scene: &Scene,
    asset: &MediaAsset,
    analysis: Option<&QaVisualAnalysis>,
) -> QaScore {
    QaScore {
        visual_accuracy: visual_accuracy(scene, asset, analysis),
        style_consistency: style_consistency(asset, analysis),
        technical_quality: technical_quality(asset, analysis),
        narrative_fit: narrative_fit(scene, asset),
    }
    .clamped()
}

fn visual_accuracy(scene: &Scene, asset: &MediaAsset, analysis: Option<&QaVisualAnalysis>) -> f64 {
    if let Some(analysis) = analysis {
        if !analysis.expected_elements.is_empty() {
            let matched = analysis.matched_elements.len() as f64;
            let expected = analysis.expected_elements.len() as f64;
            return 40.0 + 60.0 * (matched / expected);
        }
    }

    // Metadata-only: did the prompt carry the scene's visual elements?
    let prompt = asset
        .metadata
        .get("prompt")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_lowercase();
    if scene.visual_elements.is_empty() || prompt.is_empty() {
        return 70.0;
    }
    let hits = scene
        .visual_elements
        .iter()
        .filter(|e| prompt.contains(&e.to_lowercase()))
        .count() as f64;
    60.0 + 30.0 * (hits / scene.visual_elements.len() as f64)
}

fn style_consistency(asset: &MediaAsset, analysis: Option<&QaVisualAnalysis>) -> f64 {
    let mut score = 75.0;
    if let Some(analysis) = analysis {
        score -= 10.0 * analysis.unexpected_elements.len().min(3) as f64;
    }
    if asset.metadata.contains_key("aspect_ratio") {
        score += 5.0;
    }
    score
}

fn technical_quality(asset: &MediaAsset, analysis: Option<&QaVisualAnalysis>) -> f64 {
    let mut score: f64 = 70.0;
    if asset.local_path.is_some() {
        score += 15.0;
    }
    if asset.duration_sec.is_some() {
        score += 5.0;
    }
    if let Some(analysis) = analysis {
        score -= 15.0 * analysis.artifacts_detected.len().min(4) as f64;
    }
    score
}

fn narrative_fit(scene: &Scene, asset: &MediaAsset) -> f64 {
    let Some(actual) = asset.duration_sec else {
        return 60.0;
    };
    if scene.target_duration_sec <= 0.0 {
        return 60.0;
    }
    // Closeness of delivered duration to the scene's target.
    let ratio = (actual / scene.target_duration_sec).min(scene.target_duration_sec / actual);
    50.0 + 50.0 * ratio.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use showreel_types::MediaKind;

    fn scene() -> Scene {
        let mut scene = Scene::new(0, "logo", 5.0);
        scene.visual_elements = vec!["logo".to_string(), "reveal".to_string()];
        scene
    }

    fn downloaded_asset(duration: f64) -> MediaAsset {
        let mut asset = MediaAsset::for_scene(MediaKind::Video, "mock", "scene_000");
        asset.local_path = Some("videos/scene_000_v0.mp4".to_string());
        asset.duration_sec = Some(duration);
        asset
    }

    #[test]
    fn downloaded_on_target_asset_passes_every_tier_threshold() {
        let score = score_variation(&scene(), &downloaded_asset(5.0), None);
        assert!(score.overall() >= 70.0, "got {}", score.overall());
        assert_eq!(score.narrative_fit, 100.0);
    }

    #[test]
    fn duration_mismatch_hurts_narrative_fit() {
        let on_target = score_variation(&scene(), &downloaded_asset(5.0), None);
        let off_target = score_variation(&scene(), &downloaded_asset(2.0), None);
        assert!(off_target.narrative_fit < on_target.narrative_fit);
    }

    #[test]
    fn artifacts_pull_down_technical_quality() {
        let clean = score_variation(&scene(), &downloaded_asset(5.0), None);
        let analysis = QaVisualAnalysis {
            artifacts_detected: vec!["flicker".into(), "warping".into()],
            ..QaVisualAnalysis::default()
        };
        let noisy = score_variation(&scene(), &downloaded_asset(5.0), Some(&analysis));
        assert!(noisy.technical_quality < clean.technical_quality);
    }

    #[test]
    fn vision_analysis_drives_visual_accuracy_when_present() {
        let analysis = QaVisualAnalysis {
            expected_elements: vec!["logo".into(), "reveal".into()],
            matched_elements: vec!["logo".into()],
            ..QaVisualAnalysis::default()
        };
        let score = score_variation(&scene(), &downloaded_asset(5.0), Some(&analysis));
        assert!((score.visual_accuracy - 70.0).abs() < 1e-9);
    }

    #[test]
    fn scoring_is_deterministic() {
        let a = score_variation(&scene(), &downloaded_asset(5.0), None);
        let b = score_variation(&scene(), &downloaded_asset(5.0), None);
        assert_eq!(a.overall(), b.overall());
    }
}
