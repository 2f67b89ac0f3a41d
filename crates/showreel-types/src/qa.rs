use serde::{Deserialize, Serialize};

/// Per-variation QA score on the four assessment axes, each 0-100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QaScore {
    pub visual_accuracy: f64,
    pub style_consistency: f64,
    pub technical_quality: f64,
    pub narrative_fit: f64,
}

impl QaScore {
    pub fn overall(&self) -> f64 {
        (self.visual_accuracy
            + self.style_consistency
            + self.technical_quality
            + self.narrative_fit)
            / 4.0
    }

    pub fn clamped(self) -> QaScore {
        QaScore {
            visual_accuracy: self.visual_accuracy.clamp(0.0, 100.0),
            style_consistency: self.style_consistency.clamp(0.0, 100.0),
            technical_quality: self.technical_quality.clamp(0.0, 100.0),
            narrative_fit: self.narrative_fit.clamp(0.0, 100.0),
        }
    }
}

/// Output of the optional vision-model hook: what a frame-by-frame analysis
/// actually observed in a generated video, treated here as opaque evidence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QaVisualAnalysis {
    pub frames_analyzed: u32,
    pub overall_description: String,
    #[serde(default)]
    pub expected_elements: Vec<String>,
    #[serde(default)]
    pub matched_elements: Vec<String>,
    #[serde(default)]
    pub missing_elements: Vec<String>,
    #[serde(default)]
    pub unexpected_elements: Vec<String>,
    #[serde(default)]
    pub artifacts_detected: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_is_the_axis_mean() {
        let score = QaScore {
            visual_accuracy: 80.0,
            style_consistency: 60.0,
            technical_quality: 100.0,
            narrative_fit: 40.0,
        };
        assert!((score.overall() - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clamp_bounds_axes() {
        let score = QaScore {
            visual_accuracy: 130.0,
            style_consistency: -5.0,
            technical_quality: 50.0,
            narrative_fit: 50.0,
        }
        .clamped();
        assert_eq!(score.visual_accuracy, 100.0);
        assert_eq!(score.style_consistency, 0.0);
    }
}
