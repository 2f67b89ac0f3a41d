use serde::{Deserialize, Serialize};

/// Closed set of production run stages. Each carries a progress-percent
/// mapping for UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Initialized,
    AnalyzingAssets,
    PlanningPilots,
    GeneratingScripts,
    GeneratingVideo,
    GeneratingAudio,
    Evaluating,
    Editing,
    Rendering,
    Completed,
    Failed,
}

impl RunStage {
    pub fn progress_percent(&self) -> f64 {
        match self {
            RunStage::Initialized => 0.0,
            RunStage::AnalyzingAssets => 5.0,
            RunStage::PlanningPilots => 10.0,
            RunStage::GeneratingScripts => 20.0,
            RunStage::GeneratingVideo => 45.0,
            RunStage::GeneratingAudio => 60.0,
            RunStage::Evaluating => 70.0,
            RunStage::Editing => 80.0,
            RunStage::Rendering => 90.0,
            RunStage::Completed => 100.0,
            RunStage::Failed => 100.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Completed | RunStage::Failed)
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Initialized => "initialized",
            RunStage::AnalyzingAssets => "analyzing_assets",
            RunStage::PlanningPilots => "planning_pilots",
            RunStage::GeneratingScripts => "generating_scripts",
            RunStage::GeneratingVideo => "generating_video",
            RunStage::GeneratingAudio => "generating_audio",
            RunStage::Evaluating => "evaluating",
            RunStage::Editing => "editing",
            RunStage::Rendering => "rendering",
            RunStage::Completed => "completed",
            RunStage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic_through_the_happy_path() {
        let stages = [
            RunStage::Initialized,
            RunStage::AnalyzingAssets,
            RunStage::PlanningPilots,
            RunStage::GeneratingScripts,
            RunStage::GeneratingVideo,
            RunStage::GeneratingAudio,
            RunStage::Evaluating,
            RunStage::Editing,
            RunStage::Rendering,
            RunStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percent() < pair[1].progress_percent());
        }
    }
}
