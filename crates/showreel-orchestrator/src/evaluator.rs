// Pilot evaluation and ranking. The critic compares the outcome to the
// brief and to the pilot's own promises (scene count, allocation).

use serde::{Deserialize, Serialize};

use showreel_pipeline::{PilotRunOutcome, SceneStatus};
use showreel_types::{Brief, Pilot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotEvaluation {
    pub critic_score: f64,
    pub avg_qa_score: f64,
    pub approved: bool,
    pub reasoning: String,
}

// Ranking: approved first, then `0.6 * critic + 0.4 * avg_qa`, ties broken
// by lowest spend.
const CRITIC_WEIGHT: f64 = 0.6;
const QA_WEIGHT: f64 = 0.4;

/// Minimum fraction of planned scenes that must have a winner.
const MIN_COMPLETION: f64 = 0.75;

pub fn evaluate_pilot(
    brief: &Brief,
    pilot: &Pilot,
    outcome: &PilotRunOutcome,
) -> PilotEvaluation {
    let planned = outcome.outcomes.len().max(1) as f64;
    let completed = outcome.completed_scenes() as f64;
    let completion_ratio = completed / planned;
    let avg_qa = outcome.avg_qa_score();

    // Budget adherence against the pilot's own allocation.
    let budget_factor = if pilot.allocated_budget_usd > 0.0 {
        (1.0 - (outcome.spent_usd / pilot.allocated_budget_usd).min(1.0)) * 0.5 + 0.5
    } else {
        1.0
    };

    let critic_score = (100.0
        * (0.50 * completion_ratio + 0.35 * (avg_qa / 100.0) + 0.15 * budget_factor))
        .clamp(0.0, 100.0);

    let qa_ok = avg_qa >= pilot.tier.pass_threshold();
    let completion_ok = completion_ratio >= MIN_COMPLETION;
    let approved = qa_ok && completion_ok;

    let failed: Vec<&str> = outcome
        .outcomes
        .iter()
        .filter(|o| matches!(o.status, SceneStatus::Failed(_)))
        .map(|o| o.scene.scene_id.as_str())
        .collect();

    let mut reasoning = format!(
        "{}/{} scenes delivered for \"{}\"; avg QA {:.1} (threshold {:.1}); spent ${:.2} of ${:.2}",
        completed as u32,
        planned as u32,
        brief.concept,
        avg_qa,
        pilot.tier.pass_threshold(),
        outcome.spent_usd,
        pilot.allocated_budget_usd,
    );
    if !failed.is_empty() {
        reasoning.push_str(&format!("; failed scenes: {}", failed.join(", ")));
    }

    PilotEvaluation {
        critic_score,
        avg_qa_score: avg_qa,
        approved,
        reasoning,
    }
}

#[derive(Debug, Clone)]
pub struct RankedPilot {
    pub pilot_id: String,
    pub approved: bool,
    pub critic_score: f64,
    pub avg_qa_score: f64,
    pub spent_usd: f64,
}

impl RankedPilot {
    pub fn combined_score(&self) -> f64 {
        CRITIC_WEIGHT * self.critic_score + QA_WEIGHT * self.avg_qa_score
    }
}

/// Sort candidates into ranking order; the first element wins.
pub fn rank_pilots(mut pilots: Vec<RankedPilot>) -> Vec<RankedPilot> {
    pilots.sort_by(|a, b| {
        b.approved
            .cmp(&a.approved)
            .then(
                b.combined_score()
                    .partial_cmp(&a.combined_score())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                a.spent_usd
                    .partial_cmp(&b.spent_usd)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    pilots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(id: &str, approved: bool, critic: f64, qa: f64, spent: f64) -> RankedPilot {
        RankedPilot {
            pilot_id: id.to_string(),
            approved,
            critic_score: critic,
            avg_qa_score: qa,
            spent_usd: spent,
        }
    }

    #[test]
    fn approved_pilots_outrank_rejected_ones() {
        let ranking = rank_pilots(vec![
            ranked("rejected-high", false, 95.0, 95.0, 0.1),
            ranked("approved-low", true, 60.0, 60.0, 5.0),
        ]);
        assert_eq!(ranking[0].pilot_id, "approved-low");
    }

    #[test]
    fn combined_score_orders_approved_pilots() {
        let ranking = rank_pilots(vec![
            ranked("a", true, 70.0, 90.0, 1.0), // 0.6*70 + 0.4*90 = 78
            ranked("b", true, 90.0, 70.0, 1.0), // 0.6*90 + 0.4*70 = 82
        ]);
        assert_eq!(ranking[0].pilot_id, "b");
    }

    #[test]
    fn ties_break_by_lowest_spend() {
        let ranking = rank_pilots(vec![
            ranked("expensive", true, 80.0, 80.0, 5.0),
            ranked("cheap", true, 80.0, 80.0, 1.0),
        ]);
        assert_eq!(ranking[0].pilot_id, "cheap");
    }
}
