use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tier::ProductionTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PilotStatus {
    Planned,
    Running,
    Approved,
    Rejected,
    Cancelled,
}

impl PilotStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PilotStatus::Approved | PilotStatus::Rejected | PilotStatus::Cancelled
        )
    }

    /// Legal status transitions. Terminal statuses are final.
    pub fn can_transition_to(&self, next: PilotStatus) -> bool {
        match self {
            PilotStatus::Planned => matches!(next, PilotStatus::Running | PilotStatus::Cancelled),
            PilotStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for PilotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PilotStatus::Planned => write!(f, "planned"),
            PilotStatus::Running => write!(f, "running"),
            PilotStatus::Approved => write!(f, "approved"),
            PilotStatus::Rejected => write!(f, "rejected"),
            PilotStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One competing production plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pilot {
    pub pilot_id: String,
    pub tier: ProductionTier,
    pub allocated_budget_usd: f64,
    pub target_scenes: u32,
    pub variations_per_scene: u32,
    pub status: PilotStatus,
    #[serde(default)]
    pub spent_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_qa_score: Option<f64>,
}

impl Pilot {
    pub fn new(tier: ProductionTier, allocated_budget_usd: f64) -> Self {
        Self {
            pilot_id: format!("pilot_{}", Uuid::new_v4().simple()),
            tier,
            allocated_budget_usd,
            target_scenes: tier.recommended_scene_count(),
            variations_per_scene: tier.variations_per_scene(),
            status: PilotStatus::Planned,
            spent_usd: 0.0,
            rejection_reason: None,
            critic_score: None,
            avg_qa_score: None,
        }
    }
}
