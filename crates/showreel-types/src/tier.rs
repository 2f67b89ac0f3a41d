use serde::{Deserialize, Serialize};

/// Production quality tiers. Each tier carries a cost-per-second model and
/// recommended defaults for scene count, variations, and QA pass threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionTier {
    Static,
    Animated,
    Photorealistic,
    Cinematic,
}

impl ProductionTier {
    pub const ALL: [ProductionTier; 4] = [
        ProductionTier::Static,
        ProductionTier::Animated,
        ProductionTier::Photorealistic,
        ProductionTier::Cinematic,
    ];

    /// Estimated generation cost per second of output video. Static tiers
    /// are image-backed and priced accordingly.
    pub fn cost_per_second(&self) -> f64 {
        match self {
            ProductionTier::Static => 0.004,
            ProductionTier::Animated => 0.08,
            ProductionTier::Photorealistic => 0.25,
            ProductionTier::Cinematic => 0.50,
        }
    }

    pub fn recommended_scene_count(&self) -> u32 {
        match self {
            ProductionTier::Static => 3,
            ProductionTier::Animated => 4,
            ProductionTier::Photorealistic => 5,
            ProductionTier::Cinematic => 5,
        }
    }

    pub fn variations_per_scene(&self) -> u32 {
        match self {
            ProductionTier::Static => 1,
            ProductionTier::Animated | ProductionTier::Photorealistic => 2,
            ProductionTier::Cinematic => 3,
        }
    }

    /// Minimum QA score a variation must reach to be eligible as a winner.
    pub fn pass_threshold(&self) -> f64 {
        match self {
            ProductionTier::Static => 55.0,
            ProductionTier::Animated => 60.0,
            ProductionTier::Photorealistic => 65.0,
            ProductionTier::Cinematic => 70.0,
        }
    }

    /// Estimated total generation cost for one pilot at this tier.
    pub fn estimate_pilot_cost(&self, target_duration_sec: f64) -> f64 {
        let per_scene = target_duration_sec / self.recommended_scene_count().max(1) as f64;
        per_scene
            * self.cost_per_second()
            * self.recommended_scene_count() as f64
            * self.variations_per_scene() as f64
    }

    pub fn parse(value: &str) -> Option<ProductionTier> {
        match value.to_ascii_lowercase().as_str() {
            "static" => Some(ProductionTier::Static),
            "animated" => Some(ProductionTier::Animated),
            "photorealistic" => Some(ProductionTier::Photorealistic),
            "cinematic" => Some(ProductionTier::Cinematic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductionTier::Static => write!(f, "static"),
            ProductionTier::Animated => write!(f, "animated"),
            ProductionTier::Photorealistic => write!(f, "photorealistic"),
            ProductionTier::Cinematic => write!(f, "cinematic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_order_by_cost() {
        let costs: Vec<f64> = ProductionTier::ALL
            .iter()
            .map(|t| t.cost_per_second())
            .collect();
        for pair in costs.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn parse_round_trips_display() {
        for tier in ProductionTier::ALL {
            assert_eq!(ProductionTier::parse(&tier.to_string()), Some(tier));
        }
        assert_eq!(ProductionTier::parse("imax"), None);
    }
}
