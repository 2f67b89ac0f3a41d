// Pilot planning: budget allocation across tiers with an enforced reserve.

use showreel_types::{Brief, Pilot, ProductionError, ProductionResult, ProductionTier};

/// Generate one pilot plan per requested tier. Allocations are
/// proportional to tier cost and never exceed `budget * (1 - reserve)`;
/// the reserve covers final assembly and winner under-estimates.
pub fn plan_pilots(
    brief: &Brief,
    tiers: &[ProductionTier],
    reserve_fraction: f64,
) -> ProductionResult<Vec<Pilot>> {
    if tiers.is_empty() {
        return Err(ProductionError::InputInvalid(
            "at least one production tier is required".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&reserve_fraction) {
        return Err(ProductionError::InputInvalid(format!(
            "reserve fraction must be in [0, 1), got {reserve_fraction}"
        )));
    }

    let usable = brief.total_budget_usd * (1.0 - reserve_fraction);
    let weight_total: f64 = tiers.iter().map(|t| t.cost_per_second()).sum();

    let pilots = tiers
        .iter()
        .map(|tier| {
            let share = tier.cost_per_second() / weight_total;
            let allocation = usable * share;
            let estimate = tier.estimate_pilot_cost(brief.target_duration_sec);
            if estimate > allocation {
                tracing::debug!(
                    tier = %tier,
                    allocation,
                    estimate,
                    "pilot allocation below its estimated cost"
                );
            }
            Pilot::new(*tier, allocation)
        })
        .collect();
    Ok(pilots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_respect_the_reserve() {
        let brief = Brief::new("Product demo", 30.0, 10.0);
        let pilots = plan_pilots(
            &brief,
            &[ProductionTier::Static, ProductionTier::Animated],
            0.1,
        )
        .unwrap();

        let total: f64 = pilots.iter().map(|p| p.allocated_budget_usd).sum();
        assert!(total <= 10.0 * 0.9 + 1e-9);
        for pilot in &pilots {
            assert!(pilot.allocated_budget_usd <= brief.total_budget_usd);
        }
    }

    #[test]
    fn allocation_is_proportional_to_tier_cost() {
        let brief = Brief::new("Product demo", 30.0, 10.0);
        let pilots = plan_pilots(
            &brief,
            &[ProductionTier::Static, ProductionTier::Animated],
            0.0,
        )
        .unwrap();

        // Animated costs 4x static per second.
        let ratio = pilots[1].allocated_budget_usd / pilots[0].allocated_budget_usd;
        assert!((ratio - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_tier_list_is_an_input_error() {
        let brief = Brief::new("Demo", 10.0, 5.0);
        let err = plan_pilots(&brief, &[], 0.1).err().unwrap();
        assert!(matches!(err, ProductionError::InputInvalid(_)));
    }

    #[test]
    fn pilot_defaults_follow_the_tier() {
        let brief = Brief::new("Demo", 30.0, 10.0);
        let pilots = plan_pilots(&brief, &[ProductionTier::Cinematic], 0.1).unwrap();
        assert_eq!(pilots[0].variations_per_scene, 3);
        assert_eq!(
            pilots[0].target_scenes,
            ProductionTier::Cinematic.recommended_scene_count()
        );
    }
}
