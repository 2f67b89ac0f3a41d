// Promotion rules between namespace levels.
//
// Promoting never deletes the source record; a new record is created at the
// higher-level namespace with a back-pointer and an appended history entry.

use crate::namespace::{NamespaceContext, NamespaceLevel, Namespaces};
use crate::types::MemoryResult;

#[derive(Debug, Clone, Copy)]
pub struct PromotionRule {
    pub from: NamespaceLevel,
    pub to: NamespaceLevel,
    pub min_validations: u32,
    pub min_confidence: f64,
    pub requires_approval: bool,
}

const RULES: [PromotionRule; 3] = [
    PromotionRule {
        from: NamespaceLevel::Session,
        to: NamespaceLevel::User,
        min_validations: 2,
        min_confidence: 0.60,
        requires_approval: false,
    },
    PromotionRule {
        from: NamespaceLevel::User,
        to: NamespaceLevel::Org,
        min_validations: 3,
        min_confidence: 0.70,
        requires_approval: false,
    },
    PromotionRule {
        from: NamespaceLevel::Org,
        to: NamespaceLevel::Platform,
        min_validations: 5,
        min_confidence: 0.85,
        requires_approval: true,
    },
];

/// The rule that applies when promoting out of `level`, if any.
pub fn promotion_rule(level: NamespaceLevel) -> Option<PromotionRule> {
    RULES.iter().copied().find(|r| r.from == level)
}

/// Target namespace for promoting a record out of `from_namespace`.
/// Returns `None` when the record is already at the highest level, or the
/// namespace cannot be classified.
pub fn promotion_target(
    from_namespace: &str,
    ctx: &NamespaceContext,
    provider: Option<&str>,
) -> MemoryResult<Option<String>> {
    let Some(level) = Namespaces::level_of(from_namespace) else {
        return Ok(None);
    };
    let Some(rule) = promotion_rule(level) else {
        return Ok(None);
    };

    let target = match provider {
        Some(provider) => Namespaces::for_provider_learnings(provider, rule.to, ctx)?,
        None => Namespaces::for_global_learnings(rule.to, ctx)?,
    };
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rule_promotes_strictly_upward() {
        for level in [
            NamespaceLevel::Session,
            NamespaceLevel::User,
            NamespaceLevel::Org,
        ] {
            let rule = promotion_rule(level).expect("rule exists");
            assert!(rule.to > rule.from);
        }
        assert!(promotion_rule(NamespaceLevel::Platform).is_none());
    }

    #[test]
    fn org_to_platform_requires_approval() {
        assert!(promotion_rule(NamespaceLevel::Org).unwrap().requires_approval);
        assert!(!promotion_rule(NamespaceLevel::User).unwrap().requires_approval);
    }

    #[test]
    fn target_for_user_provider_learning_is_org_provider() {
        let ctx = NamespaceContext::new("acme", "alice");
        let from = "/org/acme/actor/alice/learnings/provider/luma";
        let target = promotion_target(from, &ctx, Some("luma")).unwrap();
        assert_eq!(
            target.as_deref(),
            Some("/org/acme/learnings/provider/luma")
        );
    }

    #[test]
    fn platform_records_have_no_target() {
        let ctx = NamespaceContext::new("acme", "alice");
        let target = promotion_target("/platform/learnings/global", &ctx, None).unwrap();
        assert!(target.is_none());
    }
}
