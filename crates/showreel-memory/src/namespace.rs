// Namespace grammar for the multi-tenant learnings hierarchy.
//
//   /platform/...                                    platform-wide, curated
//   /org/{orgId}/...                                 organization
//   /org/{orgId}/actor/{actorId}/...                 user
//   /org/{orgId}/actor/{actorId}/sessions/{sid}/...  session
//
// Parsing is purely lexical; `parse(build(pattern, ctx))` is the identity
// for all valid inputs.

use serde::{Deserialize, Serialize};

use crate::types::{MemoryError, MemoryResult};

/// Hierarchy levels, totally ordered `Session < User < Org < Platform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceLevel {
    Session,
    User,
    Org,
    Platform,
}

impl std::fmt::Display for NamespaceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamespaceLevel::Session => write!(f, "session"),
            NamespaceLevel::User => write!(f, "user"),
            NamespaceLevel::Org => write!(f, "org"),
            NamespaceLevel::Platform => write!(f, "platform"),
        }
    }
}

/// Context for resolving namespace patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceContext {
    pub org_id: String,
    pub actor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl NamespaceContext {
    pub fn new(org_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            actor_id: actor_id.into(),
            session_id: None,
        }
    }

    /// Single-user local development context.
    pub fn local_dev(session_id: Option<String>) -> Self {
        Self {
            org_id: "local".to_string(),
            actor_id: "dev".to_string(),
            session_id,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Components extracted from a namespace path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedNamespace {
    pub level: Option<NamespaceLevel>,
    pub org_id: Option<String>,
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    pub provider_id: Option<String>,
    pub is_global_learnings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    Read,
    Write,
    Delete,
}

/// One namespace to query during retrieval, with its priority weight.
#[derive(Debug, Clone)]
pub struct RetrievalNamespace {
    pub namespace: String,
    pub level: NamespaceLevel,
    pub priority: f64,
}

/// Namespace pattern constants and builder/parser methods.
pub struct Namespaces;

impl Namespaces {
    pub const PLATFORM_LEARNINGS_GLOBAL: &'static str = "/platform/learnings/global";
    pub const PLATFORM_LEARNINGS_PROVIDER: &'static str = "/platform/learnings/provider/{providerId}";
    pub const ORG_LEARNINGS_GLOBAL: &'static str = "/org/{orgId}/learnings/global";
    pub const ORG_LEARNINGS_PROVIDER: &'static str = "/org/{orgId}/learnings/provider/{providerId}";
    pub const USER_LEARNINGS_GLOBAL: &'static str =
        "/org/{orgId}/actor/{actorId}/learnings/global";
    pub const USER_LEARNINGS_PROVIDER: &'static str =
        "/org/{orgId}/actor/{actorId}/learnings/provider/{providerId}";
    pub const SESSION_LEARNINGS: &'static str =
        "/org/{orgId}/actor/{actorId}/sessions/{sessionId}/learnings";
    /// Queued org->platform promotions awaiting an explicit admin decision.
    pub const PLATFORM_PROMOTION_QUEUE: &'static str = "/platform/learnings/promotion_queue";

    /// Resolve a pattern against a context. Unresolved `{placeholders}` are
    /// an input error, never silently passed through.
    pub fn build(
        pattern: &str,
        ctx: &NamespaceContext,
        provider_id: Option<&str>,
    ) -> MemoryResult<String> {
        let mut result = pattern.to_string();
        result = result.replace("{orgId}", &ctx.org_id);
        result = result.replace("{actorId}", &ctx.actor_id);
        if let Some(session_id) = &ctx.session_id {
            result = result.replace("{sessionId}", session_id);
        }
        if let Some(provider) = provider_id {
            result = result.replace("{providerId}", provider);
        }

        if let (Some(open), Some(close)) = (result.find('{'), result.find('}')) {
            if open < close {
                return Err(MemoryError::InvalidNamespace(format!(
                    "unresolved placeholder `{}` in `{}`",
                    &result[open..=close],
                    result
                )));
            }
        }
        Ok(result)
    }

    pub fn for_provider_learnings(
        provider: &str,
        level: NamespaceLevel,
        ctx: &NamespaceContext,
    ) -> MemoryResult<String> {
        let pattern = match level {
            NamespaceLevel::Platform => Self::PLATFORM_LEARNINGS_PROVIDER,
            NamespaceLevel::Org => Self::ORG_LEARNINGS_PROVIDER,
            NamespaceLevel::User => Self::USER_LEARNINGS_PROVIDER,
            NamespaceLevel::Session => Self::SESSION_LEARNINGS,
        };
        Self::build(pattern, ctx, Some(provider))
    }

    pub fn for_global_learnings(
        level: NamespaceLevel,
        ctx: &NamespaceContext,
    ) -> MemoryResult<String> {
        let pattern = match level {
            NamespaceLevel::Platform => Self::PLATFORM_LEARNINGS_GLOBAL,
            NamespaceLevel::Org => Self::ORG_LEARNINGS_GLOBAL,
            NamespaceLevel::User => Self::USER_LEARNINGS_GLOBAL,
            NamespaceLevel::Session => {
                return Err(MemoryError::InvalidNamespace(
                    "global learnings have no session level".to_string(),
                ))
            }
        };
        Self::build(pattern, ctx, None)
    }

    /// All namespaces to query for a provider's learnings, highest priority
    /// first. Weights are fixed by the hierarchy.
    pub fn retrieval_namespaces(
        provider: &str,
        ctx: &NamespaceContext,
        include_session: bool,
    ) -> MemoryResult<Vec<RetrievalNamespace>> {
        let mut namespaces = vec![
            RetrievalNamespace {
                namespace: Self::PLATFORM_LEARNINGS_GLOBAL.to_string(),
                level: NamespaceLevel::Platform,
                priority: 1.00,
            },
            RetrievalNamespace {
                namespace: Self::build(Self::PLATFORM_LEARNINGS_PROVIDER, ctx, Some(provider))?,
                level: NamespaceLevel::Platform,
                priority: 0.95,
            },
            RetrievalNamespace {
                namespace: Self::build(Self::ORG_LEARNINGS_GLOBAL, ctx, None)?,
                level: NamespaceLevel::Org,
                priority: 0.85,
            },
            RetrievalNamespace {
                namespace: Self::build(Self::ORG_LEARNINGS_PROVIDER, ctx, Some(provider))?,
                level: NamespaceLevel::Org,
                priority: 0.80,
            },
            RetrievalNamespace {
                namespace: Self::build(Self::USER_LEARNINGS_GLOBAL, ctx, None)?,
                level: NamespaceLevel::User,
                priority: 0.70,
            },
            RetrievalNamespace {
                namespace: Self::build(Self::USER_LEARNINGS_PROVIDER, ctx, Some(provider))?,
                level: NamespaceLevel::User,
                priority: 0.65,
            },
        ];

        if include_session && ctx.session_id.is_some() {
            namespaces.push(RetrievalNamespace {
                namespace: Self::build(Self::SESSION_LEARNINGS, ctx, Some(provider))?,
                level: NamespaceLevel::Session,
                priority: 0.50,
            });
        }

        Ok(namespaces)
    }

    /// Lexical parse of a namespace path.
    pub fn parse(namespace: &str) -> ParsedNamespace {
        let mut parsed = ParsedNamespace::default();
        let parts: Vec<&str> = namespace.trim_matches('/').split('/').collect();

        if parts.is_empty() || parts[0].is_empty() {
            return parsed;
        }

        if parts[0] == "platform" {
            parsed.level = Some(NamespaceLevel::Platform);
        } else if parts[0] == "org" && parts.len() >= 2 {
            parsed.org_id = Some(parts[1].to_string());
            if let Some(actor_idx) = parts.iter().position(|p| *p == "actor") {
                if actor_idx + 1 < parts.len() {
                    parsed.actor_id = Some(parts[actor_idx + 1].to_string());
                }
                if let Some(session_idx) = parts.iter().position(|p| *p == "sessions") {
                    parsed.level = Some(NamespaceLevel::Session);
                    if session_idx + 1 < parts.len() {
                        parsed.session_id = Some(parts[session_idx + 1].to_string());
                    }
                } else {
                    parsed.level = Some(NamespaceLevel::User);
                }
            } else {
                parsed.level = Some(NamespaceLevel::Org);
            }
        }

        if let Some(provider_idx) = parts.iter().position(|p| *p == "provider") {
            if provider_idx + 1 < parts.len() {
                parsed.provider_id = Some(parts[provider_idx + 1].to_string());
            }
        }
        parsed.is_global_learnings =
            parts.windows(2).any(|w| w == ["learnings", "global"]);

        parsed
    }

    pub fn level_of(namespace: &str) -> Option<NamespaceLevel> {
        Self::parse(namespace).level
    }

    /// Relative file path for the local back-end:
    /// `/org/acme/actor/alice/learnings/provider/luma` ->
    /// `org/acme/actor/alice/learnings/provider/luma.json`.
    pub fn to_path(namespace: &str) -> String {
        format!("{}.json", namespace.trim_matches('/'))
    }

    /// Client-side access check. The hosted back-end also enforces
    /// server-side.
    pub fn validate_access(
        namespace: &str,
        actor_org_id: &str,
        actor_id: &str,
        action: AccessAction,
        roles: &[String],
    ) -> bool {
        let has_role = |role: &str| roles.iter().any(|r| r == role);
        let parsed = Self::parse(namespace);

        if namespace.starts_with("/platform/") {
            return match action {
                AccessAction::Read => true,
                AccessAction::Write | AccessAction::Delete => {
                    has_role("platform_admin") || has_role("platform_curator")
                }
            };
        }

        match parsed.org_id.as_deref() {
            Some(ns_org) if ns_org == actor_org_id => {}
            _ => return false,
        }

        if let Some(ns_actor) = parsed.actor_id.as_deref() {
            if ns_actor == actor_id {
                return true;
            }
            return action == AccessAction::Read && has_role("org_admin");
        }

        match action {
            AccessAction::Read => true,
            AccessAction::Write | AccessAction::Delete => {
                has_role("org_admin") || has_role("org_curator")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> NamespaceContext {
        NamespaceContext::new("acme", "alice").with_session("sess-1")
    }

    #[test]
    fn build_resolves_all_placeholders() {
        let ns = Namespaces::build(Namespaces::USER_LEARNINGS_PROVIDER, &ctx(), Some("luma"))
            .unwrap();
        assert_eq!(ns, "/org/acme/actor/alice/learnings/provider/luma");
    }

    #[test]
    fn build_rejects_unresolved_placeholders() {
        let ctx = NamespaceContext::new("acme", "alice");
        let err = Namespaces::build(Namespaces::SESSION_LEARNINGS, &ctx, None)
            .err()
            .expect("missing session id");
        assert!(matches!(err, MemoryError::InvalidNamespace(_)));
    }

    #[test]
    fn parse_build_is_identity_on_components() {
        let ns =
            Namespaces::build(Namespaces::SESSION_LEARNINGS, &ctx(), Some("luma")).unwrap();
        let parsed = Namespaces::parse(&ns);
        assert_eq!(parsed.level, Some(NamespaceLevel::Session));
        assert_eq!(parsed.org_id.as_deref(), Some("acme"));
        assert_eq!(parsed.actor_id.as_deref(), Some("alice"));
        assert_eq!(parsed.session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn levels_are_totally_ordered() {
        assert!(NamespaceLevel::Platform > NamespaceLevel::Org);
        assert!(NamespaceLevel::Org > NamespaceLevel::User);
        assert!(NamespaceLevel::User > NamespaceLevel::Session);
    }

    #[test]
    fn retrieval_weights_match_the_hierarchy() {
        let namespaces = Namespaces::retrieval_namespaces("luma", &ctx(), true).unwrap();
        let priorities: Vec<f64> = namespaces.iter().map(|n| n.priority).collect();
        assert_eq!(priorities, vec![1.00, 0.95, 0.85, 0.80, 0.70, 0.65, 0.50]);
    }

    #[test]
    fn session_namespace_excluded_without_session_id() {
        let ctx = NamespaceContext::new("acme", "alice");
        let namespaces = Namespaces::retrieval_namespaces("luma", &ctx, true).unwrap();
        assert_eq!(namespaces.len(), 6);
    }

    #[test]
    fn actors_cannot_write_other_users() {
        let roles = vec!["org_member".to_string()];
        assert!(!Namespaces::validate_access(
            "/org/acme/actor/bob/learnings/global",
            "acme",
            "alice",
            AccessAction::Write,
            &roles,
        ));
        assert!(Namespaces::validate_access(
            "/org/acme/actor/alice/learnings/global",
            "acme",
            "alice",
            AccessAction::Write,
            &roles,
        ));
    }

    #[test]
    fn platform_reads_open_writes_gated() {
        let member = vec!["org_member".to_string()];
        let admin = vec!["platform_admin".to_string()];
        assert!(Namespaces::validate_access(
            "/platform/learnings/global",
            "acme",
            "alice",
            AccessAction::Read,
            &member,
        ));
        assert!(!Namespaces::validate_access(
            "/platform/learnings/global",
            "acme",
            "alice",
            AccessAction::Write,
            &member,
        ));
        assert!(Namespaces::validate_access(
            "/platform/learnings/global",
            "acme",
            "alice",
            AccessAction::Write,
            &admin,
        ));
    }

    #[test]
    fn cross_org_access_denied() {
        let roles = vec!["org_admin".to_string()];
        assert!(!Namespaces::validate_access(
            "/org/globex/learnings/global",
            "acme",
            "alice",
            AccessAction::Read,
            &roles,
        ));
    }

    #[test]
    fn to_path_strips_slashes() {
        assert_eq!(
            Namespaces::to_path("/platform/learnings/global"),
            "platform/learnings/global.json"
        );
    }
}
