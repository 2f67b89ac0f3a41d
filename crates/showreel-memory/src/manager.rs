// Learnings Manager
// High-level operations over a back-end: priority retrieval, validation,
// and promotion between namespace levels.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::backend::MemoryBackend;
use crate::hosted::HostedMemoryBackend;
use crate::local::LocalMemoryBackend;
use crate::namespace::{AccessAction, NamespaceContext, NamespaceLevel, Namespaces};
use crate::promotion::{promotion_rule, promotion_target};
use crate::types::{LearningRecord, MemoryError, MemoryResult, PromotionEvent, RetrievalResult};

/// Confidence assigned to a freshly stored learning: an unproven prior that
/// validations push toward 0 or 1.
const INITIAL_CONFIDENCE: f64 = 0.5;
const CONFIDENCE_DELTA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Local,
    Hosted,
}

#[derive(Debug, Clone)]
pub struct LearningsConfig {
    pub mode: MemoryMode,
    pub base_path: String,
    pub default_org_id: String,
    pub default_actor_id: String,
    pub agentcore_memory_id: Option<String>,
    pub aws_region: String,
    pub roles: Vec<String>,
}

impl Default for LearningsConfig {
    fn default() -> Self {
        Self {
            mode: MemoryMode::Local,
            base_path: "artifacts/memory".to_string(),
            default_org_id: "local".to_string(),
            default_actor_id: "dev".to_string(),
            agentcore_memory_id: None,
            aws_region: "us-east-1".to_string(),
            // Local development grants every role.
            roles: vec![
                "platform_admin".to_string(),
                "org_admin".to_string(),
                "org_curator".to_string(),
                "org_member".to_string(),
            ],
        }
    }
}

impl LearningsConfig {
    /// Environment-driven configuration. `AGENTCORE_MEMORY_ID` selects the
    /// hosted back-end.
    pub fn from_env() -> Self {
        let memory_id = std::env::var("AGENTCORE_MEMORY_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            mode: if memory_id.is_some() {
                MemoryMode::Hosted
            } else {
                MemoryMode::Local
            },
            base_path: std::env::var("MEMORY_BASE_PATH").unwrap_or(defaults.base_path),
            default_org_id: std::env::var("MEMORY_ORG_ID").unwrap_or(defaults.default_org_id),
            default_actor_id: std::env::var("MEMORY_ACTOR_ID").unwrap_or(defaults.default_actor_id),
            agentcore_memory_id: memory_id,
            aws_region: std::env::var("AWS_REGION").unwrap_or(defaults.aws_region),
            roles: defaults.roles,
        }
    }
}

/// A learning with its retrieval context attached.
#[derive(Debug, Clone)]
pub struct PrioritizedLearning {
    pub record: LearningRecord,
    pub namespace: String,
    pub level: NamespaceLevel,
    pub priority: f64,
}

pub struct LearningsManager {
    config: LearningsConfig,
    backend: Arc<dyn MemoryBackend>,
}

impl LearningsManager {
    pub fn new(config: LearningsConfig) -> Self {
        let backend: Arc<dyn MemoryBackend> = match config.mode {
            MemoryMode::Hosted => {
                let memory_id = config
                    .agentcore_memory_id
                    .clone()
                    .unwrap_or_else(|| "unconfigured".to_string());
                Arc::new(HostedMemoryBackend::new(memory_id, &config.aws_region))
            }
            MemoryMode::Local => Arc::new(LocalMemoryBackend::new(&config.base_path)),
        };
        Self { config, backend }
    }

    /// Inject a specific back-end (tests).
    pub fn with_backend(config: LearningsConfig, backend: Arc<dyn MemoryBackend>) -> Self {
        Self { config, backend }
    }

    pub fn backend(&self) -> &Arc<dyn MemoryBackend> {
        &self.backend
    }

    pub fn context(&self, session_id: Option<String>) -> NamespaceContext {
        NamespaceContext {
            org_id: self.config.default_org_id.clone(),
            actor_id: self.config.default_actor_id.clone(),
            session_id,
        }
    }

    /// Store a learning about a provider at the given level.
    pub async fn store_provider_learning(
        &self,
        provider: &str,
        content: serde_json::Value,
        level: NamespaceLevel,
        ctx: &NamespaceContext,
        text_for_search: Option<String>,
        tags: Vec<String>,
    ) -> MemoryResult<String> {
        let namespace = Namespaces::for_provider_learnings(provider, level, ctx)?;
        self.check_access(&namespace, ctx, AccessAction::Write)?;

        let text = text_for_search.unwrap_or_else(|| learning_to_text(&content));
        let tags = if tags.is_empty() {
            vec![provider.to_string(), "learning".to_string()]
        } else {
            tags
        };

        let mut record = LearningRecord::new(namespace, content)
            .with_text(text)
            .with_tags(tags)
            .with_created_by(ctx.actor_id.clone());
        record.confidence = INITIAL_CONFIDENCE;
        self.backend.create(record).await
    }

    /// Learnings for a provider merged across every applicable namespace,
    /// sorted by (priority, confidence) descending and bounded by `top_k`.
    pub async fn provider_learnings(
        &self,
        provider: &str,
        ctx: &NamespaceContext,
        include_session: bool,
        top_k: usize,
    ) -> MemoryResult<Vec<PrioritizedLearning>> {
        let namespaces = Namespaces::retrieval_namespaces(provider, ctx, include_session)?;
        let tags = vec![provider.to_string()];

        let mut results = Vec::new();
        for ns in &namespaces {
            let records = match self.backend.list(&ns.namespace, top_k, 0, Some(&tags)).await {
                Ok(records) => records,
                Err(err) => {
                    tracing::debug!(namespace = %ns.namespace, %err, "namespace unavailable");
                    continue;
                }
            };
            for record in records {
                results.push(PrioritizedLearning {
                    record,
                    namespace: ns.namespace.clone(),
                    level: ns.level,
                    priority: ns.priority,
                });
            }
        }

        results.sort_by(|a, b| {
            (b.priority, b.record.confidence)
                .partial_cmp(&(a.priority, a.record.confidence))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }

    /// Free-text search across the retrieval namespaces; scores are scaled
    /// by namespace priority.
    pub async fn search_learnings(
        &self,
        query: &str,
        provider: Option<&str>,
        ctx: &NamespaceContext,
        top_k: usize,
    ) -> MemoryResult<Vec<PrioritizedLearning>> {
        let ns_infos = match provider {
            Some(provider) => Namespaces::retrieval_namespaces(provider, ctx, false)?,
            None => {
                let mut infos = Vec::new();
                for (pattern, level, priority) in [
                    (
                        Namespaces::PLATFORM_LEARNINGS_GLOBAL,
                        NamespaceLevel::Platform,
                        1.00,
                    ),
                    (Namespaces::ORG_LEARNINGS_GLOBAL, NamespaceLevel::Org, 0.85),
                    (Namespaces::USER_LEARNINGS_GLOBAL, NamespaceLevel::User, 0.70),
                ] {
                    infos.push(crate::namespace::RetrievalNamespace {
                        namespace: Namespaces::build(pattern, ctx, None)?,
                        level,
                        priority,
                    });
                }
                infos
            }
        };

        let namespaces: Vec<String> = ns_infos.iter().map(|n| n.namespace.clone()).collect();
        let results: Vec<RetrievalResult> = self
            .backend
            .search(&namespaces, query, top_k, None)
            .await?;

        let mut prioritized = Vec::new();
        for result in results {
            let Some(info) = ns_infos
                .iter()
                .find(|n| n.namespace == result.source_namespace)
            else {
                continue;
            };
            prioritized.push(PrioritizedLearning {
                priority: result.score * info.priority,
                namespace: result.source_namespace,
                level: info.level,
                record: result.record,
            });
        }
        prioritized.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(prioritized)
    }

    /// Record a validation outcome: bumps the counter, nudges confidence by
    /// ±0.1 clamped to [0,1], then attempts auto-promotion. Returns the id
    /// of the promoted copy when one was created.
    pub async fn validate_learning(
        &self,
        namespace: &str,
        record_id: &str,
        success: bool,
        ctx: &NamespaceContext,
    ) -> MemoryResult<Option<String>> {
        let mut record = self
            .backend
            .get(namespace, record_id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(format!("{namespace}/{record_id}")))?;

        record.validations += 1;
        record.confidence = if success {
            (record.confidence + CONFIDENCE_DELTA).min(1.0)
        } else {
            (record.confidence - CONFIDENCE_DELTA).max(0.0)
        };
        self.backend.update(record.clone()).await?;

        if success {
            return self.check_auto_promotion(&record, ctx).await;
        }
        Ok(None)
    }

    async fn check_auto_promotion(
        &self,
        record: &LearningRecord,
        ctx: &NamespaceContext,
    ) -> MemoryResult<Option<String>> {
        let Some(level) = Namespaces::level_of(&record.namespace) else {
            return Ok(None);
        };
        let Some(rule) = promotion_rule(level) else {
            return Ok(None);
        };
        if record.validations < rule.min_validations || record.confidence < rule.min_confidence {
            return Ok(None);
        }

        if rule.requires_approval {
            self.enqueue_approval(record).await?;
            return Ok(None);
        }

        let provider = Namespaces::parse(&record.namespace).provider_id;
        self.promote_learning(
            &record.record_id,
            &record.namespace,
            ctx,
            provider.as_deref(),
            "system",
            "auto_promotion",
        )
        .await
    }

    /// Duplicate a record into the next-level namespace with a back-pointer
    /// and history entry. The source record is untouched.
    pub async fn promote_learning(
        &self,
        record_id: &str,
        from_namespace: &str,
        ctx: &NamespaceContext,
        provider: Option<&str>,
        promoted_by: &str,
        reason: &str,
    ) -> MemoryResult<Option<String>> {
        let Some(original) = self.backend.get(from_namespace, record_id).await? else {
            tracing::warn!(record_id, from_namespace, "promotion source not found");
            return Ok(None);
        };
        let Some(target_namespace) = promotion_target(from_namespace, ctx, provider)? else {
            tracing::debug!(record_id, "record already at highest level");
            return Ok(None);
        };

        // Re-promoting the same source is a no-op.
        let existing = self.backend.list(&target_namespace, 100, 0, None).await?;
        if existing
            .iter()
            .any(|r| r.promoted_from.as_deref() == Some(record_id))
        {
            return Ok(None);
        }

        let mut history = original.promotion_history.clone();
        history.push(PromotionEvent {
            from_namespace: from_namespace.to_string(),
            from_record_id: original.record_id.clone(),
            promoted_at: Utc::now(),
            promoted_by: promoted_by.to_string(),
            reason: reason.to_string(),
            validations_at_promotion: original.validations,
            confidence_at_promotion: original.confidence,
        });

        let mut promoted = LearningRecord::new(target_namespace.clone(), original.content.clone());
        promoted.text_for_search = original.text_for_search.clone();
        promoted.created_by = Some(promoted_by.to_string());
        promoted.promoted_from = Some(original.record_id.clone());
        promoted.promotion_history = history;
        promoted.tags = original.tags.clone();
        promoted.validations = original.validations;
        promoted.confidence = original.confidence;

        let new_id = self.backend.create(promoted).await?;
        tracing::info!(from = from_namespace, to = %target_namespace, "promoted learning");
        Ok(Some(new_id))
    }

    async fn enqueue_approval(&self, record: &LearningRecord) -> MemoryResult<()> {
        let queue = Namespaces::PLATFORM_PROMOTION_QUEUE;
        let pending = self.backend.list(queue, 100, 0, None).await?;
        let already_queued = pending.iter().any(|r| {
            r.content.get("from_record_id").and_then(|v| v.as_str()) == Some(&record.record_id)
        });
        if already_queued {
            return Ok(());
        }

        let request = LearningRecord::new(
            queue,
            json!({
                "from_record_id": record.record_id,
                "from_namespace": record.namespace,
                "validations": record.validations,
                "confidence": record.confidence,
            }),
        )
        .with_tags(vec!["promotion_request".to_string()]);
        self.backend.create(request).await?;
        tracing::info!(record_id = %record.record_id, "queued promotion for approval");
        Ok(())
    }

    /// Pending org->platform promotions awaiting an admin decision.
    pub async fn pending_approvals(&self) -> MemoryResult<Vec<LearningRecord>> {
        self.backend
            .list(Namespaces::PLATFORM_PROMOTION_QUEUE, 100, 0, None)
            .await
    }

    /// Explicit admin operation: apply a queued promotion and remove it from
    /// the queue.
    pub async fn approve_promotion(
        &self,
        queue_record_id: &str,
        ctx: &NamespaceContext,
        approved_by: &str,
    ) -> MemoryResult<Option<String>> {
        let queue = Namespaces::PLATFORM_PROMOTION_QUEUE;
        let Some(request) = self.backend.get(queue, queue_record_id).await? else {
            return Err(MemoryError::NotFound(format!("{queue}/{queue_record_id}")));
        };

        let from_namespace = request
            .content
            .get("from_namespace")
            .and_then(|v| v.as_str())
            .ok_or_else(|| MemoryError::Backend("malformed promotion request".to_string()))?
            .to_string();
        let from_record_id = request
            .content
            .get("from_record_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| MemoryError::Backend("malformed promotion request".to_string()))?
            .to_string();

        let provider = Namespaces::parse(&from_namespace).provider_id;
        let promoted = self
            .promote_learning(
                &from_record_id,
                &from_namespace,
                ctx,
                provider.as_deref(),
                approved_by,
                "approved_promotion",
            )
            .await?;
        self.backend.delete(queue, queue_record_id).await?;
        Ok(promoted)
    }

    fn check_access(
        &self,
        namespace: &str,
        ctx: &NamespaceContext,
        action: AccessAction,
    ) -> MemoryResult<()> {
        if Namespaces::validate_access(
            namespace,
            &ctx.org_id,
            &ctx.actor_id,
            action,
            &self.config.roles,
        ) {
            Ok(())
        } else {
            Err(MemoryError::AccessDenied(format!(
                "actor `{}` cannot {:?} `{}`",
                ctx.actor_id, action, namespace
            )))
        }
    }
}

fn learning_to_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::Object(map) => map
            .values()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Array(items) => Some(
                    items
                        .iter()
                        .filter_map(|i| i.as_str())
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local_manager(dir: &std::path::Path) -> LearningsManager {
        let config = LearningsConfig {
            base_path: dir.display().to_string(),
            default_org_id: "acme".to_string(),
            default_actor_id: "alice".to_string(),
            ..LearningsConfig::default()
        };
        LearningsManager::new(config)
    }

    #[tokio::test]
    async fn store_and_retrieve_by_priority() {
        let dir = tempfile::tempdir().unwrap();
        let manager = local_manager(dir.path());
        let ctx = manager.context(None);

        manager
            .store_provider_learning(
                "luma",
                json!({"pattern": "concrete nouns"}),
                NamespaceLevel::User,
                &ctx,
                None,
                Vec::new(),
            )
            .await
            .unwrap();
        manager
            .store_provider_learning(
                "luma",
                json!({"pattern": "camera verbs"}),
                NamespaceLevel::Org,
                &ctx,
                None,
                Vec::new(),
            )
            .await
            .unwrap();

        let learnings = manager
            .provider_learnings("luma", &ctx, false, 10)
            .await
            .unwrap();
        assert_eq!(learnings.len(), 2);
        // Org entries (priority 0.80) outrank user entries (0.65).
        assert_eq!(learnings[0].level, NamespaceLevel::Org);
        assert_eq!(learnings[1].level, NamespaceLevel::User);
    }

    #[tokio::test]
    async fn validations_drive_auto_promotion_to_org() {
        let dir = tempfile::tempdir().unwrap();
        let manager = local_manager(dir.path());
        let ctx = manager.context(None);

        let id = manager
            .store_provider_learning(
                "luma",
                json!({"pattern": "short prompts"}),
                NamespaceLevel::User,
                &ctx,
                None,
                Vec::new(),
            )
            .await
            .unwrap();
        let user_ns = "/org/acme/actor/alice/learnings/provider/luma";

        let mut promoted = None;
        for _ in 0..3 {
            promoted = manager
                .validate_learning(user_ns, &id, true, &ctx)
                .await
                .unwrap();
        }
        let promoted_id = promoted.expect("promoted after the final validation");

        // The copy lives at org level with a back-pointer and one history
        // entry referencing the user namespace.
        let org_ns = "/org/acme/learnings/provider/luma";
        let copy = manager
            .backend()
            .get(org_ns, &promoted_id)
            .await
            .unwrap()
            .expect("org copy exists");
        assert_eq!(copy.promoted_from.as_deref(), Some(id.as_str()));
        assert_eq!(copy.promotion_history.len(), 1);
        assert_eq!(copy.promotion_history[0].from_namespace, user_ns);

        // Original remains, id unchanged.
        let original = manager
            .backend()
            .get(user_ns, &id)
            .await
            .unwrap()
            .expect("original still present");
        assert_eq!(original.record_id, id);
        assert_eq!(original.validations, 3);
    }

    #[tokio::test]
    async fn failed_validations_lower_confidence_and_never_promote() {
        let dir = tempfile::tempdir().unwrap();
        let manager = local_manager(dir.path());
        let ctx = manager.context(None);

        let id = manager
            .store_provider_learning(
                "runway",
                json!({"pattern": "avoid text rendering"}),
                NamespaceLevel::User,
                &ctx,
                None,
                Vec::new(),
            )
            .await
            .unwrap();
        let ns = "/org/acme/actor/alice/learnings/provider/runway";

        for _ in 0..4 {
            let promoted = manager.validate_learning(ns, &id, false, &ctx).await.unwrap();
            assert!(promoted.is_none());
        }
        let record = manager.backend().get(ns, &id).await.unwrap().unwrap();
        assert_eq!(record.validations, 4);
        assert!((record.confidence - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn org_to_platform_promotion_is_queued_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        let manager = local_manager(dir.path());
        let ctx = manager.context(None);

        let id = manager
            .store_provider_learning(
                "luma",
                json!({"pattern": "dusk lighting"}),
                NamespaceLevel::Org,
                &ctx,
                None,
                Vec::new(),
            )
            .await
            .unwrap();
        let org_ns = "/org/acme/learnings/provider/luma";

        for _ in 0..5 {
            manager.validate_learning(org_ns, &id, true, &ctx).await.unwrap();
        }

        // Nothing appeared at platform level; the request sits in the queue.
        let platform = manager
            .backend()
            .list("/platform/learnings/provider/luma", 10, 0, None)
            .await
            .unwrap();
        assert!(platform.is_empty());

        let approvals = manager.pending_approvals().await.unwrap();
        assert_eq!(approvals.len(), 1);

        // Explicit approval applies it.
        let promoted = manager
            .approve_promotion(&approvals[0].record_id, &ctx, "platform-admin")
            .await
            .unwrap();
        assert!(promoted.is_some());
        assert!(manager.pending_approvals().await.unwrap().is_empty());
        let platform = manager
            .backend()
            .list("/platform/learnings/provider/luma", 10, 0, None)
            .await
            .unwrap();
        assert_eq!(platform.len(), 1);
    }
}
