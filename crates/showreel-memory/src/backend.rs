use async_trait::async_trait;

use crate::types::{LearningRecord, MemoryResult, RetrievalResult};

/// Storage contract shared by the local JSON back-end and the hosted
/// service back-end. Retrieval returns value copies; callers never hold
/// references into a back-end's state.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Append a record. Must be durable before returning the id.
    async fn create(&self, record: LearningRecord) -> MemoryResult<String>;

    async fn get(&self, namespace: &str, record_id: &str) -> MemoryResult<Option<LearningRecord>>;

    /// Update in place; bumps `updated_at`. Returns false if absent.
    async fn update(&self, record: LearningRecord) -> MemoryResult<bool>;

    async fn delete(&self, namespace: &str, record_id: &str) -> MemoryResult<bool>;

    /// Newest-first listing with optional tag filter.
    async fn list(
        &self,
        namespace: &str,
        limit: usize,
        offset: usize,
        tags: Option<&[String]>,
    ) -> MemoryResult<Vec<LearningRecord>>;

    /// Scored search across namespaces. The local back-end scores by word
    /// overlap; the hosted back-end scores semantically.
    async fn search(
        &self,
        namespaces: &[String],
        query: &str,
        top_k: usize,
        tags: Option<&[String]>,
    ) -> MemoryResult<Vec<RetrievalResult>>;

    async fn namespace_exists(&self, namespace: &str) -> MemoryResult<bool>;

    /// Remove every record in a namespace; returns the count removed.
    async fn delete_namespace(&self, namespace: &str) -> MemoryResult<usize>;
}

/// Tag filter shared by back-ends: a record matches when it carries every
/// requested tag.
pub(crate) fn matches_tags(record: &LearningRecord, tags: Option<&[String]>) -> bool {
    match tags {
        None => true,
        Some(wanted) => wanted.iter().all(|t| record.tags.iter().any(|rt| rt == t)),
    }
}
