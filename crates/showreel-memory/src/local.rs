// Local JSON back-end: one document per namespace under
// `{base_path}/{namespace-as-path}.json`, guarded by a per-namespace lock.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::backend::{matches_tags, MemoryBackend};
use crate::namespace::Namespaces;
use crate::types::{LearningRecord, MemoryError, MemoryResult, RetrievalResult};

#[derive(Debug, Serialize, Deserialize)]
struct NamespaceFile {
    namespace: String,
    updated_at: DateTime<Utc>,
    record_count: usize,
    records: Vec<LearningRecord>,
}

pub struct LocalMemoryBackend {
    base_path: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LocalMemoryBackend {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn namespace_lock(&self, namespace: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn file_path(&self, namespace: &str) -> PathBuf {
        self.base_path.join(Namespaces::to_path(namespace))
    }

    async fn read_namespace(&self, namespace: &str) -> MemoryResult<Vec<LearningRecord>> {
        let path = self.file_path(namespace);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&path).await?;
        let file: NamespaceFile = serde_json::from_str(&raw)?;
        Ok(file.records)
    }

    async fn write_namespace(
        &self,
        namespace: &str,
        records: Vec<LearningRecord>,
    ) -> MemoryResult<()> {
        let path = self.file_path(namespace);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = NamespaceFile {
            namespace: namespace.to_string(),
            updated_at: Utc::now(),
            record_count: records.len(),
            records,
        };
        let raw = serde_json::to_string_pretty(&file)?;
        fs::write(&path, raw).await?;
        // Durable before returning: the create contract requires it.
        let handle = fs::File::open(&path).await?;
        handle.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for LocalMemoryBackend {
    async fn create(&self, record: LearningRecord) -> MemoryResult<String> {
        let lock = self.namespace_lock(&record.namespace).await;
        let _guard = lock.lock().await;

        let record_id = record.record_id.clone();
        let namespace = record.namespace.clone();
        let mut records = self.read_namespace(&namespace).await?;
        records.push(record);
        self.write_namespace(&namespace, records).await?;
        Ok(record_id)
    }

    async fn get(&self, namespace: &str, record_id: &str) -> MemoryResult<Option<LearningRecord>> {
        let records = self.read_namespace(namespace).await?;
        Ok(records.into_iter().find(|r| r.record_id == record_id))
    }

    async fn update(&self, mut record: LearningRecord) -> MemoryResult<bool> {
        let lock = self.namespace_lock(&record.namespace).await;
        let _guard = lock.lock().await;

        let namespace = record.namespace.clone();
        let mut records = self.read_namespace(&namespace).await?;
        let Some(slot) = records
            .iter_mut()
            .find(|r| r.record_id == record.record_id)
        else {
            return Ok(false);
        };
        record.updated_at = Utc::now();
        *slot = record;
        self.write_namespace(&namespace, records).await?;
        Ok(true)
    }

    async fn delete(&self, namespace: &str, record_id: &str) -> MemoryResult<bool> {
        let lock = self.namespace_lock(namespace).await;
        let _guard = lock.lock().await;

        let mut records = self.read_namespace(namespace).await?;
        let before = records.len();
        records.retain(|r| r.record_id != record_id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_namespace(namespace, records).await?;
        Ok(true)
    }

    async fn list(
        &self,
        namespace: &str,
        limit: usize,
        offset: usize,
        tags: Option<&[String]>,
    ) -> MemoryResult<Vec<LearningRecord>> {
        let mut records = self.read_namespace(namespace).await?;
        records.retain(|r| matches_tags(r, tags));
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn search(
        &self,
        namespaces: &[String],
        query: &str,
        top_k: usize,
        tags: Option<&[String]>,
    ) -> MemoryResult<Vec<RetrievalResult>> {
        let query_words = tokenize(query);
        if query_words.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for namespace in namespaces {
            let records = match self.read_namespace(namespace).await {
                Ok(records) => records,
                Err(err) => {
                    tracing::debug!(namespace = %namespace, %err, "skipping unreadable namespace");
                    continue;
                }
            };
            for record in records {
                if !matches_tags(&record, tags) {
                    continue;
                }
                let score = overlap_score(&query_words, &record);
                if score > 0.0 {
                    results.push(RetrievalResult {
                        source_namespace: namespace.clone(),
                        record,
                        score,
                    });
                }
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }

    async fn namespace_exists(&self, namespace: &str) -> MemoryResult<bool> {
        Ok(!self.read_namespace(namespace).await?.is_empty())
    }

    async fn delete_namespace(&self, namespace: &str) -> MemoryResult<usize> {
        let lock = self.namespace_lock(namespace).await;
        let _guard = lock.lock().await;

        let records = self.read_namespace(namespace).await?;
        let count = records.len();
        let path = self.file_path(namespace);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(count)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Fraction of query words present in the record's searchable text.
fn overlap_score(query_words: &HashSet<String>, record: &LearningRecord) -> f64 {
    let haystack = match &record.text_for_search {
        Some(text) => text.clone(),
        None => record.content.to_string(),
    };
    let record_words = tokenize(&haystack);
    let matched = query_words.intersection(&record_words).count();
    matched as f64 / query_words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(namespace: &str, text: &str) -> LearningRecord {
        LearningRecord::new(namespace, json!({ "pattern": text })).with_text(text)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalMemoryBackend::new(dir.path());

        let rec = record("/platform/learnings/global", "use concrete nouns");
        let id = backend.create(rec).await.unwrap();

        let fetched = backend
            .get("/platform/learnings/global", &id)
            .await
            .unwrap()
            .expect("record exists");
        assert_eq!(fetched.text_for_search.as_deref(), Some("use concrete nouns"));
        assert!(fetched.promotion_history.is_empty());
    }

    #[tokio::test]
    async fn namespace_file_layout_matches_contract() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalMemoryBackend::new(dir.path());
        backend
            .create(record("/org/acme/learnings/global", "short scenes work"))
            .await
            .unwrap();

        let path = dir.path().join("org/acme/learnings/global.json");
        assert!(path.exists());
        let raw = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["namespace"], "/org/acme/learnings/global");
        assert_eq!(value["record_count"], 1);
        assert!(value["records"].is_array());
    }

    #[tokio::test]
    async fn list_is_newest_first_with_offset() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalMemoryBackend::new(dir.path());
        let ns = "/org/acme/learnings/global";

        for i in 0..3 {
            let mut rec = record(ns, &format!("learning {i}"));
            rec.created_at = Utc::now() + chrono::Duration::seconds(i);
            backend.create(rec).await.unwrap();
        }

        let listed = backend.list(ns, 2, 0, None).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].text_for_search.as_deref(), Some("learning 2"));

        let offset = backend.list(ns, 10, 2, None).await.unwrap();
        assert_eq!(offset.len(), 1);
        assert_eq!(offset[0].text_for_search.as_deref(), Some("learning 0"));
    }

    #[tokio::test]
    async fn search_scores_by_word_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalMemoryBackend::new(dir.path());
        let ns = "/org/acme/learnings/provider/luma".to_string();

        backend
            .create(record(&ns, "luma handles camera motion prompts well"))
            .await
            .unwrap();
        backend
            .create(record(&ns, "avoid crowd scenes"))
            .await
            .unwrap();

        let results = backend
            .search(&[ns.clone()], "camera motion", 5, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-9);
        assert_eq!(results[0].source_namespace, ns);
    }

    #[tokio::test]
    async fn tag_filter_requires_all_tags() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalMemoryBackend::new(dir.path());
        let ns = "/org/acme/learnings/global";

        backend
            .create(record(ns, "tagged").with_tags(vec!["luma".into(), "learning".into()]))
            .await
            .unwrap();
        backend.create(record(ns, "untagged")).await.unwrap();

        let tags = vec!["luma".to_string()];
        let listed = backend.list(ns, 10, 0, Some(&tags)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text_for_search.as_deref(), Some("tagged"));
    }

    #[tokio::test]
    async fn delete_namespace_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalMemoryBackend::new(dir.path());
        let ns = "/org/acme/actor/alice/learnings/global";

        backend.create(record(ns, "a")).await.unwrap();
        backend.create(record(ns, "b")).await.unwrap();
        assert!(backend.namespace_exists(ns).await.unwrap());

        let removed = backend.delete_namespace(ns).await.unwrap();
        assert_eq!(removed, 2);
        assert!(!backend.namespace_exists(ns).await.unwrap());
    }

    #[tokio::test]
    async fn serde_preserves_promotion_history_order() {
        let mut rec = record("/platform/learnings/global", "ordered history");
        for i in 0..3 {
            rec.promotion_history.push(crate::types::PromotionEvent {
                from_namespace: format!("/org/acme/level{i}"),
                from_record_id: format!("id-{i}"),
                promoted_at: Utc::now(),
                promoted_by: "system".to_string(),
                reason: "auto_promotion".to_string(),
                validations_at_promotion: i,
                confidence_at_promotion: 0.5,
            });
        }

        let raw = serde_json::to_string(&rec).unwrap();
        let back: LearningRecord = serde_json::from_str(&raw).unwrap();
        let namespaces: Vec<&str> = back
            .promotion_history
            .iter()
            .map(|e| e.from_namespace.as_str())
            .collect();
        assert_eq!(
            namespaces,
            vec!["/org/acme/level0", "/org/acme/level1", "/org/acme/level2"]
        );
    }
}
