// Hosted back-end: thin HTTP client against the managed memory service's
// data plane. Selected when `AGENTCORE_MEMORY_ID` is present; the service
// enforces access control server-side and scores search semantically.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::backend::{matches_tags, MemoryBackend};
use crate::types::{LearningRecord, MemoryError, MemoryResult, RetrievalResult};

pub struct HostedMemoryBackend {
    memory_id: String,
    base_url: String,
    client: Client,
}

impl HostedMemoryBackend {
    pub fn new(memory_id: impl Into<String>, region: &str) -> Self {
        Self {
            memory_id: memory_id.into(),
            base_url: format!("https://bedrock-agentcore.{region}.amazonaws.com"),
            client: Client::new(),
        }
    }

    /// Point the client at a non-default endpoint (tests, gateways).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn records_url(&self) -> String {
        format!("{}/memories/{}/records", self.base_url, self.memory_id)
    }

    async fn check(&self, response: reqwest::Response) -> MemoryResult<serde_json::Value> {
        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MemoryError::Backend(format!("response decode: {e}")))?;
        if !status.is_success() {
            let detail = value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("memory service returned {status}"));
            return Err(MemoryError::Backend(detail));
        }
        Ok(value)
    }
}

#[async_trait]
impl MemoryBackend for HostedMemoryBackend {
    async fn create(&self, record: LearningRecord) -> MemoryResult<String> {
        let record_id = record.record_id.clone();
        let response = self
            .client
            .post(self.records_url())
            .json(&record)
            .send()
            .await
            .map_err(|e| MemoryError::Backend(format!("create: {e}")))?;
        self.check(response).await?;
        Ok(record_id)
    }

    async fn get(&self, namespace: &str, record_id: &str) -> MemoryResult<Option<LearningRecord>> {
        let url = format!("{}/{}", self.records_url(), record_id);
        let response = self
            .client
            .get(url)
            .query(&[("namespace", namespace)])
            .send()
            .await
            .map_err(|e| MemoryError::Backend(format!("get: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value = self.check(response).await?;
        let record: LearningRecord = serde_json::from_value(value)?;
        Ok(Some(record))
    }

    async fn update(&self, record: LearningRecord) -> MemoryResult<bool> {
        let url = format!("{}/{}", self.records_url(), record.record_id);
        let response = self
            .client
            .put(url)
            .json(&record)
            .send()
            .await
            .map_err(|e| MemoryError::Backend(format!("update: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        self.check(response).await?;
        Ok(true)
    }

    async fn delete(&self, namespace: &str, record_id: &str) -> MemoryResult<bool> {
        let url = format!("{}/{}", self.records_url(), record_id);
        let response = self
            .client
            .delete(url)
            .query(&[("namespace", namespace)])
            .send()
            .await
            .map_err(|e| MemoryError::Backend(format!("delete: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        self.check(response).await?;
        Ok(true)
    }

    async fn list(
        &self,
        namespace: &str,
        limit: usize,
        offset: usize,
        tags: Option<&[String]>,
    ) -> MemoryResult<Vec<LearningRecord>> {
        let response = self
            .client
            .get(self.records_url())
            .query(&[
                ("namespace", namespace.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(|e| MemoryError::Backend(format!("list: {e}")))?;
        let value = self.check(response).await?;
        let records: Vec<LearningRecord> =
            serde_json::from_value(value.get("records").cloned().unwrap_or(json!([])))?;
        // Tag filtering stays client-side so local and hosted agree exactly.
        Ok(records
            .into_iter()
            .filter(|r| matches_tags(r, tags))
            .collect())
    }

    async fn search(
        &self,
        namespaces: &[String],
        query: &str,
        top_k: usize,
        tags: Option<&[String]>,
    ) -> MemoryResult<Vec<RetrievalResult>> {
        let response = self
            .client
            .post(format!("{}/search", self.records_url()))
            .json(&json!({
                "namespaces": namespaces,
                "query": query,
                "top_k": top_k,
            }))
            .send()
            .await
            .map_err(|e| MemoryError::Backend(format!("search: {e}")))?;
        let value = self.check(response).await?;
        let results: Vec<RetrievalResult> =
            serde_json::from_value(value.get("results").cloned().unwrap_or(json!([])))?;
        Ok(results
            .into_iter()
            .filter(|r| matches_tags(&r.record, tags))
            .take(top_k)
            .collect())
    }

    async fn namespace_exists(&self, namespace: &str) -> MemoryResult<bool> {
        Ok(!self.list(namespace, 1, 0, None).await?.is_empty())
    }

    async fn delete_namespace(&self, namespace: &str) -> MemoryResult<usize> {
        let response = self
            .client
            .delete(self.records_url())
            .query(&[("namespace", namespace)])
            .send()
            .await
            .map_err(|e| MemoryError::Backend(format!("delete_namespace: {e}")))?;
        let value = self.check(response).await?;
        Ok(value
            .get("deleted")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize)
    }
}
