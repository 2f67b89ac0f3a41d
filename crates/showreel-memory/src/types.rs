// Learnings record types and error types for the memory system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One promotion step in a record's history. Append-only; each entry
/// references the namespace the record was promoted out of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub from_namespace: String,
    pub from_record_id: String,
    pub promoted_at: DateTime<Utc>,
    pub promoted_by: String,
    pub reason: String,
    pub validations_at_promotion: u32,
    pub confidence_at_promotion: f64,
}

/// A stored piece of guidance usable to bias future prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRecord {
    pub record_id: String,
    pub namespace: String,
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_for_search: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default)]
    pub validations: u32,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_from: Option<String>,
    #[serde(default)]
    pub promotion_history: Vec<PromotionEvent>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LearningRecord {
    pub fn new(namespace: impl Into<String>, content: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            record_id: Uuid::new_v4().to_string(),
            namespace: namespace.into(),
            content,
            text_for_search: None,
            created_at: now,
            updated_at: now,
            created_by: None,
            validations: 0,
            confidence: 0.0,
            promoted_from: None,
            promotion_history: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_for_search = Some(text.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }
}

/// Result from a search across namespaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub record: LearningRecord,
    pub score: f64,
    pub source_namespace: String,
}

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
