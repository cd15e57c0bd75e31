use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Permit,
    Complaint,
}

/// Read-only projection returned by the record directory collaborators.
/// The full records live in the CRUD modules, outside this core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub ticket: String,
    pub kind: RecordKind,
    pub title: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// An FAQ knowledge-base entry with its search relevance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub title: String,
    pub body: String,
    pub relevance: f64,
}
