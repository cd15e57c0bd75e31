use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

/// Per-browsing-session conversational context. Lives only in process
/// memory; never written to durable storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub user_id: Option<String>,
    pub user_role: String,
    pub current_page: String,
    pub page_context: BTreeMap<String, String>,
    pub thread_id: Option<ThreadId>,
    pub timestamp: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, user_role: impl Into<String>) -> Self {
        Self {
            session_id: SessionId(session_id.into()),
            user_id: None,
            user_role: user_role.into(),
            current_page: String::new(),
            page_context: BTreeMap::new(),
            thread_id: None,
            timestamp: Utc::now(),
        }
    }
}

/// Rolling cross-page "co-pilot" context attached to a session. Lists are
/// most-recent-first and capped by the session store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopilotState {
    pub recent_record_ids: Vec<String>,
    pub recent_searches: Vec<String>,
    pub current_filters: BTreeMap<String, String>,
    pub conversation_summary: Option<String>,
}

/// The merged view handed to the orchestrator. Assembled in exactly one
/// place: `SessionStore::enriched_context`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedContext {
    pub session: SessionContext,
    pub copilot: CopilotState,
}

impl EnrichedContext {
    /// Context digest safe to hand to the language-model backend: role,
    /// page, and boolean presence flags only. Raw record ids, search terms,
    /// and filter values stay on this side of the wire.
    pub fn redacted_digest(&self) -> String {
        let mut parts = vec![
            format!("role={}", self.session.user_role),
            format!("page={}", self.session.current_page),
        ];
        if !self.copilot.recent_record_ids.is_empty() {
            parts.push("has_recent_records=true".to_owned());
        }
        if !self.copilot.recent_searches.is_empty() {
            parts.push("has_recent_searches=true".to_owned());
        }
        if !self.copilot.current_filters.is_empty() {
            parts.push("has_active_filters=true".to_owned());
        }
        if self.copilot.conversation_summary.is_some() {
            parts.push("has_conversation_summary=true".to_owned());
        }
        parts.join(" ")
    }
}
