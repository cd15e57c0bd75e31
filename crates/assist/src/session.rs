use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use permitdesk_core::config::SessionConfig;
use permitdesk_core::{CopilotState, EnrichedContext, SessionContext, SessionId, ThreadId};

#[derive(Clone, Debug)]
struct SessionEntry {
    context: SessionContext,
    copilot: CopilotState,
    last_activity: DateTime<Utc>,
}

/// In-memory per-session state with TTL expiry. Expiry is enforced lazily on
/// every access, plus a periodic background sweep for idle sessions.
///
/// Per-session entries are independent values; the map guard is held only
/// for short, await-free critical sections, so unrelated sessions never
/// serialize against each other for long.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    ttl: chrono::Duration,
    sweep_interval: Duration,
    recent_cap: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl: chrono::Duration::seconds(config.ttl_secs as i64),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            recent_cap: config.recent_cap,
        }
    }

    /// Insert or refresh a session from the caller-supplied context. The
    /// caller owns navigation state (page, page context); we own the thread
    /// handle and copilot lists, which survive the upsert.
    pub async fn upsert(&self, context: SessionContext) {
        let mut sessions = self.inner.write().await;
        let now = Utc::now();
        match sessions.get_mut(&context.session_id) {
            Some(entry) if !self.is_expired(entry, now) => {
                let thread_id = entry.context.thread_id.clone().or(context.thread_id.clone());
                entry.context = SessionContext { thread_id, timestamp: now, ..context };
                entry.last_activity = now;
            }
            _ => {
                let session_id = context.session_id.clone();
                sessions.insert(
                    session_id,
                    SessionEntry {
                        context: SessionContext { timestamp: now, ..context },
                        copilot: CopilotState::default(),
                        last_activity: now,
                    },
                );
            }
        }
    }

    /// Fetch a live session. An entry idle past the TTL is evicted and
    /// reported as absent rather than returned stale.
    pub async fn get(&self, session_id: &SessionId) -> Option<SessionContext> {
        self.with_live_entry(session_id, |entry| entry.context.clone()).await
    }

    pub async fn set_thread(&self, session_id: &SessionId, thread_id: ThreadId) -> bool {
        self.with_live_entry(session_id, |entry| {
            entry.context.thread_id = Some(thread_id.clone());
        })
        .await
        .is_some()
    }

    pub async fn thread(&self, session_id: &SessionId) -> Option<ThreadId> {
        self.with_live_entry(session_id, |entry| entry.context.thread_id.clone()).await.flatten()
    }

    pub async fn add_recent_record(&self, session_id: &SessionId, record_id: impl Into<String>) {
        let record_id = record_id.into();
        let cap = self.recent_cap;
        self.with_live_entry(session_id, move |entry| {
            push_recent(&mut entry.copilot.recent_record_ids, record_id, cap);
        })
        .await;
    }

    pub async fn add_recent_search(&self, session_id: &SessionId, search: impl Into<String>) {
        let search = search.into();
        let cap = self.recent_cap;
        self.with_live_entry(session_id, move |entry| {
            push_recent(&mut entry.copilot.recent_searches, search, cap);
        })
        .await;
    }

    pub async fn set_filters(&self, session_id: &SessionId, filters: BTreeMap<String, String>) {
        self.with_live_entry(session_id, move |entry| {
            entry.copilot.current_filters = filters.clone();
        })
        .await;
    }

    pub async fn set_summary(&self, session_id: &SessionId, summary: impl Into<String>) {
        let summary = summary.into();
        self.with_live_entry(session_id, move |entry| {
            entry.copilot.conversation_summary = Some(summary.clone());
        })
        .await;
    }

    /// The sole place base context and copilot state merge into the view the
    /// orchestrator passes downstream.
    pub async fn enriched_context(&self, session_id: &SessionId) -> Option<EnrichedContext> {
        self.with_live_entry(session_id, |entry| EnrichedContext {
            session: entry.context.clone(),
            copilot: entry.copilot.clone(),
        })
        .await
    }

    pub async fn delete(&self, session_id: &SessionId) -> bool {
        self.inner.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Evict every session idle past the TTL. Returns the evicted ids so
    /// the caller can cascade cleanup of state keyed by session.
    pub async fn sweep(&self) -> Vec<SessionId> {
        let now = Utc::now();
        let mut sessions = self.inner.write().await;
        let mut evicted = Vec::new();
        sessions.retain(|session_id, entry| {
            let expired = self.is_expired(entry, now);
            if expired {
                evicted.push(session_id.clone());
            }
            !expired
        });
        if !evicted.is_empty() {
            debug!(
                event_name = "chat.session.sweep",
                evicted = evicted.len(),
                remaining = sessions.len(),
                "idle sessions evicted"
            );
        }
        evicted
    }

    pub(crate) fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    fn is_expired(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        now - entry.last_activity > self.ttl
    }

    async fn with_live_entry<T>(
        &self,
        session_id: &SessionId,
        apply: impl FnOnce(&mut SessionEntry) -> T,
    ) -> Option<T> {
        let mut sessions = self.inner.write().await;
        let now = Utc::now();
        let expired = sessions
            .get(session_id)
            .map(|entry| self.is_expired(entry, now))
            .unwrap_or(false);
        if expired {
            sessions.remove(session_id);
            debug!(
                event_name = "chat.session.lazy_evicted",
                session_id = %session_id.0,
                "expired session evicted on access"
            );
            return None;
        }

        sessions.get_mut(session_id).map(|entry| {
            entry.last_activity = now;
            apply(entry)
        })
    }

    #[cfg(test)]
    async fn backdate(&self, session_id: &SessionId, by: chrono::Duration) {
        let mut sessions = self.inner.write().await;
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_activity -= by;
        }
    }
}

/// Most-recent-first, deduplicated by value, capped.
fn push_recent(list: &mut Vec<String>, value: String, cap: usize) {
    list.retain(|existing| existing != &value);
    list.insert(0, value);
    list.truncate(cap);
}

#[cfg(test)]
mod tests {
    use permitdesk_core::config::SessionConfig;
    use permitdesk_core::{SessionContext, SessionId, ThreadId};

    use super::SessionStore;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig { ttl_secs: 1800, sweep_interval_secs: 300, recent_cap: 10 })
    }

    fn session(id: &str) -> SessionContext {
        SessionContext::new(id, "clerk")
    }

    #[tokio::test]
    async fn get_returns_what_upsert_stored() {
        let store = store();
        store.upsert(session("sess-1")).await;

        let context = store.get(&SessionId("sess-1".to_owned())).await.expect("session exists");
        assert_eq!(context.session_id.0, "sess-1");
        assert!(context.thread_id.is_none());
    }

    #[tokio::test]
    async fn expired_session_is_not_found_even_without_delete() {
        let store = store();
        let id = SessionId("sess-ttl".to_owned());
        store.upsert(session("sess-ttl")).await;

        store.backdate(&id, chrono::Duration::minutes(31)).await;

        assert!(store.get(&id).await.is_none(), "idle past TTL must read as absent");
        assert_eq!(store.len().await, 0, "lazy eviction removes the entry");
    }

    #[tokio::test]
    async fn access_refreshes_the_idle_clock() {
        let store = store();
        let id = SessionId("sess-live".to_owned());
        store.upsert(session("sess-live")).await;

        store.backdate(&id, chrono::Duration::minutes(20)).await;
        assert!(store.get(&id).await.is_some(), "20 minutes idle is still live");

        store.backdate(&id, chrono::Duration::minutes(20)).await;
        assert!(store.get(&id).await.is_some(), "read refreshed last_activity");
    }

    #[tokio::test]
    async fn sweep_evicts_idle_sessions_in_bulk() {
        let store = store();
        store.upsert(session("sess-a")).await;
        store.upsert(session("sess-b")).await;
        store.backdate(&SessionId("sess-a".to_owned()), chrono::Duration::hours(2)).await;

        let evicted = store.sweep().await;
        assert_eq!(evicted, vec![SessionId("sess-a".to_owned())]);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&SessionId("sess-b".to_owned())).await.is_some());
    }

    #[tokio::test]
    async fn recent_searches_are_capped_deduped_and_most_recent_first() {
        let store = store();
        let id = SessionId("sess-recent".to_owned());
        store.upsert(session("sess-recent")).await;

        for index in 0..11 {
            store.add_recent_search(&id, format!("search-{index}")).await;
        }

        let enriched = store.enriched_context(&id).await.expect("session exists");
        let searches = enriched.copilot.recent_searches;
        assert_eq!(searches.len(), 10, "cap is 10");
        assert_eq!(searches.first().map(String::as_str), Some("search-10"));
        assert!(!searches.contains(&"search-0".to_owned()), "oldest entry dropped");

        // Re-adding an existing value moves it to the front without a dup.
        store.add_recent_search(&id, "search-5").await;
        let enriched = store.enriched_context(&id).await.expect("session exists");
        let searches = enriched.copilot.recent_searches;
        assert_eq!(searches.first().map(String::as_str), Some("search-5"));
        assert_eq!(searches.iter().filter(|value| *value == "search-5").count(), 1);
        assert_eq!(searches.len(), 10);
    }

    #[tokio::test]
    async fn thread_handle_survives_context_upserts() {
        let store = store();
        let id = SessionId("sess-thread".to_owned());
        store.upsert(session("sess-thread")).await;
        assert!(store.set_thread(&id, ThreadId("thread-1".to_owned())).await);

        // Navigation updates the context but must not drop the open thread.
        let mut refreshed = session("sess-thread");
        refreshed.current_page = "/companies".to_owned();
        store.upsert(refreshed).await;

        assert_eq!(store.thread(&id).await, Some(ThreadId("thread-1".to_owned())));
    }

    #[tokio::test]
    async fn enriched_context_merges_session_and_copilot() {
        let store = store();
        let id = SessionId("sess-merge".to_owned());
        let mut context = session("sess-merge");
        context.current_page = "/permits".to_owned();
        store.upsert(context).await;
        store.add_recent_record(&id, "PRM-2026-0042").await;

        let enriched = store.enriched_context(&id).await.expect("session exists");
        assert_eq!(enriched.session.current_page, "/permits");
        assert_eq!(enriched.copilot.recent_record_ids, vec!["PRM-2026-0042".to_owned()]);
    }

    #[tokio::test]
    async fn sessions_are_isolated_from_each_other() {
        let store = store();
        store.upsert(session("sess-x")).await;
        store.upsert(session("sess-y")).await;
        store.add_recent_search(&SessionId("sess-x".to_owned()), "paving").await;

        let other = store
            .enriched_context(&SessionId("sess-y".to_owned()))
            .await
            .expect("session exists");
        assert!(other.copilot.recent_searches.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_session() {
        let store = store();
        let id = SessionId("sess-del".to_owned());
        store.upsert(session("sess-del")).await;
        assert!(store.delete(&id).await);
        assert!(store.get(&id).await.is_none());
        assert!(!store.delete(&id).await);
    }
}
