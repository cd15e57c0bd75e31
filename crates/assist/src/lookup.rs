use async_trait::async_trait;
use thiserror::Error;

use permitdesk_core::{KnowledgeEntry, RecordSummary};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("record lookup failed: {0}")]
    Directory(String),
    #[error("knowledge base search failed: {0}")]
    Knowledge(String),
}

/// Read-only window into the record modules. The CRUD side owns the data;
/// this core only ever asks "is there a record with this ticket".
#[async_trait]
pub trait RecordDirectory: Send + Sync {
    async fn permit_by_ticket(&self, ticket: &str) -> Result<Option<RecordSummary>, LookupError>;

    async fn complaint_by_ticket(&self, ticket: &str)
        -> Result<Option<RecordSummary>, LookupError>;
}

/// Small FAQ knowledge base searched by the fast path.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<KnowledgeEntry>, LookupError>;
}

/// Stands in until the record modules are wired up.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRecordDirectory;

#[async_trait]
impl RecordDirectory for NoopRecordDirectory {
    async fn permit_by_ticket(&self, _ticket: &str) -> Result<Option<RecordSummary>, LookupError> {
        Ok(None)
    }

    async fn complaint_by_ticket(
        &self,
        _ticket: &str,
    ) -> Result<Option<RecordSummary>, LookupError> {
        Ok(None)
    }
}

/// Keyword-overlap knowledge base. Relevance is the fraction of query terms
/// found in the entry, so scores stay in [0, 1].
#[derive(Clone, Debug, Default)]
pub struct InMemoryKnowledgeBase {
    entries: Vec<(String, String)>,
}

impl InMemoryKnowledgeBase {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn search(&self, query: &str) -> Result<Vec<KnowledgeEntry>, LookupError> {
        let terms = query
            .to_ascii_lowercase()
            .split_whitespace()
            .filter(|term| term.len() > 2)
            .map(str::to_owned)
            .collect::<Vec<_>>();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = self
            .entries
            .iter()
            .filter_map(|(title, body)| {
                let haystack = format!("{} {}", title, body).to_ascii_lowercase();
                let hits = terms.iter().filter(|term| haystack.contains(term.as_str())).count();
                if hits == 0 {
                    return None;
                }
                Some(KnowledgeEntry {
                    title: title.clone(),
                    body: body.clone(),
                    relevance: hits as f64 / terms.len() as f64,
                })
            })
            .collect::<Vec<_>>();

        results.sort_by(|a, b| {
            b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryKnowledgeBase, KnowledgeBase};

    #[tokio::test]
    async fn keyword_search_scores_by_term_overlap() {
        let kb = InMemoryKnowledgeBase::new(vec![
            (
                "How do I renew a permit?".to_owned(),
                "Open the permit detail page and choose Renew.".to_owned(),
            ),
            ("Vehicle imports".to_owned(), "Import vehicles from a CSV file.".to_owned()),
        ]);

        let results = kb.search("how to renew my permit").await.expect("search succeeds");
        assert!(!results.is_empty());
        assert!(results[0].title.contains("renew"));
        assert!(results[0].relevance > 0.0 && results[0].relevance <= 1.0);
    }

    #[tokio::test]
    async fn short_or_stopword_queries_return_nothing() {
        let kb = InMemoryKnowledgeBase::new(vec![(
            "Permits".to_owned(),
            "General permit help.".to_owned(),
        )]);
        let results = kb.search("a an to").await.expect("search succeeds");
        assert!(results.is_empty());
    }
}
