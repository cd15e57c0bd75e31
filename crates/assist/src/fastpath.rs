use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::warn;

use permitdesk_core::{KnowledgeEntry, RecordSummary, Widget};

use crate::lookup::{KnowledgeBase, RecordDirectory};

/// Structured identifiers look like `PRM-2026-0042`: three uppercase
/// letters, four digits, four digits.
fn ticket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[A-Z]{3}-\d{4}-\d{4}\b").expect("ticket pattern compiles")
    })
}

const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.35;
const MAX_KNOWLEDGE_RESULTS: usize = 5;

/// A deterministic answer produced without touching the language-model
/// backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub text: String,
    pub widget: Widget,
}

/// Deterministic, zero-model-call shortcuts, tried in order until one
/// matches. Finding nothing is not an error; the pipeline simply continues
/// to classification.
pub struct FastPathResolver {
    directory: Arc<dyn RecordDirectory>,
    knowledge: Arc<dyn KnowledgeBase>,
    relevance_threshold: f64,
}

impl FastPathResolver {
    pub fn new(directory: Arc<dyn RecordDirectory>, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self { directory, knowledge, relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD }
    }

    pub fn with_relevance_threshold(mut self, threshold: f64) -> Self {
        self.relevance_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub async fn try_resolve(&self, text: &str) -> Option<Resolution> {
        if let Some(resolution) = self.try_ticket(text).await {
            return Some(resolution);
        }
        self.try_knowledge(text).await
    }

    /// Ticket recognizer: on a ticket-shaped string, try the record
    /// collections in fixed order (permits, then complaints) and take the
    /// first hit. Lookup failures degrade to a miss.
    async fn try_ticket(&self, text: &str) -> Option<Resolution> {
        let ticket = ticket_pattern().find(text)?.as_str().to_owned();

        let record = match self.lookup_any(&ticket).await {
            Ok(record) => record?,
            Err(error) => {
                warn!(
                    event_name = "chat.fastpath.lookup_degraded",
                    ticket = %ticket,
                    error = %error,
                    "record lookup failed, falling through to classification"
                );
                return None;
            }
        };

        let text = format!(
            "{} `{}` is currently **{}**: {}. Last updated {}.",
            match record.kind {
                permitdesk_core::RecordKind::Permit => "Permit",
                permitdesk_core::RecordKind::Complaint => "Complaint",
            },
            record.ticket,
            record.status,
            record.title,
            record.updated_at.format("%Y-%m-%d"),
        );

        Some(Resolution {
            text,
            widget: Widget::PermitStatus { ticket, record },
        })
    }

    async fn lookup_any(
        &self,
        ticket: &str,
    ) -> Result<Option<RecordSummary>, crate::lookup::LookupError> {
        if let Some(record) = self.directory.permit_by_ticket(ticket).await? {
            return Ok(Some(record));
        }
        self.directory.complaint_by_ticket(ticket).await
    }

    /// Knowledge-lookup recognizer: FAQ entries at or above the relevance
    /// threshold become a list widget.
    async fn try_knowledge(&self, text: &str) -> Option<Resolution> {
        let entries = match self.knowledge.search(text).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(
                    event_name = "chat.fastpath.knowledge_degraded",
                    error = %error,
                    "knowledge search failed, falling through to classification"
                );
                return None;
            }
        };

        let relevant = entries
            .into_iter()
            .filter(|entry| entry.relevance >= self.relevance_threshold)
            .take(MAX_KNOWLEDGE_RESULTS)
            .collect::<Vec<KnowledgeEntry>>();

        if relevant.is_empty() {
            return None;
        }

        Some(Resolution {
            text: format!(
                "I found {} article{} that may answer your question:",
                relevant.len(),
                if relevant.len() == 1 { "" } else { "s" },
            ),
            widget: Widget::List { title: "Related help articles".to_owned(), items: relevant },
        })
    }
}
