use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use permitdesk_assist::lookup::{InMemoryKnowledgeBase, NoopRecordDirectory};
use permitdesk_assist::orchestrator::ConversationOrchestrator;
use permitdesk_assist::session::SessionStore;
use permitdesk_core::config::{AppConfig, ConfigError, LoadOptions};

use crate::http_backend::{HttpAssistantBackend, HttpModerationClient};

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<ConversationOrchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.assistant.request_timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let backend = Arc::new(HttpAssistantBackend::new(client.clone(), &config.assistant));
    let moderation = Arc::new(HttpModerationClient::new(client, &config.assistant));
    let sessions = SessionStore::new(&config.sessions);

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        &config,
        backend,
        moderation,
        Arc::new(NoopRecordDirectory),
        Arc::new(seed_knowledge_base()),
        sessions,
    ));
    orchestrator.spawn_maintenance();

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        assistant_base_url = %config.assistant.base_url,
        guardrails_enabled = config.guardrails.enabled,
        human_in_the_loop = config.approvals.human_in_the_loop,
        "application collaborators wired"
    );

    Ok(Application { config, orchestrator })
}

/// Built-in FAQ entries served by the fast path. A future record-module
/// integration can replace this with operator-managed content.
fn seed_knowledge_base() -> InMemoryKnowledgeBase {
    InMemoryKnowledgeBase::new(vec![
        (
            "How do I renew a permit?".to_owned(),
            "Open the permit detail page and choose Renew. Renewals submitted before the \
             expiry date keep the original ticket number."
                .to_owned(),
        ),
        (
            "How do I file a complaint?".to_owned(),
            "Use the Complaints page and choose New Complaint. You will receive a ticket \
             number for tracking its progress."
                .to_owned(),
        ),
        (
            "What do the permit statuses mean?".to_owned(),
            "Submitted means received, under_review means an inspector is assigned, \
             approved and rejected are final decisions."
                .to_owned(),
        ),
        (
            "How do I export my records?".to_owned(),
            "Record exports are a sensitive operation and require explicit confirmation \
             before they run."
                .to_owned(),
        ),
    ])
}
