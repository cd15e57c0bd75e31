//! HTTP implementations of the assist collaborator traits.
//!
//! The assistant provider exposes a thread/run API: threads are append-only
//! message histories it owns, runs are persona turns polled to completion.
//! Moderation is a single scoring call on the same provider.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use permitdesk_assist::backend::{
    ActionOutcome, AssistantBackend, BackendError, ProposedAction, RunId, RunState, ThreadMetadata,
};
use permitdesk_assist::guardrails::{ModerationClient, ModerationError, ModerationVerdict};
use permitdesk_core::config::AssistantConfig;
use permitdesk_core::{AgentPersona, ThreadId};

#[derive(Clone)]
pub struct HttpAssistantBackend {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpAssistantBackend {
    pub fn new(client: Client, config: &AssistantConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Protocol(format!("{path} returned {status}")));
        }
        response.json::<R>().await.map_err(|err| BackendError::Protocol(err.to_string()))
    }

    async fn get_json<R: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<R, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Protocol(format!("{path} returned {status}")));
        }
        response.json::<R>().await.map_err(|err| BackendError::Protocol(err.to_string()))
    }
}

#[derive(Serialize)]
struct CreateThreadRequest<'a> {
    metadata: &'a ThreadMetadata,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Serialize)]
struct AppendMessageRequest<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct StartRunRequest<'a> {
    persona: &'a str,
    instructions: &'a str,
}

#[derive(Deserialize)]
struct RunStateResponse {
    status: String,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    required_actions: Vec<ProposedAction>,
    #[serde(default)]
    error: Option<String>,
}

impl RunStateResponse {
    fn into_run_state(self) -> Result<RunState, BackendError> {
        match self.status.as_str() {
            "queued" | "in_progress" => Ok(RunState::InProgress),
            "completed" => Ok(RunState::Completed { output: self.output.unwrap_or_default() }),
            "requires_action" => Ok(RunState::RequiresAction { actions: self.required_actions }),
            "failed" | "cancelled" | "expired" => Ok(RunState::Failed {
                message: self.error.unwrap_or_else(|| self.status.clone()),
            }),
            other => Err(BackendError::Protocol(format!("unknown run status `{other}`"))),
        }
    }
}

#[derive(Serialize)]
struct SubmitOutcomesRequest<'a> {
    outcomes: &'a [ActionOutcome],
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    input: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    output: String,
}

#[async_trait]
impl AssistantBackend for HttpAssistantBackend {
    async fn create_thread(&self, metadata: &ThreadMetadata) -> Result<ThreadId, BackendError> {
        let response: IdResponse =
            self.post_json("/v1/threads", &CreateThreadRequest { metadata }).await?;
        Ok(ThreadId(response.id))
    }

    async fn append_message(&self, thread: &ThreadId, text: &str) -> Result<(), BackendError> {
        let path = format!("/v1/threads/{}/messages", thread.0);
        let _: serde_json::Value = self
            .post_json(&path, &AppendMessageRequest { role: "user", content: text })
            .await?;
        Ok(())
    }

    async fn start_run(
        &self,
        thread: &ThreadId,
        persona: AgentPersona,
        instructions: &str,
    ) -> Result<RunId, BackendError> {
        let path = format!("/v1/threads/{}/runs", thread.0);
        let response: IdResponse = self
            .post_json(&path, &StartRunRequest { persona: persona.as_str(), instructions })
            .await?;
        Ok(RunId(response.id))
    }

    async fn run_state(&self, thread: &ThreadId, run: &RunId) -> Result<RunState, BackendError> {
        let path = format!("/v1/threads/{}/runs/{}", thread.0, run.0);
        let response: RunStateResponse = self.get_json(&path).await?;
        response.into_run_state()
    }

    async fn submit_action_outcomes(
        &self,
        thread: &ThreadId,
        run: &RunId,
        outcomes: &[ActionOutcome],
    ) -> Result<(), BackendError> {
        let path = format!("/v1/threads/{}/runs/{}/outcomes", thread.0, run.0);
        let _: serde_json::Value =
            self.post_json(&path, &SubmitOutcomesRequest { outcomes }).await?;
        Ok(())
    }

    async fn classify(
        &self,
        model: &str,
        text: &str,
        context_digest: &str,
    ) -> Result<String, BackendError> {
        let response: ClassifyResponse = self
            .post_json("/v1/classify", &ClassifyRequest { model, input: text, context: context_digest })
            .await?;
        Ok(response.output)
    }
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    flagged: bool,
    #[serde(default)]
    category_scores: BTreeMap<String, f64>,
}

#[derive(Clone)]
pub struct HttpModerationClient {
    backend: HttpAssistantBackend,
}

impl HttpModerationClient {
    pub fn new(client: Client, config: &AssistantConfig) -> Self {
        Self { backend: HttpAssistantBackend::new(client, config) }
    }
}

#[async_trait]
impl ModerationClient for HttpModerationClient {
    async fn moderate(&self, text: &str) -> Result<ModerationVerdict, ModerationError> {
        let response: ModerationResponse = self
            .backend
            .post_json("/v1/moderations", &ModerationRequest { input: text })
            .await
            .map_err(|err| ModerationError::Unavailable(err.to_string()))?;
        Ok(ModerationVerdict {
            flagged: response.flagged,
            category_scores: response.category_scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use permitdesk_assist::backend::{BackendError, RunState};

    use super::RunStateResponse;

    #[test]
    fn provider_statuses_map_onto_run_states() {
        let cases = [
            ("queued", RunState::InProgress),
            ("in_progress", RunState::InProgress),
            ("completed", RunState::Completed { output: String::new() }),
            ("requires_action", RunState::RequiresAction { actions: Vec::new() }),
        ];
        for (status, expected) in cases {
            let response = RunStateResponse {
                status: status.to_owned(),
                output: None,
                required_actions: Vec::new(),
                error: None,
            };
            assert_eq!(response.into_run_state().expect("known status"), expected);
        }
    }

    #[test]
    fn failed_statuses_carry_the_provider_error() {
        let response = RunStateResponse {
            status: "failed".to_owned(),
            output: None,
            required_actions: Vec::new(),
            error: Some("model overloaded".to_owned()),
        };
        assert_eq!(
            response.into_run_state().expect("known status"),
            RunState::Failed { message: "model overloaded".to_owned() }
        );
    }

    #[test]
    fn unknown_status_is_a_protocol_error() {
        let response = RunStateResponse {
            status: "hallucinating".to_owned(),
            output: None,
            required_actions: Vec::new(),
            error: None,
        };
        assert!(matches!(response.into_run_state(), Err(BackendError::Protocol(_))));
    }
}
