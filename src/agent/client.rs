//! HTTP client for the hosted agent service.
//!
//! Speaks the assistants-style REST surface of the agent project: agents,
//! threads, messages and runs, each call carrying the `api-version` query
//! parameter and an optional bearer token.

use super::AgentApi;
use crate::config::ProjectConfig;
use crate::error::{HarnessError, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Message role in a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A hosted agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// A conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// One content part of a message. Only text parts are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
}

/// A message posted to a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect()
    }
}

/// Error detail attached to a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Token counters reported for a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// An execution of an agent over a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub usage: Option<RunUsage>,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl Run {
    /// Server-side duration, when both timestamps are known.
    pub fn server_duration_secs(&self) -> Option<f64> {
        match (self.created_at, self.completed_at) {
            (Some(start), Some(end)) if end >= start => Some((end - start) as f64),
            _ => None,
        }
    }

    /// Human-readable failure reason.
    pub fn failure_reason(&self) -> String {
        match &self.last_error {
            Some(err) => match &err.code {
                Some(code) => format!("{}: {}", code, err.message),
                None => err.message.clone(),
            },
            None => format!("run ended with status '{}'", self.status),
        }
    }
}

/// Request body for agent creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateAgentRequest {
    pub model: String,
    pub name: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
    pub temperature: f32,
    pub top_p: f32,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// Service error envelope.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Agent service client.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    config: ProjectConfig,
}

impl AgentClient {
    /// Create a new client for the given project.
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Project endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let mut request = request.query(&[("api-version", self.config.api_version.as_str())]);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                return Err(HarnessError::AgentApi(format!(
                    "API error ({}): {}",
                    status, api_error.error.message
                )));
            }
            return Err(HarnessError::AgentApi(format!(
                "Request failed ({}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            HarnessError::AgentApi(format!("Malformed response: {}. Body: {}", e, body))
        })
    }

    /// Create an agent.
    pub async fn create_agent(&self, request: &CreateAgentRequest) -> Result<Agent> {
        tracing::debug!(name = %request.name, model = %request.model, "creating agent");
        self.send(self.client.post(self.url("assistants")).json(request))
            .await
    }

    /// Fetch one agent by id.
    pub async fn get_agent(&self, agent_id: &str) -> Result<Agent> {
        self.send(self.client.get(self.url(&format!("assistants/{}", agent_id))))
            .await
    }

    /// List agents in the project.
    pub async fn list_agents(&self) -> Result<Vec<Agent>> {
        let list: ListResponse<Agent> = self.send(self.client.get(self.url("assistants"))).await?;
        Ok(list.data)
    }

    /// Resolve an agent id by exact name.
    pub async fn find_agent_by_name(&self, name: &str) -> Result<Agent> {
        self.list_agents()
            .await?
            .into_iter()
            .find(|agent| agent.name.as_deref() == Some(name))
            .ok_or_else(|| HarnessError::AgentNotFound(name.to_string()))
    }
}

impl AgentApi for AgentClient {
    async fn create_thread(&self) -> Result<Thread> {
        self.send(
            self.client
                .post(self.url("threads"))
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn post_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        let request = CreateMessageRequest {
            role: Role::User,
            content,
        };
        self.send(
            self.client
                .post(self.url(&format!("threads/{}/messages", thread_id)))
                .json(&request),
        )
        .await
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run> {
        let request = CreateRunRequest {
            assistant_id: agent_id,
        };
        self.send(
            self.client
                .post(self.url(&format!("threads/{}/runs", thread_id)))
                .json(&request),
        )
        .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.send(
            self.client
                .get(self.url(&format!("threads/{}/runs/{}", thread_id, run_id))),
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let list: ListResponse<ThreadMessage> = self
            .send(
                self.client
                    .get(self.url(&format!("threads/{}/messages", thread_id)))
                    .query(&[("order", "desc")]),
            )
            .await?;
        Ok(list.data)
    }
}
