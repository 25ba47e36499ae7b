//! Hosted agent integration.
//!
//! Provides the REST client for the agent service, the run lifecycle used
//! to wait for replies, and the built-in customer service agent definitions.

mod client;
pub mod definitions;
mod run_state;

pub use client::{
    Agent, AgentClient, CreateAgentRequest, MessageContent, Role, Run, RunError, RunUsage,
    TextContent, Thread, ThreadMessage,
};
pub use definitions::{AgentDefinition, AgentVariant};
pub use run_state::{PollPolicy, RunState, wait_for_run};

use crate::error::{HarnessError, Result};
use run_state::{before_deadline, wait_until};
use std::time::Duration;
use tokio::time::Instant;

/// Thread and run operations used to converse with an agent.
#[allow(async_fn_in_trait)]
pub trait AgentApi {
    /// Open a new, empty conversation thread.
    async fn create_thread(&self) -> Result<Thread>;

    /// Post a user message to a thread.
    async fn post_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage>;

    /// Start the agent on a thread.
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run>;

    /// Fetch the current state of a run.
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Messages of a thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}

/// One user turn and the agent's reply.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Latest assistant text; empty when the agent produced none.
    pub response: String,
    /// The terminal run.
    pub run: Run,
    /// Wall-clock time from posting the message to the terminal run.
    pub elapsed: Duration,
}

/// Post `content` to `thread_id`, run the agent and wait for its reply.
///
/// A run that ends in a failed state is returned as [`HarnessError::RunFailed`].
/// The whole exchange is bounded by the policy timeout.
pub async fn send_and_wait<A: AgentApi>(
    api: &A,
    thread_id: &str,
    agent_id: &str,
    content: &str,
    policy: PollPolicy,
) -> Result<Exchange> {
    let started = Instant::now();
    let deadline = started + policy.timeout;

    before_deadline(deadline, "post message", api.post_message(thread_id, content)).await?;
    let run = before_deadline(deadline, "create run", api.create_run(thread_id, agent_id)).await?;
    let run = wait_until(api, thread_id, run, policy.interval, deadline).await?;

    if RunState::from_status(&run.status) == RunState::Failed {
        return Err(HarnessError::RunFailed {
            reason: run.failure_reason(),
            run_id: run.id,
        });
    }

    let elapsed = started.elapsed();
    let response = before_deadline(deadline, "list messages", latest_reply(api, thread_id))
        .await?
        .unwrap_or_default();

    Ok(Exchange {
        response,
        run,
        elapsed,
    })
}

/// Text of the newest non-empty assistant message posted after the last
/// user message. Replies to earlier turns on the same thread are not
/// considered.
pub async fn latest_reply<A: AgentApi>(api: &A, thread_id: &str) -> Result<Option<String>> {
    let messages = api.list_messages(thread_id).await?;
    Ok(messages
        .iter()
        .take_while(|m| m.role != Role::User)
        .filter(|m| m.role == Role::Assistant)
        .map(ThreadMessage::text)
        .find(|text| !text.is_empty()))
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedAgent;
    use super::*;

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_send_and_wait_returns_reply() {
        let agent = ScriptedAgent::new();
        let thread = agent.create_thread().await.unwrap();

        let exchange = send_and_wait(&agent, &thread.id, "asst_1", "Hi", fast_policy())
            .await
            .unwrap();
        assert_eq!(exchange.response, "Reply to: Hi");
        assert_eq!(exchange.run.usage.unwrap().completion_tokens, 5);
    }

    #[tokio::test]
    async fn test_send_and_wait_reports_failed_run() {
        let agent = ScriptedAgent::new()
            .with_initial_status("queued")
            .with_statuses(&["failed"]);
        let thread = agent.create_thread().await.unwrap();

        let result = send_and_wait(&agent, &thread.id, "asst_1", "Hi", fast_policy()).await;
        match result {
            Err(HarnessError::RunFailed { reason, .. }) => {
                assert_eq!(reason, "server_error: model unavailable")
            }
            other => panic!("expected RunFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_latest_reply_picks_newest_assistant_message() {
        let agent = ScriptedAgent::new();
        let thread = agent.create_thread().await.unwrap();
        send_and_wait(&agent, &thread.id, "a", "first", fast_policy())
            .await
            .unwrap();
        send_and_wait(&agent, &thread.id, "a", "second", fast_policy())
            .await
            .unwrap();

        let reply = latest_reply(&agent, &thread.id).await.unwrap();
        assert_eq!(reply.as_deref(), Some("Reply to: second"));
    }

    #[tokio::test]
    async fn test_silent_turn_on_shared_thread_gets_no_earlier_reply() {
        let agent = ScriptedAgent::new().silent_on("quiet");
        let thread = agent.create_thread().await.unwrap();
        send_and_wait(&agent, &thread.id, "a", "hello", fast_policy())
            .await
            .unwrap();

        let exchange = send_and_wait(&agent, &thread.id, "a", "be quiet", fast_policy())
            .await
            .unwrap();
        assert_eq!(exchange.response, "");
        assert_eq!(latest_reply(&agent, &thread.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hung_post_is_bounded_by_timeout() {
        let agent = ScriptedAgent::new().hanging_on_post();
        let thread = agent.create_thread().await.unwrap();
        let policy = PollPolicy {
            interval: Duration::ZERO,
            timeout: Duration::from_millis(50),
        };

        let result = send_and_wait(&agent, &thread.id, "a", "Hi", policy).await;
        assert!(matches!(
            result,
            Err(HarnessError::RequestTimeout {
                operation: "post message"
            })
        ));
    }

    #[tokio::test]
    async fn test_silent_agent_yields_empty_response() {
        let agent = ScriptedAgent::new().silent_on("quiet");
        let thread = agent.create_thread().await.unwrap();
        let exchange = send_and_wait(&agent, &thread.id, "a", "be quiet", fast_policy())
            .await
            .unwrap();
        assert!(exchange.response.is_empty());
    }
}
