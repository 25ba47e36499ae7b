//! Run lifecycle and bounded polling.

use super::AgentApi;
use super::client::Run;
use crate::config::PollingConfig;
use crate::error::{HarnessError, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Coarse lifecycle of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunState {
    /// Map a service status string onto the lifecycle.
    ///
    /// Unrecognised statuses are treated as failures so that a protocol
    /// change surfaces immediately instead of polling until timeout.
    pub fn from_status(status: &str) -> Self {
        match status {
            "queued" => RunState::Queued,
            "in_progress" | "requires_action" | "cancelling" => RunState::Running,
            "completed" => RunState::Completed,
            _ => RunState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// How often and how long to poll a run.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }
}

/// Poll `run` until it reaches a terminal state.
///
/// Returns the terminal run, whether completed or failed. Exceeding the
/// policy timeout yields [`HarnessError::RunTimeout`], including a status
/// call that never returns.
pub async fn wait_for_run<A: AgentApi>(
    api: &A,
    thread_id: &str,
    run: Run,
    policy: PollPolicy,
) -> Result<Run> {
    let deadline = Instant::now() + policy.timeout;
    wait_until(api, thread_id, run, policy.interval, deadline).await
}

pub(crate) async fn wait_until<A: AgentApi>(
    api: &A,
    thread_id: &str,
    mut run: Run,
    interval: Duration,
    deadline: Instant,
) -> Result<Run> {
    let started = Instant::now();
    let mut state = RunState::from_status(&run.status);

    while !state.is_terminal() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(HarnessError::RunTimeout {
                run_id: run.id,
                waited_secs: started.elapsed().as_secs(),
            });
        }

        tokio::time::sleep(interval.min(remaining)).await;
        run = match tokio::time::timeout_at(deadline, api.get_run(thread_id, &run.id)).await {
            Ok(polled) => polled?,
            Err(_) => {
                return Err(HarnessError::RunTimeout {
                    run_id: run.id,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
        };

        let next = RunState::from_status(&run.status);
        if next != state {
            tracing::debug!(run_id = %run.id, from = ?state, to = ?next, "run state changed");
        }
        state = next;
    }

    Ok(run)
}

/// Await an agent service call, giving up at `deadline`.
pub(crate) async fn before_deadline<T>(
    deadline: Instant,
    operation: &'static str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout_at(deadline, call)
        .await
        .map_err(|_| HarnessError::RequestTimeout { operation })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedAgent;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RunState::from_status("queued"), RunState::Queued);
        assert_eq!(RunState::from_status("in_progress"), RunState::Running);
        assert_eq!(RunState::from_status("requires_action"), RunState::Running);
        assert_eq!(RunState::from_status("completed"), RunState::Completed);
        assert_eq!(RunState::from_status("failed"), RunState::Failed);
        assert_eq!(RunState::from_status("expired"), RunState::Failed);
        assert_eq!(RunState::from_status("cancelled"), RunState::Failed);
        assert_eq!(RunState::from_status("something_new"), RunState::Failed);
        assert!(!RunState::Queued.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }

    #[tokio::test]
    async fn test_wait_follows_status_sequence() {
        let agent = ScriptedAgent::new().with_statuses(&["in_progress", "completed"]);
        let initial = agent.run_with_status("queued");
        let policy = PollPolicy {
            interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
        };

        let run = wait_for_run(&agent, "thread_1", initial, policy).await.unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(agent.poll_count(), 2);
    }

    #[tokio::test]
    async fn test_wait_returns_failed_run() {
        let agent = ScriptedAgent::new().with_statuses(&["failed"]);
        let initial = agent.run_with_status("in_progress");
        let policy = PollPolicy {
            interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
        };

        let run = wait_for_run(&agent, "thread_1", initial, policy).await.unwrap();
        assert_eq!(RunState::from_status(&run.status), RunState::Failed);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let agent = ScriptedAgent::new().with_statuses(&["in_progress"]);
        let initial = agent.run_with_status("queued");
        let policy = PollPolicy {
            interval: Duration::ZERO,
            timeout: Duration::ZERO,
        };

        let result = wait_for_run(&agent, "thread_1", initial, policy).await;
        assert!(matches!(result, Err(HarnessError::RunTimeout { .. })));
        assert_eq!(agent.poll_count(), 0);
    }

    #[tokio::test]
    async fn test_hung_status_call_times_out() {
        let agent = ScriptedAgent::new().hanging_on_poll();
        let initial = agent.run_with_status("queued");
        let policy = PollPolicy {
            interval: Duration::ZERO,
            timeout: Duration::from_millis(50),
        };

        let result = wait_for_run(&agent, "thread_1", initial, policy).await;
        assert!(matches!(result, Err(HarnessError::RunTimeout { .. })));
        assert_eq!(agent.poll_count(), 1);
    }

    #[tokio::test]
    async fn test_long_interval_does_not_outlast_timeout() {
        let agent = ScriptedAgent::new().with_statuses(&["in_progress"; 8]);
        let initial = agent.run_with_status("queued");
        let policy = PollPolicy {
            interval: Duration::from_secs(30),
            timeout: Duration::from_millis(50),
        };

        let started = std::time::Instant::now();
        let result = wait_for_run(&agent, "thread_1", initial, policy).await;
        assert!(matches!(result, Err(HarnessError::RunTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_already_terminal_run_needs_no_poll() {
        let agent = ScriptedAgent::new();
        let initial = agent.run_with_status("completed");
        let run = tokio_test::block_on(wait_for_run(
            &agent,
            "thread_1",
            initial,
            PollPolicy::default(),
        ))
        .unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(agent.poll_count(), 0);
    }
}
