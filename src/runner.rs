//! Query runner: sends each test query to the agent in its own thread and
//! records the reply with its operational metrics.

use crate::agent::{AgentApi, PollPolicy, Role, send_and_wait};
use crate::dataset::QueryItem;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const METRIC_SERVER_DURATION: &str = "server-run-duration-in-seconds";
pub const METRIC_CLIENT_DURATION: &str = "client-run-duration-in-seconds";
pub const METRIC_COMPLETION_TOKENS: &str = "completion-tokens";
pub const METRIC_PROMPT_TOKENS: &str = "prompt-tokens";

/// Operational metrics recorded for every query, zeroed on failure.
pub const OPERATIONAL_METRICS: [&str; 4] = [
    METRIC_SERVER_DURATION,
    METRIC_CLIENT_DURATION,
    METRIC_COMPLETION_TOKENS,
    METRIC_PROMPT_TOKENS,
];

/// A single chat message in evaluator conversation format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A conversation as consumed by conversation-mode evaluators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
}

/// The outcome of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub query: String,
    pub response: String,
    pub ground_truth: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    /// Set when the remote call failed; the response is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationRecord {
    fn failed(item: &QueryItem, error: String) -> Self {
        Self {
            query: item.query.clone(),
            response: String::new(),
            ground_truth: item.ground_truth.clone(),
            metrics: OPERATIONAL_METRICS
                .iter()
                .map(|name| (name.to_string(), 0.0))
                .collect(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Row written to the evaluation input file.
    pub fn to_eval_row(&self) -> EvalInputRow {
        let mut messages = vec![ChatMessage::user(&self.query)];
        if !self.response.is_empty() {
            messages.push(ChatMessage::assistant(&self.response));
        }
        EvalInputRow {
            conversation: Conversation { messages },
            metrics: self.metrics.clone(),
            ground_truth: self.ground_truth.clone().unwrap_or_default(),
        }
    }
}

/// One line of the quality evaluation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalInputRow {
    pub conversation: Conversation,
    pub metrics: BTreeMap<String, f64>,
    pub ground_truth: String,
}

/// Runs a batch of queries sequentially against one agent.
pub struct QueryRunner<'a, A> {
    api: &'a A,
    agent_id: String,
    policy: PollPolicy,
    quiet: bool,
}

impl<'a, A: AgentApi> QueryRunner<'a, A> {
    pub fn new(api: &'a A, agent_id: impl Into<String>, policy: PollPolicy) -> Self {
        Self {
            api,
            agent_id: agent_id.into(),
            policy,
            quiet: false,
        }
    }

    /// Suppress per-query progress lines.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Run every query. A failed query is logged and recorded with an empty
    /// response; it never aborts the batch.
    pub async fn run(&self, items: &[QueryItem]) -> Vec<EvaluationRecord> {
        let mut records = Vec::with_capacity(items.len());

        for (idx, item) in items.iter().enumerate() {
            if !self.quiet {
                println!(
                    "   [{}/{}] Testing: {}",
                    idx + 1,
                    items.len(),
                    preview(&item.query, 60)
                );
            }

            let record = match self.run_one(item).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(query = %item.query, error = %e, "query failed");
                    if !self.quiet {
                        println!("   Warning: {}", e);
                    }
                    EvaluationRecord::failed(item, e.to_string())
                }
            };
            records.push(record);
        }

        records
    }

    async fn run_one(&self, item: &QueryItem) -> Result<EvaluationRecord> {
        let thread = self.api.create_thread().await?;
        let exchange =
            send_and_wait(self.api, &thread.id, &self.agent_id, &item.query, self.policy).await?;

        let usage = exchange.run.usage.unwrap_or_default();
        let mut metrics = BTreeMap::new();
        metrics.insert(
            METRIC_SERVER_DURATION.to_string(),
            exchange.run.server_duration_secs().unwrap_or(0.0),
        );
        metrics.insert(
            METRIC_CLIENT_DURATION.to_string(),
            exchange.elapsed.as_secs_f64(),
        );
        metrics.insert(
            METRIC_COMPLETION_TOKENS.to_string(),
            usage.completion_tokens as f64,
        );
        metrics.insert(METRIC_PROMPT_TOKENS.to_string(), usage.prompt_tokens as f64);

        Ok(EvaluationRecord {
            query: item.query.clone(),
            response: exchange.response,
            ground_truth: item.ground_truth.clone(),
            metrics,
            error: None,
        })
    }
}

/// Pass/fail counts of a smoke test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmokeReport {
    pub passed: usize,
    pub failed: usize,
}

impl SmokeReport {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    /// Percentage of queries that got a reply.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total() as f64 * 100.0
    }

    pub fn verdict(&self) -> &'static str {
        if self.failed == 0 {
            "All tests passed! Agent is ready for evaluation."
        } else if self.passed > 0 {
            "Some tests failed. Review errors above."
        } else {
            "All tests failed. Check agent configuration."
        }
    }
}

/// Send `queries` in order on one shared thread. A query passes when the
/// agent produced a non-empty reply.
pub async fn run_smoke_test<A: AgentApi>(
    api: &A,
    agent_id: &str,
    queries: &[&str],
    policy: PollPolicy,
) -> Result<SmokeReport> {
    let thread = api.create_thread().await?;
    println!("Test thread: {}\n", thread.id);

    let mut report = SmokeReport::default();
    for (idx, query) in queries.iter().enumerate() {
        println!("Test {}/{}", idx + 1, queries.len());
        println!("   Query: {}", query);

        match send_and_wait(api, &thread.id, agent_id, query, policy).await {
            Ok(exchange) if !exchange.response.is_empty() => {
                println!("   Response: {}", preview(&exchange.response, 150));
                println!("   Success");
                report.passed += 1;
            }
            Ok(_) => {
                println!("   No response generated");
                report.failed += 1;
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "smoke query failed");
                println!("   Error: {}", e);
                report.failed += 1;
            }
        }
        println!();
    }

    Ok(report)
}

/// Mean of every metric across records. Failed records count as zeros.
pub fn mean_metrics(records: &[EvaluationRecord]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        for (name, value) in &record.metrics {
            *sums.entry(name.clone()).or_insert(0.0) += value;
        }
    }

    let n = records.len() as f64;
    sums.into_iter().map(|(name, sum)| (name, sum / n)).collect()
}

/// First `max` characters of `text`, with an ellipsis when truncated.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedAgent;
    use std::time::Duration;

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_each_query_gets_its_own_thread() {
        let agent = ScriptedAgent::new();
        let items = vec![QueryItem::new("one"), QueryItem::new("two")];

        let records = QueryRunner::new(&agent, "asst_1", fast_policy())
            .quiet()
            .run(&items)
            .await;

        assert_eq!(agent.thread_count(), 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].response, "Reply to: two");
        assert_eq!(records[0].metrics[METRIC_PROMPT_TOKENS], 10.0);
        assert_eq!(records[0].metrics[METRIC_SERVER_DURATION], 2.0);
    }

    #[tokio::test]
    async fn test_remote_failure_becomes_empty_row() {
        let agent = ScriptedAgent::new().failing_on("explode");
        let items = vec![QueryItem::new("please explode")];

        let records = QueryRunner::new(&agent, "asst_1", fast_policy())
            .quiet()
            .run(&items)
            .await;

        assert_eq!(records.len(), 1);
        assert!(records[0].response.is_empty());
        assert!(!records[0].is_success());
        assert!(records[0].metrics.values().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let agent = ScriptedAgent::new().failing_on("bad");
        let items = vec![
            QueryItem::new("good 1"),
            QueryItem::new("bad"),
            QueryItem::new("good 2"),
        ];

        let records = QueryRunner::new(&agent, "asst_1", fast_policy())
            .quiet()
            .run(&items)
            .await;

        let successes: Vec<bool> = records.iter().map(|r| r.is_success()).collect();
        assert_eq!(successes, vec![true, false, true]);
    }

    #[test]
    fn test_mean_metrics_counts_failures_as_zero() {
        let item = QueryItem::new("q");
        let failed = EvaluationRecord::failed(&item, "boom".to_string());
        let mut ok = failed.clone();
        ok.error = None;
        ok.metrics.insert(METRIC_PROMPT_TOKENS.to_string(), 100.0);

        let means = mean_metrics(&[ok, failed]);
        assert_eq!(means[METRIC_PROMPT_TOKENS], 50.0);
        assert!(mean_metrics(&[]).is_empty());
    }

    #[test]
    fn test_eval_row_conversation_format() {
        let record = EvaluationRecord {
            query: "Hi".to_string(),
            response: "Hello!".to_string(),
            ground_truth: None,
            metrics: BTreeMap::new(),
            error: None,
        };
        let row = serde_json::to_value(record.to_eval_row()).unwrap();
        assert_eq!(row["conversation"]["messages"][0]["role"], "user");
        assert_eq!(row["conversation"]["messages"][1]["content"], "Hello!");
        assert_eq!(row["ground_truth"], "");
    }

    #[tokio::test]
    async fn test_smoke_test_shares_one_thread() {
        let agent = ScriptedAgent::new().failing_on("boom");
        let report = run_smoke_test(
            &agent,
            "asst_1",
            &["hello", "boom", "again"],
            fast_policy(),
        )
        .await
        .unwrap();

        assert_eq!(agent.thread_count(), 1);
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.verdict(), "Some tests failed. Review errors above.");
    }

    #[tokio::test]
    async fn test_smoke_test_fails_silent_turn_on_shared_thread() {
        let agent = ScriptedAgent::new().silent_on("quiet");
        let report = run_smoke_test(&agent, "asst_1", &["hello", "be quiet"], fast_policy())
            .await
            .unwrap();

        assert_eq!(agent.thread_count(), 1);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_smoke_report_rates() {
        let report = SmokeReport {
            passed: 9,
            failed: 1,
        };
        assert_eq!(format!("{:.1}", report.success_rate()), "90.0");
        assert_eq!(SmokeReport::default().success_rate(), 0.0);
        assert!(
            SmokeReport {
                passed: 0,
                failed: 3
            }
            .verdict()
            .starts_with("All tests failed")
        );
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 60), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
