//! Baseline snapshot of a previous quality evaluation.

use super::extract::{MetricMap, numeric};
use crate::error::{HarnessError, Result};
use crate::persistence::{RESULTS_DIR, load_json, save_json};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const DEFAULT_COMMIT_SHA: &str = "manual-initialization";

/// Where a full evaluation run leaves its results.
pub fn default_results_path() -> PathBuf {
    Path::new(RESULTS_DIR)
        .join("agent_eval_output")
        .join("evaluation_results.json")
}

pub fn default_baseline_dir() -> PathBuf {
    Path::new(RESULTS_DIR).join("baseline")
}

/// Contents of `baseline_metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineMetrics {
    pub relevance: f64,
    pub coherence: f64,
    pub fluency: f64,
    pub groundedness: f64,
    pub tool_call_accuracy: f64,
    pub intent_resolution: f64,
    pub task_adherence: f64,
    pub similarity: f64,
    pub client_run_duration: f64,
    pub completion_tokens: f64,
    pub prompt_tokens: f64,
    pub updated_at: String,
    pub commit_sha: String,
}

impl BaselineMetrics {
    /// Pick the tracked metrics out of `metrics`; missing ones become zero.
    pub fn from_metrics(
        metrics: &MetricMap,
        updated_at: DateTime<Utc>,
        commit_sha: &str,
    ) -> Result<Self> {
        let get = |key: &str| numeric(metrics, key).map(|v| v.unwrap_or(0.0));

        Ok(Self {
            relevance: get("relevance")?,
            coherence: get("coherence")?,
            fluency: get("fluency")?,
            groundedness: get("groundedness")?,
            tool_call_accuracy: get("tool_call_accuracy")?,
            intent_resolution: get("intent_resolution")?,
            task_adherence: get("task_adherence")?,
            similarity: get("similarity")?,
            client_run_duration: get("client-run-duration-in-seconds")?,
            completion_tokens: get("completion-tokens")?,
            prompt_tokens: get("prompt-tokens")?,
            updated_at: updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            commit_sha: commit_sha.to_string(),
        })
    }

    /// Display label and value, in table order.
    pub fn rows(&self) -> [(&'static str, f64); 11] {
        [
            ("Relevance", self.relevance),
            ("Coherence", self.coherence),
            ("Fluency", self.fluency),
            ("Groundedness", self.groundedness),
            ("Tool Call Accuracy", self.tool_call_accuracy),
            ("Intent Resolution", self.intent_resolution),
            ("Task Adherence", self.task_adherence),
            ("Similarity", self.similarity),
            ("Avg Response Time (s)", self.client_run_duration),
            ("Completion Tokens", self.completion_tokens),
            ("Prompt Tokens", self.prompt_tokens),
        ]
    }

    /// Markdown table of the tracked metrics.
    pub fn format_table(&self) -> String {
        let mut lines = vec![
            "| Metric                    | Value        |".to_string(),
            "|---------------------------|--------------|".to_string(),
        ];
        for (label, value) in self.rows() {
            lines.push(format!("| {:<25} | {:>12} |", label, format_value(value)));
        }
        lines.join("\n")
    }
}

/// Small values keep three decimals; counts are shown whole.
fn format_value(value: f64) -> String {
    if value < 100.0 {
        format!("{:.3}", value)
    } else {
        format!("{:.0}", value)
    }
}

/// Files written by [`initialize_baseline`].
#[derive(Debug, Clone)]
pub struct BaselineOutput {
    pub metrics: BaselineMetrics,
    pub metrics_path: PathBuf,
    pub full_results_path: PathBuf,
}

/// Snapshot `results_path` into `baseline_dir`.
///
/// Fails when the results file is absent or carries no metrics.
pub fn initialize_baseline(
    results_path: &Path,
    baseline_dir: &Path,
    commit_sha: &str,
    now: DateTime<Utc>,
) -> Result<BaselineOutput> {
    if !results_path.exists() {
        return Err(HarnessError::DataNotFound(results_path.to_path_buf()));
    }

    let results: Value = load_json(results_path)?;
    let metrics = match results.get("metrics") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => {
            return Err(HarnessError::invalid_data(
                results_path,
                "no metrics found in evaluation results",
            ));
        }
    };

    let baseline = BaselineMetrics::from_metrics(metrics, now, commit_sha)?;

    let metrics_path = baseline_dir.join("baseline_metrics.json");
    let full_results_path = baseline_dir.join("baseline_full_results.json");
    save_json(&baseline, &metrics_path)?;
    save_json(&results, &full_results_path)?;

    tracing::info!(path = %metrics_path.display(), "baseline written");

    Ok(BaselineOutput {
        metrics: baseline,
        metrics_path,
        full_results_path,
    })
}
