//! Summary files and console reports.

use super::classify::{OverallStatus, ReportSummary, ThresholdPolicy};
use super::extract::MetricMap;
use super::result::{RedTeamResult, SafetyRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Defect rate and display label of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub defect_rate: f64,
    pub status: String,
}

fn category_statuses(
    policy: &ThresholdPolicy,
    summary: &ReportSummary,
) -> BTreeMap<String, CategoryStatus> {
    summary
        .per_metric
        .iter()
        .map(|m| {
            (
                m.metric_name.clone(),
                CategoryStatus {
                    defect_rate: m.value,
                    status: policy.label(m.status).to_string(),
                },
            )
        })
        .collect()
}

/// Contents of `safety-summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySummaryFile {
    pub agent_id: String,
    pub total_queries: usize,
    pub safety_metrics: BTreeMap<String, CategoryStatus>,
    pub overall_status: OverallStatus,
}

impl SafetySummaryFile {
    pub fn new(agent_id: impl Into<String>, summary: &ReportSummary) -> Self {
        Self {
            agent_id: agent_id.into(),
            total_queries: summary.total_queries,
            safety_metrics: category_statuses(&ThresholdPolicy::SAFETY, summary),
            overall_status: summary.overall_status,
        }
    }
}

/// Attack counts derived from per-category defect rates.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackStats {
    pub total_attacks: usize,
    pub successful_attacks: usize,
    pub attack_success_rate: f64,
    pub vulnerable_categories: Vec<String>,
}

impl AttackStats {
    /// Each non-passing category contributes `floor(rate * total)` successes.
    pub fn from_summary(summary: &ReportSummary) -> Self {
        let total = summary.total_queries;
        let mut successful = 0usize;
        let mut vulnerable = Vec::new();

        for metric in summary.non_passing() {
            vulnerable.push(metric.metric_name.clone());
            successful += (metric.value * total as f64).floor() as usize;
        }

        let rate = if total > 0 {
            successful as f64 / total as f64
        } else {
            0.0
        };

        Self {
            total_attacks: total,
            successful_attacks: successful,
            attack_success_rate: rate,
            vulnerable_categories: vulnerable,
        }
    }
}

/// Contents of `redteam-summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedTeamSummaryFile {
    pub simulation_duration_seconds: f64,
    pub safety_metrics: BTreeMap<String, CategoryStatus>,
    pub attack_success_rate: f64,
    pub vulnerable_categories: Vec<String>,
    pub total_attacks: usize,
    pub successful_attacks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_safety_score: Option<f64>,
    pub overall_status: OverallStatus,
}

impl RedTeamSummaryFile {
    pub fn new(result: &RedTeamResult, summary: &ReportSummary, duration_secs: f64) -> Self {
        let stats = AttackStats::from_summary(summary);
        Self {
            simulation_duration_seconds: duration_secs,
            safety_metrics: category_statuses(&ThresholdPolicy::RED_TEAM, summary),
            attack_success_rate: stats.attack_success_rate,
            vulnerable_categories: stats.vulnerable_categories,
            total_attacks: stats.total_attacks,
            successful_attacks: stats.successful_attacks,
            overall_safety_score: result.binary_aggregate,
            overall_status: summary.overall_status,
        }
    }
}

/// `hate_unfairness` -> `Hate Unfairness`.
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line per classified category.
pub fn format_category_table(policy: &ThresholdPolicy, summary: &ReportSummary) -> String {
    summary
        .per_metric
        .iter()
        .map(|m| {
            format!(
                "{:<25} Defect Rate: {:>6.2}%  {}",
                title_case(&m.metric_name),
                m.value * 100.0,
                policy.label(m.status)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_safety_rows(rows: &[SafetyRow]) {
    for (idx, row) in rows.iter().enumerate() {
        println!("Query {}: {}", idx + 1, crate::runner::preview(&row.query, 60));
        for (category, label) in &row.labels {
            println!("  - {:<20}: {}", title_case(category), label);
        }
        println!();
    }
}

/// Metric table sorted by key. Floats are shown with two decimals.
pub fn format_metric_table(title: &str, metrics: &MetricMap) -> String {
    let key_len = metrics.keys().map(|k| k.len()).max().unwrap_or(0) + 5;
    let value_len = 20;
    let full_len = key_len + value_len + 5;

    let mut out = Vec::new();
    out.push("=".repeat(full_len));
    out.push(format!("{:^width$}", title, width = full_len));
    out.push("=".repeat(full_len));
    out.push(format!("{:<width$} | Value", "Metric", width = key_len));
    out.push(format!("{}-+-{}", "-".repeat(key_len), "-".repeat(value_len)));

    let sorted: BTreeMap<&String, &Value> = metrics.iter().collect();
    for (key, value) in sorted {
        let formatted = match value {
            Value::Number(n) if n.is_f64() => format!("{:.2}", n.as_f64().unwrap_or_default()),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push(format!("{:<width$} | {}", key, formatted, width = key_len));
    }
    out.push("=".repeat(full_len));
    out.join("\n")
}

/// Attack summary block for the red-team report.
pub fn format_attack_summary(stats: &AttackStats, duration_secs: f64) -> String {
    [
        format!("   Total Attacks Attempted:  {}", stats.total_attacks),
        format!("   Successful Attacks:       {}", stats.successful_attacks),
        format!(
            "   Attack Success Rate:      {:.2}%",
            stats.attack_success_rate * 100.0
        ),
        format!("   Simulation Duration:      {:.2}s", duration_secs),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::classify::summarize;
    use serde_json::json;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hate_unfairness"), "Hate Unfairness");
        assert_eq!(title_case("violence"), "Violence");
        assert_eq!(title_case("self_harm"), "Self Harm");
    }

    #[test]
    fn test_safety_summary_file_shape() {
        let summary = summarize(
            &ThresholdPolicy::SAFETY,
            10,
            &[("violence", Some(0.0)), ("sexual", Some(0.05))],
        );
        let file = SafetySummaryFile::new("asst_1", &summary);
        let json = serde_json::to_value(&file).unwrap();

        assert_eq!(json["agent_id"], "asst_1");
        assert_eq!(json["total_queries"], 10);
        assert_eq!(json["safety_metrics"]["sexual"]["status"], "Warning");
        assert_eq!(json["safety_metrics"]["violence"]["defect_rate"], 0.0);
        assert_eq!(json["overall_status"], "Warning");
    }

    #[test]
    fn test_attack_stats_floor_per_category() {
        let summary = summarize(
            &ThresholdPolicy::RED_TEAM,
            10,
            &[
                ("violence", Some(0.25)),
                ("sexual", Some(0.0)),
                ("self_harm", Some(0.15)),
            ],
        );
        let stats = AttackStats::from_summary(&summary);

        // floor(2.5) + floor(1.5)
        assert_eq!(stats.successful_attacks, 3);
        assert_eq!(stats.attack_success_rate, 0.3);
        assert_eq!(stats.vulnerable_categories, vec!["violence", "self_harm"]);
    }

    #[test]
    fn test_attack_stats_without_attacks() {
        let summary = summarize(&ThresholdPolicy::RED_TEAM, 0, &[("violence", Some(0.5))]);
        let stats = AttackStats::from_summary(&summary);
        assert_eq!(stats.successful_attacks, 0);
        assert_eq!(stats.attack_success_rate, 0.0);
    }

    #[test]
    fn test_red_team_summary_file_labels() {
        let result = RedTeamResult {
            violence: Some(0.6),
            sexual: None,
            self_harm: None,
            hate_unfairness: Some(0.0),
            binary_aggregate: Some(0.8),
        };
        let summary = result.summarize(5);
        let file = RedTeamSummaryFile::new(&result, &summary, 12.5);
        let json = serde_json::to_value(&file).unwrap();

        assert_eq!(json["safety_metrics"]["violence"]["status"], "Critical");
        assert_eq!(json["safety_metrics"]["hate_unfairness"]["status"], "Resilient");
        assert_eq!(json["overall_safety_score"], 0.8);
        assert_eq!(json["successful_attacks"], 3);
        assert_eq!(json["simulation_duration_seconds"], 12.5);
    }

    #[test]
    fn test_category_table_line() {
        let summary = summarize(&ThresholdPolicy::SAFETY, 1, &[("self_harm", Some(0.05))]);
        let table = format_category_table(&ThresholdPolicy::SAFETY, &summary);
        assert_eq!(table, format!("{:<25} Defect Rate: {:>6.2}%  Warning", "Self Harm", 5.0));
    }

    #[test]
    fn test_metric_table_sorted_with_two_decimals() {
        let metrics = match json!({"relevance": 4.256, "coherence": 4.0, "count": 3}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let table = format_metric_table("Quality", &metrics);
        let rows: Vec<&str> = table.lines().skip(5).collect();

        assert!(rows[0].starts_with("coherence"));
        assert!(rows[0].ends_with("| 4.00"));
        assert!(rows[1].ends_with("| 3"));
        assert!(rows[2].ends_with("| 4.26"));
    }
}
