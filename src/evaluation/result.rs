//! Typed evaluator results.
//!
//! Raw service output is checked for shape once, then parsed into one
//! variant per evaluation kind with named fields.

use super::classify::{ReportSummary, ThresholdPolicy, summarize};
use super::extract::{
    self, BINARY_AGGREGATE_KEY, MetricMap, red_team_defect_rate_key, safety_defect_rate_key,
};
use crate::error::{HarnessError, Result};
use crate::persistence::{load_json, save_json};
use crate::runner::OPERATIONAL_METRICS;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Categories reported by the safety scan, in report order.
pub const SAFETY_CATEGORIES: [&str; 6] = [
    "violence",
    "sexual",
    "self_harm",
    "hate_unfairness",
    "indirect_attack",
    "protected_material",
];

/// Categories attacked by the red-team scan, in report order.
pub const RED_TEAM_CATEGORIES: [&str; 4] = ["violence", "sexual", "self_harm", "hate_unfairness"];

/// Quality metrics carried into the typed result.
pub const QUALITY_METRICS: [&str; 8] = [
    "relevance",
    "coherence",
    "fluency",
    "groundedness",
    "tool_call_accuracy",
    "intent_resolution",
    "task_adherence",
    "similarity",
];

/// Evaluator output after the shape check.
#[derive(Debug, Clone)]
pub struct RawEvaluation {
    pub metrics: MetricMap,
    pub rows: Vec<Value>,
    pub studio_url: Option<String>,
    raw: Value,
}

impl RawEvaluation {
    /// Accept an evaluator response. `metrics` must be an object; `rows`,
    /// when present, must be an array.
    pub fn from_value(raw: Value) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            HarnessError::EvaluatorShape("top-level value is not an object".to_string())
        })?;

        let metrics = match object.get("metrics") {
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(HarnessError::EvaluatorShape(format!(
                    "'metrics' should be an object, found {}",
                    other
                )));
            }
            None => {
                return Err(HarnessError::EvaluatorShape(
                    "missing 'metrics' object".to_string(),
                ));
            }
        };

        let rows = match object.get("rows") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(rows)) => rows.clone(),
            Some(other) => {
                return Err(HarnessError::EvaluatorShape(format!(
                    "'rows' should be an array, found {}",
                    other
                )));
            }
        };

        let studio_url = object
            .get("studio_url")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(Self {
            metrics,
            rows,
            studio_url,
            raw,
        })
    }

    /// The response exactly as received, for archiving.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Which kind of evaluation produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EvaluationKind {
    Safety,
    Quality,
    #[value(name = "redteam")]
    RedTeam,
}

impl EvaluationKind {
    /// Classification policy, if this kind is classified.
    pub fn policy(self) -> Option<&'static ThresholdPolicy> {
        match self {
            EvaluationKind::Safety => Some(&ThresholdPolicy::SAFETY),
            EvaluationKind::RedTeam => Some(&ThresholdPolicy::RED_TEAM),
            EvaluationKind::Quality => None,
        }
    }
}

/// Safety labels for one evaluated query.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyRow {
    pub query: String,
    pub labels: Vec<(&'static str, String)>,
}

/// Safety scan result.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyResult {
    pub violence: Option<f64>,
    pub sexual: Option<f64>,
    pub self_harm: Option<f64>,
    pub hate_unfairness: Option<f64>,
    pub indirect_attack: Option<f64>,
    pub protected_material: Option<f64>,
    pub rows: Vec<SafetyRow>,
}

impl SafetyResult {
    pub fn parse(raw: &RawEvaluation) -> Result<Self> {
        let rate = |category: &str| {
            extract::defect_rate(&raw.metrics, &safety_defect_rate_key(category))
        };

        let rows = raw
            .rows
            .iter()
            .map(|row| SafetyRow {
                query: extract::row_query(row).unwrap_or("N/A").to_string(),
                labels: SAFETY_CATEGORIES
                    .iter()
                    .filter_map(|&c| extract::row_label(row, c).map(|label| (c, label)))
                    .collect(),
            })
            .collect();

        Ok(Self {
            violence: rate("violence")?,
            sexual: rate("sexual")?,
            self_harm: rate("self_harm")?,
            hate_unfairness: rate("hate_unfairness")?,
            indirect_attack: rate("indirect_attack")?,
            protected_material: rate("protected_material")?,
            rows,
        })
    }

    /// Rates in report order.
    pub fn defect_rates(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("violence", self.violence),
            ("sexual", self.sexual),
            ("self_harm", self.self_harm),
            ("hate_unfairness", self.hate_unfairness),
            ("indirect_attack", self.indirect_attack),
            ("protected_material", self.protected_material),
        ]
    }

    pub fn summarize(&self, total_queries: usize) -> ReportSummary {
        summarize(&ThresholdPolicy::SAFETY, total_queries, &self.defect_rates())
    }
}

/// Content safety over red-team conversations.
#[derive(Debug, Clone, PartialEq)]
pub struct RedTeamResult {
    pub violence: Option<f64>,
    pub sexual: Option<f64>,
    pub self_harm: Option<f64>,
    pub hate_unfairness: Option<f64>,
    /// Fraction of conversations judged safe across all categories.
    pub binary_aggregate: Option<f64>,
}

impl RedTeamResult {
    pub fn parse(raw: &RawEvaluation) -> Result<Self> {
        let rates = extract::defect_rates(
            &raw.metrics,
            &RED_TEAM_CATEGORIES,
            red_team_defect_rate_key,
        )?;
        let get = |name: &str| rates.iter().find(|(c, _)| *c == name).and_then(|(_, r)| *r);

        Ok(Self {
            violence: get("violence"),
            sexual: get("sexual"),
            self_harm: get("self_harm"),
            hate_unfairness: get("hate_unfairness"),
            binary_aggregate: extract::numeric(&raw.metrics, BINARY_AGGREGATE_KEY)?,
        })
    }

    pub fn defect_rates(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("violence", self.violence),
            ("sexual", self.sexual),
            ("self_harm", self.self_harm),
            ("hate_unfairness", self.hate_unfairness),
        ]
    }

    pub fn summarize(&self, total_attacks: usize) -> ReportSummary {
        summarize(&ThresholdPolicy::RED_TEAM, total_attacks, &self.defect_rates())
    }
}

/// Quality evaluation result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualityResult {
    pub relevance: Option<f64>,
    pub coherence: Option<f64>,
    pub fluency: Option<f64>,
    pub groundedness: Option<f64>,
    pub tool_call_accuracy: Option<f64>,
    pub intent_resolution: Option<f64>,
    pub task_adherence: Option<f64>,
    pub similarity: Option<f64>,
    /// Mean operational metrics passed through the evaluator.
    pub operational: BTreeMap<String, f64>,
}

impl QualityResult {
    pub fn parse(raw: &RawEvaluation) -> Result<Self> {
        let score = |name: &str| {
            extract::first_numeric(
                &raw.metrics,
                &[
                    format!("{}.{}", name, name),
                    name.to_string(),
                    format!("{}.gpt_{}", name, name),
                ],
            )
        };

        let mut operational = BTreeMap::new();
        for name in OPERATIONAL_METRICS {
            let keys = [format!("operational_metrics.{}", name), name.to_string()];
            if let Some(value) = extract::first_numeric(&raw.metrics, &keys)? {
                operational.insert(name.to_string(), value);
            }
        }

        Ok(Self {
            relevance: score("relevance")?,
            coherence: score("coherence")?,
            fluency: score("fluency")?,
            groundedness: score("groundedness")?,
            tool_call_accuracy: score("tool_call_accuracy")?,
            intent_resolution: score("intent_resolution")?,
            task_adherence: score("task_adherence")?,
            similarity: score("similarity")?,
            operational,
        })
    }

    /// Model-graded scores in report order.
    pub fn scores(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("relevance", self.relevance),
            ("coherence", self.coherence),
            ("fluency", self.fluency),
            ("groundedness", self.groundedness),
            ("tool_call_accuracy", self.tool_call_accuracy),
            ("intent_resolution", self.intent_resolution),
            ("task_adherence", self.task_adherence),
            ("similarity", self.similarity),
        ]
    }
}

/// A parsed evaluation, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
    Safety(SafetyResult),
    Quality(QualityResult),
    RedTeam(RedTeamResult),
}

impl EvaluationResult {
    pub fn parse(kind: EvaluationKind, raw: &RawEvaluation) -> Result<Self> {
        Ok(match kind {
            EvaluationKind::Safety => EvaluationResult::Safety(SafetyResult::parse(raw)?),
            EvaluationKind::Quality => EvaluationResult::Quality(QualityResult::parse(raw)?),
            EvaluationKind::RedTeam => EvaluationResult::RedTeam(RedTeamResult::parse(raw)?),
        })
    }

    pub fn kind(&self) -> EvaluationKind {
        match self {
            EvaluationResult::Safety(_) => EvaluationKind::Safety,
            EvaluationResult::Quality(_) => EvaluationKind::Quality,
            EvaluationResult::RedTeam(_) => EvaluationKind::RedTeam,
        }
    }

    /// Classified summary; quality results are not classified.
    pub fn summarize(&self, total: usize) -> Option<ReportSummary> {
        match self {
            EvaluationResult::Safety(r) => Some(r.summarize(total)),
            EvaluationResult::RedTeam(r) => Some(r.summarize(total)),
            EvaluationResult::Quality(_) => None,
        }
    }
}

/// Write the evaluator output to `path`, then parse it.
///
/// The file is written before parsing so a response with an unexpected
/// shape is still kept on disk.
pub fn archive_then_parse<T>(
    raw: &RawEvaluation,
    path: &Path,
    parse: impl FnOnce(&RawEvaluation) -> Result<T>,
) -> Result<T> {
    save_json(raw.raw(), path)?;
    parse(raw)
}

/// A previously saved evaluator output, parsed and classified again.
#[derive(Debug, Clone)]
pub struct SavedEvaluation {
    pub raw: RawEvaluation,
    pub result: EvaluationResult,
    /// `None` for quality results, which are not classified.
    pub summary: Option<ReportSummary>,
}

impl SavedEvaluation {
    /// Load `path` as output of `kind`. `total` defaults to the number of
    /// rows in the file.
    pub fn load(kind: EvaluationKind, path: &Path, total: Option<usize>) -> Result<Self> {
        let value: Value = load_json(path)?;
        let raw = RawEvaluation::from_value(value)?;
        let result = EvaluationResult::parse(kind, &raw)?;
        let summary = result.summarize(total.unwrap_or(raw.rows.len()));
        Ok(Self {
            raw,
            result,
            summary,
        })
    }
}
