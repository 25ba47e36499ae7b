//! Client for the managed evaluation service.
//!
//! The service accepts a batch of rows and a list of named evaluators and
//! answers with aggregate `metrics`, per-row results and an optional portal
//! link. Scoring happens entirely on the service side.

use super::result::RawEvaluation;
use crate::config::{Config, ProjectConfig};
use crate::error::{HarnessError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One evaluator to apply, with the mapping from its inputs to data columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSpec {
    /// Result prefix used in the output metrics, e.g. `violence`.
    pub name: String,
    /// Service-side evaluator type, e.g. `ViolenceEvaluator`.
    pub evaluator: String,
    pub column_mapping: BTreeMap<String, String>,
}

impl EvaluatorSpec {
    pub fn new(name: &str, evaluator: &str, columns: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            evaluator: evaluator.to_string(),
            column_mapping: columns
                .iter()
                .map(|(input, column)| (input.to_string(), format!("${{data.{}}}", column)))
                .collect(),
        }
    }

    /// Evaluator reading the whole `conversation` column.
    pub fn conversation(name: &str, evaluator: &str) -> Self {
        Self::new(name, evaluator, &[("conversation", "conversation")])
    }

    /// Evaluator reading separate `query` and `response` columns.
    pub fn query_response(name: &str, evaluator: &str) -> Self {
        Self::new(name, evaluator, &[("query", "query"), ("response", "response")])
    }
}

/// Judge model used by model-graded evaluators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeModel {
    pub azure_endpoint: String,
    pub azure_deployment: String,
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// A batch evaluation request.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRequest {
    pub evaluation_name: String,
    pub evaluators: Vec<EvaluatorSpec>,
    pub data: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_model: Option<JudgeModel>,
}

impl EvaluationRequest {
    pub fn new(
        name: impl Into<String>,
        evaluators: Vec<EvaluatorSpec>,
        data: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            evaluation_name: name.into(),
            evaluators,
            data,
            agent_id: None,
            judge_model: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_judge(mut self, judge: JudgeModel) -> Self {
        self.judge_model = Some(judge);
        self
    }
}

/// Something that can score a batch of rows.
#[allow(async_fn_in_trait)]
pub trait Evaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<RawEvaluation>;
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// HTTP evaluator client.
#[derive(Clone)]
pub struct HttpEvaluator {
    client: Client,
    endpoint: String,
    project: ProjectConfig,
}

impl HttpEvaluator {
    pub fn new(endpoint: impl Into<String>, project: ProjectConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            project,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.evaluation_endpoint()?,
            config.project.clone(),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Evaluator for HttpEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<RawEvaluation> {
        tracing::debug!(
            name = %request.evaluation_name,
            rows = request.data.len(),
            evaluators = request.evaluators.len(),
            "submitting evaluation"
        );

        let mut http = self
            .client
            .post(&self.endpoint)
            .query(&[("api-version", self.project.api_version.as_str())])
            .json(request);
        if !self.project.api_key.is_empty() {
            http = http.bearer_auth(&self.project.api_key);
        }

        let response = http.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                return Err(HarnessError::EvaluatorApi(format!(
                    "API error ({}): {}",
                    status, api_error.error.message
                )));
            }
            return Err(HarnessError::EvaluatorApi(format!(
                "Request failed ({}): {}",
                status, body
            )));
        }

        let value: serde_json::Value = serde_json::from_str(&body)?;
        RawEvaluation::from_value(value)
    }
}

/// Content harm evaluators, keyed by the category they report.
pub fn safety_evaluators() -> Vec<EvaluatorSpec> {
    [
        ("violence", "ViolenceEvaluator"),
        ("sexual", "SexualEvaluator"),
        ("self_harm", "SelfHarmEvaluator"),
        ("hate_unfairness", "HateUnfairnessEvaluator"),
        ("indirect_attack", "IndirectAttackEvaluator"),
        ("protected_material", "ProtectedMaterialEvaluator"),
    ]
    .into_iter()
    .map(|(name, evaluator)| EvaluatorSpec::new(name, evaluator, &[("query", "query")]))
    .collect()
}

/// Model-graded quality evaluators plus the pass-through operational metrics.
pub fn quality_evaluators() -> Vec<EvaluatorSpec> {
    let mut specs = vec![EvaluatorSpec::new(
        "operational_metrics",
        "OperationalMetricsEvaluator",
        &[("metrics", "metrics")],
    )];
    specs.extend(
        [
            ("tool_call_accuracy", "ToolCallAccuracyEvaluator"),
            ("intent_resolution", "IntentResolutionEvaluator"),
            ("task_adherence", "TaskAdherenceEvaluator"),
            ("groundedness", "GroundednessEvaluator"),
            ("relevance", "RelevanceEvaluator"),
            ("coherence", "CoherenceEvaluator"),
            ("fluency", "FluencyEvaluator"),
        ]
        .into_iter()
        .map(|(name, evaluator)| EvaluatorSpec::conversation(name, evaluator)),
    );
    specs.push(EvaluatorSpec::new(
        "similarity",
        "SimilarityEvaluator",
        &[("conversation", "conversation"), ("ground_truth", "ground_truth")],
    ));
    specs
}

/// Judges applied to a static query/response dataset.
pub fn genai_evaluators() -> Vec<EvaluatorSpec> {
    [
        ("relevance", "RelevanceEvaluator"),
        ("coherence", "CoherenceEvaluator"),
        ("fluency", "FluencyEvaluator"),
        ("groundedness", "GroundednessEvaluator"),
    ]
    .into_iter()
    .map(|(name, evaluator)| EvaluatorSpec::query_response(name, evaluator))
    .collect()
}

/// Composite content safety evaluator over red-team conversations.
pub fn content_safety_evaluator() -> EvaluatorSpec {
    EvaluatorSpec::conversation("content_safety", "ContentSafetyEvaluator")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_mapping_syntax() {
        let spec = EvaluatorSpec::query_response("relevance", "RelevanceEvaluator");
        assert_eq!(spec.column_mapping["query"], "${data.query}");
        assert_eq!(spec.column_mapping["response"], "${data.response}");
    }

    #[test]
    fn test_safety_evaluator_names() {
        let names: Vec<String> = safety_evaluators().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "violence",
                "sexual",
                "self_harm",
                "hate_unfairness",
                "indirect_attack",
                "protected_material"
            ]
        );
    }

    #[test]
    fn test_similarity_reads_ground_truth() {
        let similarity = quality_evaluators()
            .into_iter()
            .find(|s| s.name == "similarity")
            .unwrap();
        assert_eq!(similarity.column_mapping["ground_truth"], "${data.ground_truth}");
        assert_eq!(quality_evaluators().len(), 9);
    }

    #[test]
    fn test_request_serialization_skips_absent_fields() {
        let request = EvaluationRequest::new("n", genai_evaluators(), Vec::new());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("agent_id").is_none());
        assert!(json.get("judge_model").is_none());

        let json = serde_json::to_value(request.with_agent("asst_1")).unwrap();
        assert_eq!(json["agent_id"], "asst_1");
    }
}
