//! Evaluation pipeline: submit rows to the evaluation service, extract and
//! classify the returned metrics, and write summaries.

pub mod baseline;
pub mod classify;
pub mod client;
pub mod extract;
pub mod redteam;
pub mod report;
pub mod result;

pub use classify::{
    MetricSummary, OverallStatus, ReportSummary, Status, ThresholdPolicy, summarize,
};
pub use client::{EvaluationRequest, Evaluator, EvaluatorSpec, HttpEvaluator, JudgeModel};
pub use result::{
    EvaluationKind, EvaluationResult, QualityResult, RawEvaluation, RedTeamResult, SafetyResult,
    SavedEvaluation,
};
