//! Agent Eval Harness - provision a hosted conversational agent and evaluate it.
//!
//! The harness talks to two remote services: an agent project (agents,
//! threads, messages, runs) and an evaluation service that scores batches of
//! rows. Scoring itself happens remotely; this crate runs the queries,
//! extracts and classifies the returned metrics and writes reports.
//!
//! # Quick Start
//!
//! ```no_run
//! use agent_eval_harness::{
//!     agent::{AgentClient, PollPolicy},
//!     config::Config,
//!     dataset::QueryDataset,
//!     runner::QueryRunner,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.require_agent_run()?;
//!
//!     let client = AgentClient::new(config.project.clone());
//!     let dataset = QueryDataset::load(Path::new("data/agent-eval-data.json"))?;
//!     let agent_id = config.agent.baseline_id.clone().unwrap_or_default();
//!
//!     let records = QueryRunner::new(&client, agent_id, PollPolicy::from(&config.polling))
//!         .run(&dataset.data)
//!         .await;
//!
//!     for record in records {
//!         println!("{} -> {}", record.query, record.response);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **AgentClient**: REST client for the agent project
//! - **QueryRunner**: one isolated thread per query, with operational metrics
//! - **HttpEvaluator**: submits rows to the evaluation service
//! - **EvaluationResult**: typed safety, quality and red-team results
//! - **ThresholdPolicy**: per-kind classification of defect rates

pub mod agent;
pub mod config;
pub mod dataset;
pub mod env_file;
pub mod error;
pub mod evaluation;
pub mod persistence;
pub mod runner;
pub mod telemetry;

pub use agent::{AgentApi, AgentClient};
pub use config::Config;
pub use error::{HarnessError, Result};
pub use evaluation::{EvaluationKind, EvaluationResult, HttpEvaluator, ReportSummary};
pub use runner::{EvaluationRecord, QueryRunner};
