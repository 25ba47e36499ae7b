//! Error types for the evaluation harness.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while provisioning, running or evaluating an agent.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// One or more required configuration values are not set.
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    /// A configuration value is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input data file does not exist.
    #[error("Data file not found at '{0}'")]
    DataNotFound(PathBuf),

    /// The input data file could not be parsed.
    #[error("Invalid data file '{path}': {message}")]
    InvalidData { path: PathBuf, message: String },

    /// Agent service returned an error.
    #[error("Agent API error: {0}")]
    AgentApi(String),

    /// An agent run ended in a failed state.
    #[error("Agent run {run_id} failed: {reason}")]
    RunFailed { run_id: String, reason: String },

    /// An agent run did not reach a terminal state in time.
    #[error("Agent run {run_id} did not finish within {waited_secs}s")]
    RunTimeout { run_id: String, waited_secs: u64 },

    /// A call to the agent service did not return before the poll deadline.
    #[error("Agent API call '{operation}' did not return in time")]
    RequestTimeout { operation: &'static str },

    /// No agent matched the configured name.
    #[error("Agent '{0}' not found")]
    AgentNotFound(String),

    /// Evaluation service returned an error.
    #[error("Evaluator API error: {0}")]
    EvaluatorApi(String),

    /// Evaluator output did not have the expected structure.
    #[error("Unexpected evaluator output: {0}")]
    EvaluatorShape(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl HarnessError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a data error with path context.
    pub fn invalid_data(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidData {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for HarnessError {
    fn from(err: reqwest::Error) -> Self {
        HarnessError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_lists_every_name() {
        let err = HarnessError::MissingConfig(vec![
            "AZURE_AI_PROJECT_ENDPOINT".to_string(),
            "AGENT_ID_BASELINE".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: AZURE_AI_PROJECT_ENDPOINT, AGENT_ID_BASELINE"
        );
    }
}
