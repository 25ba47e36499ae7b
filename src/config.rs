//! Configuration for the evaluation harness.
//!
//! Supports environment variables (optionally loaded from a `.env` file) and
//! a YAML config file. Environment variables take precedence over config file
//! values. The resulting [`Config`] is built once at startup and passed by
//! reference to every component.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PROJECT_ENDPOINT: &str = "AZURE_AI_PROJECT_ENDPOINT";
pub const ENV_PROJECT_API_KEY: &str = "AZURE_AI_API_KEY";
pub const ENV_PROJECT_API_VERSION: &str = "AZURE_AI_API_VERSION";
pub const ENV_DEPLOYMENT_NAME: &str = "AZURE_DEPLOYMENT_NAME";
pub const ENV_AGENT_ID_BASELINE: &str = "AGENT_ID_BASELINE";
pub const ENV_AGENT_ID_V2: &str = "AGENT_ID_V2";
pub const ENV_AGENT_NAME: &str = "AZURE_AI_AGENT_NAME";
pub const ENV_EVALUATION_ENDPOINT: &str = "EVALUATION_ENDPOINT";
pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_OPENAI_DEPLOYMENT: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_RED_TEAM_MAX_TURNS: &str = "RED_TEAM_MAX_TURNS";
pub const ENV_RED_TEAM_MAX_SCENARIOS: &str = "RED_TEAM_MAX_SCENARIOS";
pub const ENV_RED_TEAM_OBJECTIVES: &str = "RED_TEAM_OBJECTIVES_PER_CATEGORY";
pub const ENV_POLL_INTERVAL: &str = "RUN_POLL_INTERVAL_SECS";
pub const ENV_RUN_TIMEOUT: &str = "RUN_TIMEOUT_SECS";

/// Deployment used when provisioning an agent without `AZURE_DEPLOYMENT_NAME`.
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// Agent project connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project endpoint (e.g. "https://x.services.ai.azure.com/api/projects/y")
    pub endpoint: String,

    /// Bearer token sent with every request (optional)
    #[serde(default)]
    pub api_key: String,

    /// `api-version` query parameter
    #[serde(default = "default_project_api_version")]
    pub api_version: String,
}

fn default_project_api_version() -> String {
    "2025-05-15-preview".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: default_project_api_version(),
        }
    }
}

/// Which agent to provision or evaluate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model deployment backing the agent
    pub deployment: Option<String>,
    /// Baseline agent identifier
    pub baseline_id: Option<String>,
    /// Variant agent identifier
    pub v2_id: Option<String>,
    /// Agent name, used to look up the id when none is configured
    pub name: Option<String>,
}

impl AgentConfig {
    /// Deployment to use when creating agents.
    pub fn deployment_or_default(&self) -> &str {
        self.deployment.as_deref().unwrap_or(DEFAULT_DEPLOYMENT)
    }
}

/// Evaluation service and judge model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Evaluator service URL; derived from the project endpoint when unset
    pub endpoint: Option<String>,
    pub openai_endpoint: Option<String>,
    pub openai_deployment: Option<String>,
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_api_version")]
    pub openai_api_version: String,
}

fn default_openai_api_version() -> String {
    "2024-08-01-preview".to_string()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            openai_endpoint: None,
            openai_deployment: None,
            openai_api_key: None,
            openai_api_version: default_openai_api_version(),
        }
    }
}

/// Limits for the adversarial scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedTeamConfig {
    pub max_turns: u32,
    pub max_scenarios: usize,
    pub objectives_per_category: usize,
}

impl Default for RedTeamConfig {
    fn default() -> Self {
        Self {
            max_turns: 1,
            max_scenarios: 5,
            objectives_per_category: 3,
        }
    }
}

/// Bounds on waiting for an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            timeout_secs: 300,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub red_team: RedTeamConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Config {
    /// Load configuration from `.env`, the optional config file and the
    /// process environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (including those loaded from `.env`)
    /// 2. Config file (~/.config/agent-eval-harness/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            _ => Config::default(),
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Build a configuration from defaults plus an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Load configuration from a specific YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| HarnessError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "agent-eval-harness")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_PROJECT_ENDPOINT) {
            self.project.endpoint = v;
        }
        if let Some(v) = get(ENV_PROJECT_API_KEY) {
            self.project.api_key = v;
        }
        if let Some(v) = get(ENV_PROJECT_API_VERSION) {
            self.project.api_version = v;
        }

        if let Some(v) = get(ENV_DEPLOYMENT_NAME) {
            self.agent.deployment = Some(v);
        }
        if let Some(v) = get(ENV_AGENT_ID_BASELINE) {
            self.agent.baseline_id = Some(v);
        }
        if let Some(v) = get(ENV_AGENT_ID_V2) {
            self.agent.v2_id = Some(v);
        }
        if let Some(v) = get(ENV_AGENT_NAME) {
            self.agent.name = Some(v);
        }

        if let Some(v) = get(ENV_EVALUATION_ENDPOINT) {
            self.evaluation.endpoint = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_ENDPOINT) {
            self.evaluation.openai_endpoint = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_DEPLOYMENT) {
            self.evaluation.openai_deployment = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_API_KEY) {
            self.evaluation.openai_api_key = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_API_VERSION) {
            self.evaluation.openai_api_version = v;
        }

        if let Some(v) = get(ENV_RED_TEAM_MAX_TURNS) {
            self.red_team.max_turns = parse_number(ENV_RED_TEAM_MAX_TURNS, &v)?;
        }
        if let Some(v) = get(ENV_RED_TEAM_MAX_SCENARIOS) {
            self.red_team.max_scenarios = parse_number(ENV_RED_TEAM_MAX_SCENARIOS, &v)?;
        }
        if let Some(v) = get(ENV_RED_TEAM_OBJECTIVES) {
            self.red_team.objectives_per_category = parse_number(ENV_RED_TEAM_OBJECTIVES, &v)?;
        }

        if let Some(v) = get(ENV_POLL_INTERVAL) {
            self.polling.interval_secs = parse_number(ENV_POLL_INTERVAL, &v)?;
        }
        if let Some(v) = get(ENV_RUN_TIMEOUT) {
            self.polling.timeout_secs = parse_number(ENV_RUN_TIMEOUT, &v)?;
        }

        Ok(())
    }

    /// Requirements for talking to the agent project at all.
    pub fn require_project(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.project.endpoint.is_empty() {
            missing.push(ENV_PROJECT_ENDPOINT);
        }
        missing_to_result(missing)
    }

    /// Requirements for talking to an existing baseline agent.
    pub fn require_agent(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.project.endpoint.is_empty() {
            missing.push(ENV_PROJECT_ENDPOINT);
        }
        if self.agent.baseline_id.is_none() {
            missing.push(ENV_AGENT_ID_BASELINE);
        }
        missing_to_result(missing)
    }

    /// Requirements for running queries against the baseline agent.
    pub fn require_agent_run(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.project.endpoint.is_empty() {
            missing.push(ENV_PROJECT_ENDPOINT);
        }
        if self.agent.deployment.is_none() {
            missing.push(ENV_DEPLOYMENT_NAME);
        }
        if self.agent.baseline_id.is_none() {
            missing.push(ENV_AGENT_ID_BASELINE);
        }
        missing_to_result(missing)
    }

    /// Requirements for the quality evaluation, which accepts an agent name
    /// in place of an id.
    pub fn require_quality(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.project.endpoint.is_empty() {
            missing.push(ENV_PROJECT_ENDPOINT);
        }
        if self.agent.deployment.is_none() {
            missing.push(ENV_DEPLOYMENT_NAME);
        }
        if self.agent.baseline_id.is_none() && self.agent.name.is_none() {
            missing.push(ENV_AGENT_ID_BASELINE);
        }
        missing_to_result(missing)
    }

    /// Requirements for judge-model-only evaluation of a static dataset.
    pub fn require_genai(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.evaluation.openai_endpoint.is_none() {
            missing.push(ENV_OPENAI_ENDPOINT);
        }
        if self.evaluation.openai_deployment.is_none() {
            missing.push(ENV_OPENAI_DEPLOYMENT);
        }
        if self.evaluation.openai_api_key.is_none() {
            missing.push(ENV_OPENAI_API_KEY);
        }
        missing_to_result(missing)
    }

    /// Evaluator service URL.
    pub fn evaluation_endpoint(&self) -> Result<String> {
        if let Some(endpoint) = &self.evaluation.endpoint {
            return Ok(endpoint.clone());
        }
        if self.project.endpoint.is_empty() {
            return Err(HarnessError::MissingConfig(vec![
                ENV_EVALUATION_ENDPOINT.to_string(),
            ]));
        }
        Ok(format!(
            "{}/evaluations",
            self.project.endpoint.trim_end_matches('/')
        ))
    }

    /// Scheme and host of the project endpoint, used as the judge model
    /// endpoint for agent quality evaluation.
    pub fn model_endpoint(&self) -> Result<String> {
        let endpoint = self.project.endpoint.as_str();
        let (scheme, rest) = endpoint.split_once("://").ok_or_else(|| {
            HarnessError::InvalidConfig(format!(
                "{} is not a URL: {}",
                ENV_PROJECT_ENDPOINT, endpoint
            ))
        })?;
        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(HarnessError::InvalidConfig(format!(
                "{} has no host: {}",
                ENV_PROJECT_ENDPOINT, endpoint
            )));
        }
        Ok(format!("{}://{}", scheme, host))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        HarnessError::InvalidConfig(format!(
            "{} must be a non-negative integer, got '{}'",
            key, value
        ))
    })
}

fn missing_to_result(missing: Vec<&str>) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::MissingConfig(
            missing.into_iter().map(String::from).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.project.endpoint.is_empty());
        assert_eq!(config.project.api_version, "2025-05-15-preview");
        assert_eq!(config.red_team.max_turns, 1);
        assert_eq!(config.red_team.max_scenarios, 5);
        assert_eq!(config.red_team.objectives_per_category, 3);
        assert_eq!(config.polling.timeout_secs, 300);
        assert_eq!(config.agent.deployment_or_default(), "gpt-4o");
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        match config.require_agent_run() {
            Err(HarnessError::MissingConfig(names)) => assert_eq!(
                names,
                vec![ENV_PROJECT_ENDPOINT, ENV_DEPLOYMENT_NAME, ENV_AGENT_ID_BASELINE]
            ),
            other => panic!("expected MissingConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_PROJECT_ENDPOINT, "https://example.com/api/projects/p"),
            (ENV_DEPLOYMENT_NAME, "gpt-4o"),
            (ENV_AGENT_ID_BASELINE, "  "),
        ]))
        .unwrap();
        assert!(matches!(
            config.require_agent_run(),
            Err(HarnessError::MissingConfig(names)) if names == vec![ENV_AGENT_ID_BASELINE]
        ));
    }

    #[test]
    fn test_quality_accepts_agent_name() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_PROJECT_ENDPOINT, "https://example.com/api/projects/p"),
            (ENV_DEPLOYMENT_NAME, "gpt-4o"),
            (ENV_AGENT_NAME, "customer-service-agent"),
        ]))
        .unwrap();
        assert!(config.require_quality().is_ok());
        assert!(config.require_agent_run().is_err());
        assert!(matches!(
            config.require_agent(),
            Err(HarnessError::MissingConfig(names)) if names == vec![ENV_AGENT_ID_BASELINE]
        ));
    }

    #[test]
    fn test_numeric_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_RED_TEAM_MAX_TURNS, "3"),
            (ENV_RED_TEAM_MAX_SCENARIOS, "9"),
            (ENV_RUN_TIMEOUT, "60"),
        ]))
        .unwrap();
        assert_eq!(config.red_team.max_turns, 3);
        assert_eq!(config.red_team.max_scenarios, 9);
        assert_eq!(config.polling.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_unparseable_number_is_config_error() {
        let result = Config::from_lookup(lookup_from(&[(ENV_RED_TEAM_MAX_TURNS, "many")]));
        assert!(matches!(result, Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn test_evaluation_endpoint_derived_from_project() {
        let config = Config::from_lookup(lookup_from(&[(
            ENV_PROJECT_ENDPOINT,
            "https://example.com/api/projects/p/",
        )]))
        .unwrap();
        assert_eq!(
            config.evaluation_endpoint().unwrap(),
            "https://example.com/api/projects/p/evaluations"
        );
        assert_eq!(config.model_endpoint().unwrap(), "https://example.com");
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "project:\n  endpoint: https://yaml.example.com\nred_team:\n  max_turns: 2\n  max_scenarios: 4\n  objectives_per_category: 1\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.project.endpoint, "https://yaml.example.com");
        assert_eq!(config.project.api_version, "2025-05-15-preview");
        assert_eq!(config.red_team.max_turns, 2);
        assert_eq!(config.polling.interval_secs, 1);
    }
}
