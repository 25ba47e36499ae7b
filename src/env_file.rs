//! Recording provisioned agents: `.env` upserts and the agent info file.

use crate::agent::Agent;
use crate::error::{HarnessError, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_AGENT_INFO_FILE: &str = "agent-info.txt";

/// Set `key` to `value` in `env_text`.
///
/// An existing `key=` line is replaced in place; otherwise the entry is
/// appended under a `# comment` header.
pub fn upsert_env_line(env_text: &str, key: &str, value: &str, comment: &str) -> String {
    let prefix = format!("{}=", key);
    let mut replaced = false;

    let mut lines: Vec<String> = env_text
        .lines()
        .map(|line| {
            if !replaced && line.starts_with(&prefix) {
                replaced = true;
                format!("{}{}", prefix, value)
            } else {
                line.to_string()
            }
        })
        .collect();

    if !replaced {
        lines.push(String::new());
        lines.push(format!("# {}", comment));
        lines.push(format!("{}{}", prefix, value));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Apply [`upsert_env_line`] to the file at `path`, creating it if needed.
pub fn upsert_env_file(path: &Path, key: &str, value: &str, comment: &str) -> Result<()> {
    let existing = if path.exists() {
        fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?
    } else {
        String::new()
    };

    let updated = upsert_env_line(&existing, key, value, comment);
    fs::write(path, updated).map_err(|e| HarnessError::io(path, e))?;
    tracing::debug!(path = %path.display(), key, "updated env file");
    Ok(())
}

#[derive(Debug, Serialize)]
struct AgentInfo<'a> {
    id: &'a str,
    name: Option<&'a str>,
    model: &'a str,
    created_at: String,
    endpoint: &'a str,
    tools_count: usize,
    metadata: &'a BTreeMap<String, String>,
}

/// Human-readable record of a created agent.
pub fn format_agent_info(agent: &Agent, endpoint: &str, now: DateTime<Local>) -> Result<String> {
    let info = AgentInfo {
        id: &agent.id,
        name: agent.name.as_deref(),
        model: &agent.model,
        created_at: now.to_rfc3339(),
        endpoint,
        tools_count: agent.tools.len(),
        metadata: &agent.metadata,
    };
    let body = serde_json::to_string_pretty(&info)?;
    let rule = "=".repeat(70);

    Ok(format!(
        "{rule}\nCustomer Service Agent Information\n{rule}\n\n{body}\n\n{rule}\nCreated: {}\n{rule}\n",
        now.format("%Y-%m-%d %H:%M:%S")
    ))
}

pub fn write_agent_info(path: &Path, agent: &Agent, endpoint: &str) -> Result<()> {
    let text = format_agent_info(agent, endpoint, Local::now())?;
    fs::write(path, text).map_err(|e| HarnessError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_replaces_existing_line() {
        let env = "AZURE_AI_PROJECT_ENDPOINT=https://x\nAGENT_ID_BASELINE=asst_old\nOTHER=1\n";
        let updated = upsert_env_line(env, "AGENT_ID_BASELINE", "asst_new", "ignored");
        assert_eq!(
            updated,
            "AZURE_AI_PROJECT_ENDPOINT=https://x\nAGENT_ID_BASELINE=asst_new\nOTHER=1\n"
        );
    }

    #[test]
    fn test_appends_with_comment_header() {
        let updated =
            upsert_env_line("A=1\n", "AGENT_ID_V2", "asst_2", "Customer Service Agent V2");
        assert_eq!(updated, "A=1\n\n# Customer Service Agent V2\nAGENT_ID_V2=asst_2\n");
    }

    #[test]
    fn test_prefix_must_match_whole_key() {
        let updated = upsert_env_line("AGENT_ID_BASELINE_OLD=x\n", "AGENT_ID_BASELINE", "y", "c");
        assert!(updated.contains("AGENT_ID_BASELINE_OLD=x"));
        assert!(updated.ends_with("AGENT_ID_BASELINE=y\n"));
    }

    #[test]
    fn test_upsert_file_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        upsert_env_file(&path, "AGENT_ID_BASELINE", "asst_1", "Customer Service Agent").unwrap();
        upsert_env_file(&path, "AGENT_ID_BASELINE", "asst_2", "Customer Service Agent").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("AGENT_ID_BASELINE=").count(), 1);
        assert!(text.contains("AGENT_ID_BASELINE=asst_2"));
    }

    #[test]
    fn test_agent_info_contents() {
        let agent = Agent {
            id: "asst_1".to_string(),
            name: Some("customer-service-agent".to_string()),
            model: "gpt-4o".to_string(),
            instructions: None,
            tools: vec![serde_json::json!({"type": "function"})],
            metadata: BTreeMap::new(),
            created_at: None,
        };
        let now = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let text = format_agent_info(&agent, "https://proj", now).unwrap();
        assert!(text.starts_with(&"=".repeat(70)));
        assert!(text.contains("\"tools_count\": 1"));
        assert!(text.contains("\"endpoint\": \"https://proj\""));
        assert!(text.contains("Created: 2025-01-02 03:04:05"));
    }
}
