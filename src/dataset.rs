//! Test data loading.
//!
//! Supports:
//! - the agent query file: `{"data": [{"query": ..., "ground-truth": ...}]}`
//! - GenAI datasets in JSONL with `query`, `response` and optional `ground_truth`

use crate::error::{HarnessError, Result};
use crate::persistence;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default location of the agent query file.
pub const DEFAULT_QUERY_FILE: &str = "data/agent-eval-data.json";

/// Default location of the GenAI dataset.
pub const DEFAULT_GENAI_FILE: &str = "data/genai-eval-data.jsonl";

/// A single test query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryItem {
    pub query: String,
    #[serde(rename = "ground-truth", default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
}

impl QueryItem {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ground_truth: None,
        }
    }
}

/// The query file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDataset {
    pub data: Vec<QueryItem>,
}

impl QueryDataset {
    /// Load the query file. A missing `data` array is a data error.
    pub fn load(path: &Path) -> Result<Self> {
        persistence::load_json(path)
    }

    pub fn from_queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: queries.into_iter().map(QueryItem::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a subset of items (for quick testing).
    pub fn take(&self, n: usize) -> Self {
        Self {
            data: self.data.iter().take(n).cloned().collect(),
        }
    }
}

/// Outcome of checking a GenAI dataset before sending it to the judges.
#[derive(Debug, Clone)]
pub struct GenaiDatasetCheck {
    /// Number of non-empty lines.
    pub line_count: usize,
    /// Required fields absent from the first row.
    pub missing_fields: Vec<&'static str>,
    /// The first row, as parsed.
    pub sample: serde_json::Value,
}

const GENAI_REQUIRED_FIELDS: [&str; 2] = ["query", "response"];

/// Check that a GenAI dataset exists, is non-empty and its first row parses.
pub fn check_genai_dataset(path: &Path) -> Result<GenaiDatasetCheck> {
    if !path.exists() {
        return Err(HarnessError::DataNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();

    let first = lines
        .first()
        .ok_or_else(|| HarnessError::invalid_data(path, "file is empty"))?;

    let sample: serde_json::Value = serde_json::from_str(first)
        .map_err(|e| HarnessError::invalid_data(path, format!("line 1: {}", e)))?;

    let missing_fields = GENAI_REQUIRED_FIELDS
        .into_iter()
        .filter(|field| sample.get(field).is_none())
        .collect();

    Ok(GenaiDatasetCheck {
        line_count: lines.len(),
        missing_fields,
        sample,
    })
}

/// Load every row of a GenAI dataset.
pub fn load_genai_rows(path: &Path) -> Result<Vec<serde_json::Value>> {
    persistence::read_jsonl(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_query_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent-eval-data.json");
        fs::write(
            &path,
            r#"{"data": [
                {"query": "What are your business hours?", "ground-truth": "9-8 weekdays"},
                {"query": "How do I track my order?"}
            ]}"#,
        )
        .unwrap();

        let dataset = QueryDataset::load(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.data[0].ground_truth.as_deref(), Some("9-8 weekdays"));
        assert_eq!(dataset.data[1].ground_truth, None);
    }

    #[test]
    fn test_malformed_query_file_is_data_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"rows": []}"#).unwrap();

        assert!(matches!(
            QueryDataset::load(&path),
            Err(HarnessError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_dataset_take() {
        let dataset = QueryDataset::from_queries(["a", "b", "c"]);
        assert_eq!(dataset.take(2).len(), 2);
        assert!(QueryDataset::default().is_empty());
    }

    #[test]
    fn test_check_genai_dataset_reports_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genai.jsonl");
        fs::write(
            &path,
            "{\"query\": \"q1\", \"ground_truth\": \"g\"}\n{\"query\": \"q2\", \"response\": \"r\"}\n",
        )
        .unwrap();

        let check = check_genai_dataset(&path).unwrap();
        assert_eq!(check.line_count, 2);
        assert_eq!(check.missing_fields, vec!["response"]);
        assert_eq!(check.sample["query"], "q1");
    }

    #[test]
    fn test_check_genai_dataset_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.jsonl");
        fs::write(&path, "\n\n").unwrap();

        assert!(check_genai_dataset(&path).is_err());
    }
}
