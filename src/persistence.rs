//! Reading and writing the JSON and JSONL artifacts of an evaluation run.

use crate::error::{HarnessError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Root directory for all evaluation artifacts.
pub const RESULTS_DIR: &str = "evaluation_results";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Write a value as pretty-printed JSON, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let data = serde_json::to_string_pretty(value)
        .map_err(|e| HarnessError::Serialization(e.to_string()))?;

    fs::write(path, data).map_err(|e| HarnessError::io(path, e))
}

/// Read a JSON document.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(HarnessError::DataNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| HarnessError::invalid_data(path, e.to_string()))
}

/// Write one JSON object per line.
pub fn write_jsonl<T: Serialize>(items: &[T], path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let file = fs::File::create(path).map_err(|e| HarnessError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    for item in items {
        let line =
            serde_json::to_string(item).map_err(|e| HarnessError::Serialization(e.to_string()))?;
        writeln!(writer, "{}", line).map_err(|e| HarnessError::io(path, e))?;
    }

    writer.flush().map_err(|e| HarnessError::io(path, e))
}

/// Read newline-delimited JSON, skipping blank lines.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(HarnessError::DataNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let mut items = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let item = serde_json::from_str(line).map_err(|e| {
            HarnessError::invalid_data(path, format!("line {}: {}", line_num + 1, e))
        })?;
        items.push(item);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/summary.json");

        save_json(&json!({"overall_status": "Pass"}), &path).unwrap();

        let loaded: Value = load_json(&path).unwrap();
        assert_eq!(loaded["overall_status"], "Pass");
    }

    #[test]
    fn test_jsonl_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversations.jsonl");
        fs::write(&path, "{\"a\": 1}\n\n   \n{\"a\": 2}\n").unwrap();

        let rows: Vec<Value> = read_jsonl(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["a"], 2);
    }

    #[test]
    fn test_jsonl_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jsonl");
        fs::write(&path, "{\"a\": 1}\nnot json\n").unwrap();

        let err = read_jsonl::<Value>(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_write_then_read_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/input.jsonl");
        write_jsonl(&[json!({"q": "x"}), json!({"q": "y"})], &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_json::<Value>(Path::new("/nonexistent/file.json"));
        assert!(matches!(result, Err(HarnessError::DataNotFound(_))));
    }
}
