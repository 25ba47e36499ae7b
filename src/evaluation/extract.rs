//! Metric extraction from evaluator output.
//!
//! Evaluator metrics arrive as a flat object whose keys follow a
//! `category.metric` convention. Lookups here are pure: a missing key is
//! `None`, a present key with the wrong type is an error.

use crate::error::{HarnessError, Result};
use serde_json::{Map, Value};

/// Flat metric object as returned by the evaluator.
pub type MetricMap = Map<String, Value>;

/// Key of a per-category defect rate in safety evaluator output.
pub fn safety_defect_rate_key(category: &str) -> String {
    format!("{}.defect_rate", category)
}

/// Key of a per-category defect rate in content safety output over red-team
/// conversations.
pub fn red_team_defect_rate_key(category: &str) -> String {
    format!("content_safety.{}_defect_rate", category)
}

/// Key of the overall pass fraction in content safety output.
pub const BINARY_AGGREGATE_KEY: &str = "content_safety.binary_aggregate";

/// Numeric value under `key`. Absent or `null` is `None`.
pub fn numeric(metrics: &MetricMap, key: &str) -> Result<Option<f64>> {
    match metrics.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| {
            HarnessError::EvaluatorShape(format!("metric '{}' is not representable as f64", key))
        }),
        Some(other) => Err(HarnessError::EvaluatorShape(format!(
            "metric '{}' should be a number, found {}",
            key, other
        ))),
    }
}

/// A defect rate under `key`, which must lie in `[0, 1]` when present.
pub fn defect_rate(metrics: &MetricMap, key: &str) -> Result<Option<f64>> {
    match numeric(metrics, key)? {
        Some(rate) if !(0.0..=1.0).contains(&rate) => Err(HarnessError::EvaluatorShape(format!(
            "defect rate '{}' out of range: {}",
            key, rate
        ))),
        other => Ok(other),
    }
}

/// Defect rates for `categories`, in order, using `key_for` to build keys.
pub fn defect_rates<F>(
    metrics: &MetricMap,
    categories: &[&'static str],
    key_for: F,
) -> Result<Vec<(&'static str, Option<f64>)>>
where
    F: Fn(&str) -> String,
{
    categories
        .iter()
        .map(|&category| Ok((category, defect_rate(metrics, &key_for(category))?)))
        .collect()
}

/// First numeric value found under any of `keys`.
pub fn first_numeric(metrics: &MetricMap, keys: &[String]) -> Result<Option<f64>> {
    for key in keys {
        if let Some(value) = numeric(metrics, key)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Per-row label for a safety category.
///
/// Safety evaluators report categorical severities ("Very low", "Medium")
/// rather than numbers; both are rendered as text.
pub fn row_label(row: &Value, category: &str) -> Option<String> {
    let nested = format!("{}.{}", category, category);
    let value = row.get(&nested).or_else(|| row.get(category))?;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Query text of an output row, from `query` or `inputs.query`.
pub fn row_query(row: &Value) -> Option<&str> {
    row.get("query")
        .or_else(|| row.get("inputs.query"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics(value: Value) -> MetricMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_key_conventions() {
        assert_eq!(safety_defect_rate_key("violence"), "violence.defect_rate");
        assert_eq!(
            red_team_defect_rate_key("self_harm"),
            "content_safety.self_harm_defect_rate"
        );
    }

    #[test]
    fn test_missing_key_is_absent() {
        let m = metrics(json!({"violence.defect_rate": 0.0}));
        let rates = defect_rates(&m, &["violence", "sexual"], safety_defect_rate_key).unwrap();
        assert_eq!(rates, vec![("violence", Some(0.0)), ("sexual", None)]);
    }

    #[test]
    fn test_non_numeric_rate_fails_loudly() {
        let m = metrics(json!({"violence.defect_rate": "Low"}));
        assert!(matches!(
            defect_rate(&m, "violence.defect_rate"),
            Err(HarnessError::EvaluatorShape(_))
        ));
    }

    #[test]
    fn test_out_of_range_rate_rejected() {
        let m = metrics(json!({"violence.defect_rate": 1.5}));
        assert!(defect_rate(&m, "violence.defect_rate").is_err());
    }

    #[test]
    fn test_first_numeric_uses_fallback_keys() {
        let m = metrics(json!({"relevance": 4.2}));
        let keys = vec!["relevance.relevance".to_string(), "relevance".to_string()];
        assert_eq!(first_numeric(&m, &keys).unwrap(), Some(4.2));
    }

    #[test]
    fn test_row_label_lookup_order() {
        let row = json!({"violence.violence": "Very low", "sexual": 0, "query": "hi"});
        assert_eq!(row_label(&row, "violence").as_deref(), Some("Very low"));
        assert_eq!(row_label(&row, "sexual").as_deref(), Some("0"));
        assert_eq!(row_label(&row, "self_harm"), None);
        assert_eq!(row_query(&row), Some("hi"));
    }
}
