//! Field access on explanation records.

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

pub const START_OFFSET: &str = "startOffset";
pub const END_OFFSET: &str = "endOffset";
pub const PERPLEXITY: &str = "perplexity";
pub const PERPLEXITY_MODEL: &str = "perplexityModel";

/// Whether the record already carries a score (a number or a boolean).
pub fn is_scored(record: &Map<String, Value>) -> bool {
    record
        .get(PERPLEXITY)
        .is_some_and(|v| v.is_number() || v.is_boolean())
}

/// Byte span `(start, end)` of the record before clamping.
///
/// A missing start is 0; a missing end is one byte past the start.
pub fn span(record: &Map<String, Value>) -> Result<(i64, i64)> {
    let start = offset(record, START_OFFSET)?.unwrap_or(0);
    let end = offset(record, END_OFFSET)?.unwrap_or_else(|| start.saturating_add(1));
    Ok((start, end))
}

fn offset(record: &Map<String, Value>, field: &'static str) -> Result<Option<i64>> {
    let invalid = |value: &Value| Error::Offset {
        field,
        value: value.to_string(),
    };
    let Some(value) = record.get(field) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(Some)
            .ok_or_else(|| invalid(value)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(value)),
        _ => Err(invalid(value)),
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Store a score and the model that produced it.
///
/// JSON has no infinity; a non-finite score is stored as `null`.
pub fn write_score(record: &mut Map<String, Value>, perplexity: f64, model_id: &str) {
    let value = Number::from_f64(round2(perplexity))
        .map(Value::Number)
        .unwrap_or(Value::Null);
    record.insert(PERPLEXITY.to_string(), value);
    record.insert(PERPLEXITY_MODEL.to_string(), Value::String(model_id.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_is_scored() {
        assert!(is_scored(&obj(json!({"perplexity": 12.3}))));
        assert!(is_scored(&obj(json!({"perplexity": 0}))));
        assert!(is_scored(&obj(json!({"perplexity": true}))));
        assert!(is_scored(&obj(json!({"perplexity": false}))));
        assert!(!is_scored(&obj(json!({"perplexity": null}))));
        assert!(!is_scored(&obj(json!({"perplexity": "12"}))));
        assert!(!is_scored(&obj(json!({}))));
    }

    #[test]
    fn test_span_defaults() {
        assert_eq!(span(&obj(json!({}))).unwrap(), (0, 1));
        assert_eq!(span(&obj(json!({"startOffset": 40}))).unwrap(), (40, 41));
        assert_eq!(
            span(&obj(json!({"startOffset": null, "endOffset": 3}))).unwrap(),
            (0, 3)
        );
    }

    #[test]
    fn test_span_accepts_floats_and_strings() {
        let rec = obj(json!({"startOffset": 12.9, "endOffset": " 20 "}));
        assert_eq!(span(&rec).unwrap(), (12, 20));
        let rec = obj(json!({"startOffset": -4, "endOffset": -1.5}));
        assert_eq!(span(&rec).unwrap(), (-4, -1));
    }

    #[test]
    fn test_span_rejects_garbage() {
        let err = span(&obj(json!({"startOffset": "act one"}))).unwrap_err();
        assert!(err.to_string().contains("startOffset"));
        assert!(span(&obj(json!({"endOffset": [1, 2]}))).is_err());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.345_678), 12.35);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(99.999), 100.0);
        assert_eq!(round2(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_write_score_keeps_other_fields() {
        let mut rec = obj(json!({"id": "p1", "startOffset": 0, "endOffset": 5}));
        write_score(&mut rec, 41.2371, "gpt2");
        assert_eq!(
            Value::Object(rec),
            json!({
                "id": "p1",
                "startOffset": 0,
                "endOffset": 5,
                "perplexity": 41.24,
                "perplexityModel": "gpt2"
            })
        );
    }

    #[test]
    fn test_write_infinite_score_as_null() {
        let mut rec = obj(json!({"perplexity": 3.0}));
        write_score(&mut rec, f64::INFINITY, "gpt2");
        assert_eq!(rec[PERPLEXITY], Value::Null);
        assert_eq!(rec[PERPLEXITY_MODEL], json!("gpt2"));
    }
}
