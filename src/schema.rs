use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollectError;

/// One problem submission pushed by the companion extension.
///
/// The document is kept exactly as received. The collector only
/// looks at the optional `batch` object; everything else is read
/// later through [`Payload::problem`] by the materialization stage.
///
/// Example (trimmed):
///
/// ```json
/// {
///   "name": "A. Watermelon",
///   "group": "Codeforces - Beta Round 4",
///   "url": "https://codeforces.com/problemset/problem/4/A",
///   "tests": [{ "input": "8\n", "output": "YES\n" }],
///   "batch": { "id": "8f2c...", "size": 1 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Value);

impl Payload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Reads the batch announcement carried by this payload.
    ///
    /// RETURNS:
    /// - `Ok(None)` if the payload has no `batch` field
    /// - `Err(InvalidBatch)` if `batch` exists but `id` is not a string
    ///   or number, or `size` is not a positive integer (`3.0` counts)
    pub fn batch(&self) -> Result<Option<BatchInfo>, CollectError> {
        let Some(batch) = self.0.get("batch") else {
            return Ok(None);
        };

        let id = batch
            .get("id")
            .ok_or_else(|| CollectError::InvalidBatch("missing batch.id".into()))
            .and_then(BatchId::from_json)?;

        let size = batch
            .get("size")
            .and_then(whole_number)
            .and_then(|size| u64::try_from(size).ok())
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                CollectError::InvalidBatch(format!(
                    "batch {id}: size must be a positive integer, got {}",
                    batch.get("size").unwrap_or(&Value::Null)
                ))
            })?;

        Ok(Some(BatchInfo { id, size }))
    }

    /// Typed view used by naming and materialization.
    pub fn problem(&self) -> Result<Problem, serde_json::Error> {
        Problem::deserialize(&self.0)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------------------------------------------------------
// Batch identity
// ------------------------------------------------------------
//
// Batch ids are opaque. The extension sends UUID strings, but
// numbers are accepted too. Equality is structural:
// - strings never equal numbers (`7` != `"7"`)
// - integral floats equal their integer (`1` == `1.0`)
//
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BatchId {
    Str(String),
    Int(i128),

    /// Non-integral number, keyed by its bit pattern.
    Float(u64),
}

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        BatchId::Str(id.into())
    }

    fn from_json(value: &Value) -> Result<Self, CollectError> {
        match value {
            Value::String(s) => Ok(BatchId::Str(s.clone())),
            Value::Number(n) => Ok(match whole_number(value) {
                Some(i) => BatchId::Int(i),
                None => BatchId::Float(n.as_f64().unwrap_or_default().to_bits()),
            }),
            other => Err(CollectError::InvalidBatch(format!(
                "batch.id must be a string or number, got {other}"
            ))),
        }
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchId::Str(s) => f.write_str(s),
            BatchId::Int(i) => write!(f, "{i}"),
            BatchId::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
        }
    }
}

/// Integer value of a JSON number, including integral floats like `3.0`.
fn whole_number(value: &Value) -> Option<i128> {
    if let Some(i) = value.as_i64() {
        return Some(i128::from(i));
    }
    if let Some(u) = value.as_u64() {
        return Some(i128::from(u));
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38)
        .map(|f| f as i128)
}

/// `batch` announcement of a single payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInfo {
    pub id: BatchId,

    /// Total number of payloads the batch will contain.
    pub size: u64,
}

// ------------------------------------------------------------
// Problem view
// ------------------------------------------------------------
//
// Only the fields used downstream are modelled. Unknown fields
// (memoryLimit, interactive, languages, ...) are ignored here
// and still written to problem.json from the raw payload.
//
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub group: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub input: IoChannel,

    #[serde(default)]
    pub output: IoChannel,

    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// Input or output channel description.
///
/// `fileName` is only present for file-based judges (USACO).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoChannel {
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_absent_is_none() {
        let p = Payload::new(json!({ "name": "A" }));
        assert!(p.batch().unwrap().is_none());
    }

    #[test]
    fn batch_reads_id_and_size() {
        let p = Payload::new(json!({ "batch": { "id": "A", "size": 3 } }));
        let info = p.batch().unwrap().unwrap();
        assert_eq!(info.id, BatchId::new("A"));
        assert_eq!(info.size, 3);
    }

    #[test]
    fn numeric_id_differs_from_its_text() {
        let num = Payload::new(json!({ "batch": { "id": 7, "size": 1 } }));
        let text = Payload::new(json!({ "batch": { "id": "7", "size": 1 } }));
        let num = num.batch().unwrap().unwrap().id;
        let text = text.batch().unwrap().unwrap().id;
        assert_eq!(num, BatchId::Int(7));
        assert_ne!(num, text);
    }

    #[test]
    fn integral_float_id_equals_integer_id() {
        let int = Payload::new(json!({ "batch": { "id": 1, "size": 2 } }));
        let float = Payload::new(json!({ "batch": { "id": 1.0, "size": 2 } }));
        let half = Payload::new(json!({ "batch": { "id": 1.5, "size": 2 } }));
        let int = int.batch().unwrap().unwrap().id;
        assert_eq!(int, float.batch().unwrap().unwrap().id);
        assert_ne!(int, half.batch().unwrap().unwrap().id);
        assert_eq!(half.batch().unwrap().unwrap().id.to_string(), "1.5");
    }

    #[test]
    fn structured_ids_are_invalid() {
        for id in [json!(null), json!(true), json!([1]), json!({ "k": 1 })] {
            let p = Payload::new(json!({ "batch": { "id": id, "size": 1 } }));
            assert!(matches!(p.batch(), Err(CollectError::InvalidBatch(_))));
        }
    }

    #[test]
    fn integral_float_size_is_accepted() {
        let p = Payload::new(json!({ "batch": { "id": "A", "size": 3.0 } }));
        assert_eq!(p.batch().unwrap().unwrap().size, 3);

        let p = Payload::new(json!({ "batch": { "id": "A", "size": 2.5 } }));
        assert!(matches!(p.batch(), Err(CollectError::InvalidBatch(_))));
    }

    #[test]
    fn zero_or_missing_size_is_invalid() {
        for batch in [
            json!({ "id": "A", "size": 0 }),
            json!({ "id": "A" }),
            json!({ "id": "A", "size": -2 }),
            json!({ "id": "A", "size": "3" }),
        ] {
            let p = Payload::new(json!({ "batch": batch }));
            assert!(matches!(p.batch(), Err(CollectError::InvalidBatch(_))));
        }
    }

    #[test]
    fn missing_id_is_invalid() {
        let p = Payload::new(json!({ "batch": { "size": 2 } }));
        assert!(matches!(p.batch(), Err(CollectError::InvalidBatch(_))));
    }

    #[test]
    fn problem_view_reads_companion_fields() {
        let p = Payload::new(json!({
            "name": "Problem B2",
            "group": "USACO 2020 December Contest, Bronze",
            "url": "http://www.usaco.org/index.php?page=viewproblem2&cpid=1059",
            "input": { "type": "file", "fileName": "cowsignal.in" },
            "output": { "type": "file", "fileName": "cowsignal.out" },
            "tests": [{ "input": "1\n", "output": "2\n" }],
            "memoryLimit": 256
        }));
        let problem = p.problem().unwrap();
        assert_eq!(problem.input.file_name.as_deref(), Some("cowsignal.in"));
        assert_eq!(problem.output.file_name.as_deref(), Some("cowsignal.out"));
        assert_eq!(problem.tests.len(), 1);
        assert_eq!(problem.tests[0].output, "2\n");
    }
}
