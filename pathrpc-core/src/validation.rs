//! Structured validation detail
//!
//! Validation failures are reported as a list of issues, each locating the
//! offending value and naming what went wrong:
//!
//! ```json
//! [{"loc": ["body", "msg"], "msg": "field required", "type": "value_error.missing"}]
//! ```
//!
//! The same list is used as `data` on InvalidRequest / InvalidParams errors
//! and as the `detail` of a 422 response on direct calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One validation issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Path to the offending value, outermost first
    pub loc: Vec<Value>,
    /// Human-readable description
    pub msg: String,
    /// Machine-readable category, e.g. `value_error.missing`
    #[serde(rename = "type")]
    pub kind: String,
}

impl Issue {
    /// Build an issue
    pub fn new(loc: Vec<Value>, msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc,
            msg: msg.into(),
            kind: kind.into(),
        }
    }

    /// A required field is absent
    pub fn missing(loc: Vec<Value>) -> Self {
        Self::new(loc, "field required", "value_error.missing")
    }
}

/// A non-empty list of validation issues
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} validation error(s): {}", .issues.len(), summary(.issues))]
pub struct ValidationError {
    issues: Vec<Issue>,
}

fn summary(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|issue| issue.msg.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Wrap a list of issues
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// Wrap a single issue
    pub fn single(issue: Issue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    /// The reported issues
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Issue list as a JSON array
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.issues).unwrap_or(Value::Null)
    }

    /// Translate a serde deserialization failure rooted at `root`
    ///
    /// ```rust
    /// use pathrpc_core::ValidationError;
    ///
    /// #[derive(Debug, serde::Deserialize)]
    /// struct Echo { msg: String }
    ///
    /// let err = serde_json::from_value::<Echo>(serde_json::json!({})).unwrap_err();
    /// let detail = ValidationError::from_serde(&err, "body");
    /// assert_eq!(detail.issues()[0].msg, "field required");
    /// ```
    pub fn from_serde(err: &serde_json::Error, root: &str) -> Self {
        let message = strip_position(&err.to_string());

        if let Some(field) = missing_field(&message) {
            return Self::single(Issue::missing(vec![root.into(), field.into()]));
        }

        let kind = if message.starts_with("invalid type") {
            "type_error"
        } else {
            "value_error"
        };
        Self::single(Issue::new(vec![root.into()], message, kind))
    }

    /// Translate a JSON syntax error found while decoding a request body
    pub fn from_json_decode(err: &serde_json::Error) -> Self {
        Self::single(Issue::new(
            vec!["body".into(), err.column().into()],
            strip_position(&err.to_string()),
            "value_error.jsondecode",
        ))
    }
}

/// Extract `name` from serde's "missing field `name`" message
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

/// Drop serde's trailing " at line L column C"
fn strip_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}
