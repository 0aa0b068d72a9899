//! JSON-RPC 2.0 wire shapes
//!
//! Inbound messages are either a single call or a batch of calls. A call is
//! a [`Request`] when the object carries an `id` key and a [`Notification`]
//! otherwise. Outbound messages are a [`SuccessResponse`] or an
//! [`ErrorResponse`]; both always carry `id`, which is `null` for
//! notifications and for failures detected before an id could be read.
//!
//! Ids are integers. `params` is always an object and defaults to `{}`.
//!
//! # Examples
//!
//! ```rust
//! use pathrpc_core::{SuccessResponse, ErrorResponse, RpcError};
//! use serde_json::json;
//!
//! let ok = SuccessResponse::new(json!("hello!!!"), Some(1));
//! assert_eq!(
//!     serde_json::to_string(&ok).unwrap(),
//!     r#"{"jsonrpc":"2.0","result":"hello!!!","id":1}"#
//! );
//!
//! let err = ErrorResponse::new(RpcError::method_not_found(), None);
//! assert_eq!(
//!     serde_json::to_value(&err).unwrap(),
//!     json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found.", "data": null}, "id": null})
//! );
//! ```

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only protocol version tag accepted or produced
pub const JSONRPC_VERSION: &str = "2.0";

fn version() -> String {
    JSONRPC_VERSION.to_string()
}

/// A call that expects a response correlated by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Named parameters
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Correlation id
    pub id: i64,
}

impl Request {
    /// Build a request; `params` defaults to an empty object
    pub fn new(method: impl Into<String>, params: Map<String, Value>, id: i64) -> Self {
        Self {
            jsonrpc: version(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A call without `id`
///
/// The caller does not expect to correlate the answer, but the dispatch
/// engine still produces a response, with `id: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Named parameters
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Notification {
    /// Build a notification
    pub fn new(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            jsonrpc: version(),
            method: method.into(),
            params,
        }
    }
}

/// A single classified call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Object with an `id` key
    Request(Request),
    /// Object without an `id` key
    Notification(Notification),
}

impl Call {
    /// Method name
    pub fn method(&self) -> &str {
        match self {
            Call::Request(r) => &r.method,
            Call::Notification(n) => &n.method,
        }
    }

    /// Named parameters
    pub fn params(&self) -> &Map<String, Value> {
        match self {
            Call::Request(r) => &r.params,
            Call::Notification(n) => &n.params,
        }
    }

    /// Response id: the request id, or `None` for notifications
    pub fn id(&self) -> Option<i64> {
        match self {
            Call::Request(r) => Some(r.id),
            Call::Notification(_) => None,
        }
    }

    /// Whether this call is a notification
    pub fn is_notification(&self) -> bool {
        matches!(self, Call::Notification(_))
    }

    /// Consume the call, keeping only its parameters
    pub fn into_params(self) -> Map<String, Value> {
        match self {
            Call::Request(r) => r.params,
            Call::Notification(n) => n.params,
        }
    }
}

/// A classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// One call
    Single(Call),
    /// A non-empty ordered list of calls
    Batch(Vec<Call>),
}

impl Message {
    /// Whether this message is a batch
    pub fn is_batch(&self) -> bool {
        matches!(self, Message::Batch(_))
    }
}

/// Successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method result; serialized even when `null`
    pub result: Value,
    /// Request id, `null` for notifications
    pub id: Option<i64>,
}

impl SuccessResponse {
    /// Wrap a result value
    pub fn new(result: Value, id: Option<i64>) -> Self {
        Self {
            jsonrpc: version(),
            result,
            id,
        }
    }
}

/// Error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Error object
    pub error: RpcError,
    /// Request id when known, otherwise `null`
    pub id: Option<i64>,
}

impl ErrorResponse {
    /// Wrap an error
    pub fn new(error: RpcError, id: Option<i64>) -> Self {
        Self {
            jsonrpc: version(),
            error,
            id,
        }
    }
}

impl RpcError {
    /// Wrap this error in an Error Response
    pub fn into_response(self, id: Option<i64>) -> ErrorResponse {
        ErrorResponse::new(self, id)
    }
}

/// Either response shape
///
/// Untagged: an object with `result` is a success, an object with `error`
/// is a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Success
    Success(SuccessResponse),
    /// Failure
    Error(ErrorResponse),
}

impl Response {
    /// Response id
    pub fn id(&self) -> Option<i64> {
        match self {
            Response::Success(s) => s.id,
            Response::Error(e) => e.id,
        }
    }

    /// Whether this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// Result on success, error object on failure
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self {
            Response::Success(s) => Ok(s.result),
            Response::Error(e) => Err(e.error),
        }
    }
}

impl From<SuccessResponse> for Response {
    fn from(r: SuccessResponse) -> Self {
        Response::Success(r)
    }
}

impl From<ErrorResponse> for Response {
    fn from(r: ErrorResponse) -> Self {
        Response::Error(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_keeps_null_result() {
        let response = SuccessResponse::new(Value::Null, None);
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","result":null,"id":null}"#);
    }

    #[test]
    fn test_error_response_shape() {
        let response = RpcError::internal_error().into_response(Some(7));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "error": {"code": -32603, "message": "Internal Server Error.", "data": null},
                "id": 7
            })
        );
    }

    #[test]
    fn test_response_untagged_decoding() {
        let ok: Response =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":"hello","id":1}"#).unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.id(), Some(1));

        let err: Response = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found.","data":null},"id":null}"#,
        )
        .unwrap();
        assert!(!err.is_success());
        assert_eq!(err.into_result().unwrap_err().code(), -32601);
    }

    #[test]
    fn test_call_accessors() {
        let mut params = Map::new();
        params.insert("msg".into(), json!("hi"));

        let request = Call::Request(Request::new("echo", params.clone(), 3));
        assert_eq!(request.method(), "echo");
        assert_eq!(request.id(), Some(3));
        assert!(!request.is_notification());

        let notification = Call::Notification(Notification::new("echo", params.clone()));
        assert_eq!(notification.id(), None);
        assert!(notification.is_notification());
        assert_eq!(notification.into_params(), params);
    }

    #[test]
    fn test_request_serializes_in_field_order() {
        let request = Request::new("ping", Map::new(), 0);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"jsonrpc":"2.0","method":"ping","params":{},"id":0}"#
        );
    }
}
