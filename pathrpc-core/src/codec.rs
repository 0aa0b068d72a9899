//! Classification, encoding and decoding of JSON-RPC messages
//!
//! [`classify`] turns raw body bytes into a [`Message`] or the protocol error
//! that must be reported instead. The checks run in a fixed order:
//!
//! 1. Bytes must parse as JSON, otherwise ParseError (data = decoder message)
//! 2. The value must be an object or an array, otherwise InvalidRequest
//! 3. An array is a batch candidate: it must be non-empty and every element
//!    must pass step 4
//! 4. An object with an `id` key is a Request, otherwise a Notification.
//!    `jsonrpc` must be `"2.0"` when present, `method` a string, `params` absent or an
//!    object, and a Request's `id` an integer. Violations are InvalidRequest
//!    with the issue list as data.
//!
//! Method resolution is not part of classification; an unknown method name
//! is a well-formed call.
//!
//! # Examples
//!
//! ```rust
//! use pathrpc_core::{codec, Message, ErrorKind};
//!
//! let msg = codec::classify(br#"{"jsonrpc":"2.0","method":"echo","params":{"msg":"hi"},"id":1}"#).unwrap();
//! match msg {
//!     Message::Single(call) => assert_eq!(call.id(), Some(1)),
//!     Message::Batch(_) => unreachable!(),
//! }
//!
//! let err = codec::classify(b"").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::ParseError);
//! ```

use crate::error::{Error, Result, RpcError};
use crate::types::{Call, Message, Notification, Request, Response, JSONRPC_VERSION};
use crate::validation::Issue;
use serde::Serialize;
use serde_json::{Map, Value};

/// Classify a raw request body
pub fn classify(body: &[u8]) -> std::result::Result<Message, RpcError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| RpcError::parse_error(e.to_string()))?;

    match value {
        Value::Object(object) => classify_object(object).map(Message::Single),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(RpcError::invalid_request("batch must not be empty"));
            }
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(object) => classify_object(object),
                    other => Err(RpcError::invalid_request(format!(
                        "batch items must be objects, got {}",
                        type_name(&other)
                    ))),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Message::Batch)
        }
        other => Err(RpcError::invalid_request(format!(
            "expected an object or an array, got {}",
            type_name(&other)
        ))),
    }
}

fn classify_object(mut object: Map<String, Value>) -> std::result::Result<Call, RpcError> {
    let mut issues = Vec::new();

    match object.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(_) => issues.push(Issue::new(
            vec!["jsonrpc".into()],
            format!("unexpected value; permitted: '{}'", JSONRPC_VERSION),
            "value_error.const",
        )),
        // An absent tag defaults to "2.0"
        None => {}
    }

    let method = match object.remove("method") {
        Some(Value::String(method)) => Some(method),
        Some(_) => {
            issues.push(Issue::new(
                vec!["method".into()],
                "str type expected",
                "type_error.str",
            ));
            None
        }
        None => {
            issues.push(Issue::missing(vec!["method".into()]));
            None
        }
    };

    let params = match object.remove("params") {
        None => Some(Map::new()),
        Some(Value::Object(params)) => Some(params),
        Some(other) => {
            issues.push(Issue::new(
                vec!["params".into()],
                format!("params must be an object, got {}", type_name(&other)),
                "type_error.dict",
            ));
            None
        }
    };

    // Presence of the key alone decides Request vs Notification.
    let id = match object.get("id") {
        None => None,
        Some(raw) => match raw.as_i64() {
            Some(id) => Some(Some(id)),
            None => {
                issues.push(Issue::new(
                    vec!["id".into()],
                    "value is not a valid integer",
                    "type_error.integer",
                ));
                Some(None)
            }
        },
    };

    if !issues.is_empty() {
        let detail = serde_json::to_value(&issues).unwrap_or(Value::Null);
        return Err(RpcError::invalid_request(detail));
    }

    match (method, params, id) {
        (Some(method), Some(params), Some(Some(id))) => {
            Ok(Call::Request(Request::new(method, params, id)))
        }
        (Some(method), Some(params), None) => {
            Ok(Call::Notification(Notification::new(method, params)))
        }
        // Any other combination pushed an issue above.
        _ => Err(RpcError::invalid_request(Value::Null)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Encode any serializable message to JSON bytes
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(msg).map_err(Error::from)
}

/// Encode any serializable message to a JSON string
pub fn encode_string<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(Error::from)
}

/// Decode a Success or Error Response
pub fn decode_response(data: &[u8]) -> Result<Response> {
    serde_json::from_slice(data).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn classify_str(body: &str) -> std::result::Result<Message, RpcError> {
        classify(body.as_bytes())
    }

    #[test]
    fn test_empty_body_is_parse_error() {
        let err = classify_str("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
        assert!(err.data().and_then(Value::as_str).is_some());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = classify_str("not json{").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
    }

    #[test]
    fn test_scalars_are_invalid_requests() {
        for body in ["1", "null", "\"text\"", "true"] {
            let err = classify_str(body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "body {body}");
        }
    }

    #[test]
    fn test_empty_object_is_invalid_request() {
        let err = classify_str("{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        // Only the method is missing; the version tag has a default
        let data = err.data().unwrap().as_array().unwrap().clone();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["loc"], json!(["method"]));
    }

    #[test]
    fn test_request_with_id() {
        let msg = classify_str(r#"{"jsonrpc":"2.0","method":"echo","params":{"msg":"hi"},"id":1}"#)
            .unwrap();
        match msg {
            Message::Single(Call::Request(req)) => {
                assert_eq!(req.method, "echo");
                assert_eq!(req.id, 1);
                assert_eq!(req.params["msg"], json!("hi"));
            }
            other => panic!("Expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_notification_defaults_params() {
        let msg = classify_str(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        match msg {
            Message::Single(Call::Notification(n)) => assert!(n.params.is_empty()),
            other => panic!("Expected notification, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_method_is_still_a_call() {
        let msg = classify_str(r#"{"jsonrpc":"2.0","method":"","params":{}}"#).unwrap();
        assert!(matches!(msg, Message::Single(Call::Notification(_))));
    }

    #[test]
    fn test_array_params_rejected() {
        let err = classify_str(r#"{"jsonrpc":"2.0","method":"echo","params":[1,2],"id":1}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.data().unwrap()[0]["loc"], json!(["params"]));
    }

    #[test]
    fn test_non_integer_id_rejected() {
        for id in ["\"abc\"", "null", "1.5"] {
            let body = format!(r#"{{"jsonrpc":"2.0","method":"echo","id":{id}}}"#);
            let err = classify_str(&body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "id {id}");
        }
    }

    #[test]
    fn test_missing_version_defaults() {
        let msg = classify_str(r#"{"method":"echo","params":{"msg":"hi"},"id":1}"#).unwrap();
        match msg {
            Message::Single(call) => {
                assert_eq!(call.method(), "echo");
                assert_eq!(call.id(), Some(1));
            }
            Message::Batch(_) => panic!("expected a single call"),
        }
    }

    #[test]
    fn test_wrong_version_rejected() {
        let err = classify_str(r#"{"jsonrpc":"1.0","method":"echo"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_batch_classification() {
        let msg = classify_str(
            r#"[{"jsonrpc":"2.0","method":"a","id":1},{"jsonrpc":"2.0","method":"b"}]"#,
        )
        .unwrap();
        match msg {
            Message::Batch(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].id(), Some(1));
                assert!(calls[1].is_notification());
            }
            other => panic!("Expected batch, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        let err = classify_str("[]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_batch_with_scalar_rejected() {
        let err = classify_str(r#"[{"jsonrpc":"2.0","method":"a"}, 3]"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_decode_response() {
        let response =
            decode_response(br#"{"jsonrpc":"2.0","result":"hello!!!","id":1}"#).unwrap();
        assert_eq!(response.into_result().unwrap(), json!("hello!!!"));
    }
}
