//! Deferred response rendering
//!
//! A handler's value is captured as a [`PendingResponse`] without being
//! serialized. The caller then picks a [`Transform`]: `Identity` for a direct
//! call (the value is the body) or `Envelope` for a JSON-RPC call (the value
//! becomes `result` of a Success Response). Serialization happens exactly
//! once, in [`PendingResponse::finalize`], and `content-length` is computed
//! from the final bytes.

use crate::handler::Reply;
use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use pathrpc_core::{codec, Error, Result, SuccessResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// How a captured value becomes a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Body is the value itself; the handler's status is honoured
    Identity,
    /// Body is a Success Response with this id; status is always 200
    Envelope {
        /// Request id, `None` for notifications
        id: Option<i64>,
    },
}

/// A handler result waiting for its wire shape
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResponse {
    value: Value,
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl PendingResponse {
    /// Capture a bare value
    pub fn capture(value: Value) -> Self {
        Self {
            value,
            status: None,
            headers: HeaderMap::new(),
        }
    }

    /// Captured value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Status requested by the handler
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Headers set by the handler
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Apply the transform and serialize
    pub fn finalize(self, transform: Transform) -> Result<RenderedResponse> {
        let (status, body) = match transform {
            Transform::Identity => (self.status.unwrap_or(StatusCode::OK), codec::encode(&self.value)?),
            Transform::Envelope { id } => (
                StatusCode::OK,
                codec::encode(&SuccessResponse::new(self.value, id))?,
            ),
        };
        Ok(RenderedResponse::from_parts(status, self.headers, Bytes::from(body)))
    }
}

impl From<Reply> for PendingResponse {
    fn from(reply: Reply) -> Self {
        let (value, status, headers) = reply.into_parts();
        Self {
            value,
            status,
            headers,
        }
    }
}

/// One message emitted by the host dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Response start
    Start {
        /// HTTP status
        status: StatusCode,
        /// Response headers
        headers: HeaderMap,
    },
    /// Body chunk
    Body {
        /// Bytes of this chunk
        chunk: Bytes,
        /// Whether more chunks follow
        more: bool,
    },
}

/// A fully rendered HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RenderedResponse {
    /// Attach JSON content headers to a serialized body
    pub(crate) fn from_parts(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> Self {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON body with the given status
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self> {
        let body = codec::encode(value)?;
        Ok(Self::from_parts(status, HeaderMap::new(), Bytes::from(body)))
    }

    /// `{"detail": ...}` body, the shape of every direct-path failure
    pub fn detail(status: StatusCode, detail: Value) -> Self {
        let body = serde_json::json!({ "detail": detail }).to_string();
        Self::from_parts(status, HeaderMap::new(), Bytes::from(body))
    }

    /// Fixed InternalError envelope used when an error response itself
    /// cannot be encoded
    pub(crate) fn internal_envelope() -> Self {
        Self::from_parts(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(
                br#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal Server Error.","data":null},"id":null}"#,
            ),
        )
    }

    /// HTTP status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }

    /// Split into the start message and a single final body chunk
    pub fn into_messages(self) -> Vec<OutboundMessage> {
        vec![
            OutboundMessage::Start {
                status: self.status,
                headers: self.headers,
            },
            OutboundMessage::Body {
                chunk: self.body,
                more: false,
            },
        ]
    }

    /// Reassemble messages captured by a transport
    ///
    /// The first message must be a `Start`; body chunks are concatenated.
    pub fn from_messages(messages: Vec<OutboundMessage>) -> Result<Self> {
        let mut messages = messages.into_iter();
        let (status, headers) = match messages.next() {
            Some(OutboundMessage::Start { status, headers }) => (status, headers),
            _ => {
                return Err(Error::Io(
                    "response body arrived before response start".to_string(),
                ))
            }
        };

        let mut body = BytesMut::new();
        for message in messages {
            match message {
                OutboundMessage::Body { chunk, .. } => body.extend_from_slice(&chunk),
                OutboundMessage::Start { .. } => {
                    return Err(Error::Io("response started twice".to_string()))
                }
            }
        }

        Ok(Self {
            status,
            headers,
            body: body.freeze(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderName, SET_COOKIE};
    use serde_json::json;

    fn pending() -> PendingResponse {
        Reply::new(json!("hello!!!"))
            .with_status(StatusCode::CREATED)
            .with_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("t1"))
            .with_cookie(HeaderValue::from_static("a=1"))
            .with_cookie(HeaderValue::from_static("b=2"))
            .into()
    }

    #[test]
    fn test_identity_keeps_status_and_headers() {
        let rendered = pending().finalize(Transform::Identity).unwrap();

        assert_eq!(rendered.status(), StatusCode::CREATED);
        assert_eq!(&rendered.body()[..], br#""hello!!!""#);
        assert_eq!(rendered.headers()["x-trace"], "t1");
        assert_eq!(rendered.headers().get_all(SET_COOKIE).iter().count(), 2);
        assert_eq!(rendered.headers()[CONTENT_LENGTH], "10");
    }

    #[test]
    fn test_envelope_forces_ok_and_wraps() {
        let rendered = pending().finalize(Transform::Envelope { id: Some(1) }).unwrap();

        assert_eq!(rendered.status(), StatusCode::OK);
        assert_eq!(rendered.text(), r#"{"jsonrpc":"2.0","result":"hello!!!","id":1}"#);
        assert_eq!(
            rendered.headers()[CONTENT_LENGTH],
            rendered.body().len().to_string().as_str()
        );
        assert_eq!(rendered.headers().get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_null_result_is_kept() {
        let rendered = PendingResponse::capture(Value::Null)
            .finalize(Transform::Envelope { id: None })
            .unwrap();
        assert_eq!(rendered.text(), r#"{"jsonrpc":"2.0","result":null,"id":null}"#);
    }

    #[test]
    fn test_messages_round_trip() {
        let rendered = RenderedResponse::detail(StatusCode::NOT_FOUND, json!("Not Found"));
        let messages = rendered.clone().into_messages();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[1], OutboundMessage::Body { more: false, .. }));

        assert_eq!(RenderedResponse::from_messages(messages).unwrap(), rendered);
    }

    #[test]
    fn test_from_messages_requires_start() {
        let messages = vec![OutboundMessage::Body {
            chunk: Bytes::from_static(b"{}"),
            more: false,
        }];
        assert!(RenderedResponse::from_messages(messages).is_err());
    }
}
