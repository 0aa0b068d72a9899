//! JSON-RPC envelope engine
//!
//! Handles a request that reached a router's envelope endpoint:
//!
//! 1. classify the body (failures answer with `id: null`)
//! 2. reject batches with InternalError
//! 3. resolve the method name in the router's registry (MethodNotFound)
//! 4. re-enter the [`App`] at `{prefix}/{name}` with the params as body,
//!    keeping headers, query and state
//! 5. map a handler failure to its protocol error, or wrap the captured
//!    value in a Success Response
//!
//! Exactly one response is produced per call and it is always HTTP 200.

use crate::app::{App, InboundRequest};
use crate::handler::HandlerError;
use crate::registry::MethodRegistry;
use crate::render::{RenderedResponse, Transform};
use http::StatusCode;
use pathrpc_core::{codec, ErrorKind, Message, RpcError};
use serde_json::Value;
use std::time::Instant;

/// Where a call is in the envelope pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Classified,
    Rejected,
    Resolving,
    NotFound,
    Invoking,
    Succeeded,
    Failed(ErrorKind),
    Finalized,
}

/// Per-call bookkeeping; never shared between calls
#[derive(Debug)]
struct DispatchContext {
    stage: Stage,
    id: Option<i64>,
    method: Option<String>,
    started: Instant,
}

impl DispatchContext {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            id: None,
            method: None,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, stage: Stage) {
        tracing::trace!(from = ?self.stage, to = ?stage, "Dispatch stage");
        self.stage = stage;
    }

    fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("")
    }

    fn fail(mut self, app: &App, error: RpcError) -> RenderedResponse {
        let kind = error.kind();
        self.advance(Stage::Failed(kind));
        tracing::debug!(code = error.code(), kind = kind.as_str(), id = ?self.id, "Call failed");

        if let Some(metrics) = app.metrics() {
            metrics.record_error(kind.as_str());
        }
        let response = RenderedResponse::json(StatusCode::OK, &error.into_response(self.id))
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to encode error response");
                RenderedResponse::internal_envelope()
            });
        self.finish(app, "error", response)
    }

    fn finish(mut self, app: &App, outcome: &str, response: RenderedResponse) -> RenderedResponse {
        self.advance(Stage::Finalized);
        if let Some(metrics) = app.metrics() {
            metrics.record_call(
                "envelope",
                self.method(),
                outcome,
                self.started.elapsed().as_secs_f64(),
            );
        }
        response
    }
}

/// Run one envelope call
#[tracing::instrument(skip_all, fields(prefix = %prefix))]
pub(crate) async fn handle_envelope(
    app: &App,
    prefix: &str,
    registry: &MethodRegistry,
    mut request: InboundRequest,
) -> RenderedResponse {
    let mut ctx = DispatchContext::new();

    let body = request.take_body().into_bytes();
    let call = match codec::classify(&body) {
        Ok(Message::Single(call)) => call,
        Ok(Message::Batch(calls)) => {
            ctx.advance(Stage::Rejected);
            tracing::debug!(len = calls.len(), "Batch rejected: batch not supported");
            return ctx.fail(app, RpcError::internal_error());
        }
        Err(error) => return ctx.fail(app, error),
    };

    ctx.advance(Stage::Classified);
    ctx.id = call.id();
    ctx.method = Some(call.method().to_string());
    tracing::debug!(method = %call.method(), id = ?ctx.id, notification = call.is_notification(), "Call classified");

    ctx.advance(Stage::Resolving);
    let path = match registry.resolve(call.method()) {
        Some(registration) => format!("{}{}", prefix, registration.path()),
        None => {
            ctx.advance(Stage::NotFound);
            return ctx.fail(app, RpcError::method_not_found());
        }
    };

    ctx.advance(Stage::Invoking);
    let inner = request.reroute(path, Value::Object(call.into_params()));
    let result = match app.invoke(inner).await {
        Ok(pending) => pending
            .finalize(Transform::Envelope { id: ctx.id })
            .map_err(HandlerError::from),
        Err(err) => Err(err),
    };

    match result {
        Ok(response) => {
            ctx.advance(Stage::Succeeded);
            ctx.finish(app, "success", response)
        }
        Err(err) => {
            let error = to_rpc_error(err, ctx.method());
            ctx.fail(app, error)
        }
    }
}

/// Protocol error for a handler failure
///
/// InternalError never carries data; whatever the handler attached is
/// logged, not returned.
pub(crate) fn to_rpc_error(err: HandlerError, method: &str) -> RpcError {
    match err {
        HandlerError::InvalidParams(detail) => RpcError::invalid_params(detail.to_value()),
        HandlerError::Rpc(error) if error.kind() == ErrorKind::InternalError => {
            tracing::error!(method = %method, data = ?error.data(), "Handler failed");
            RpcError::internal_error()
        }
        HandlerError::Rpc(error) => error,
        HandlerError::Http { status, detail } => {
            tracing::error!(method = %method, status = %status, error = %detail, "Handler failed");
            RpcError::internal_error()
        }
        HandlerError::Internal(message) => {
            tracing::error!(method = %method, error = %message, "Handler failed");
            RpcError::internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathrpc_core::{ApplicationError, ValidationError, Issue};
    use serde_json::json;

    #[test]
    fn test_invalid_params_keep_detail() {
        let err = HandlerError::InvalidParams(ValidationError::single(Issue::missing(vec![
            json!("body"),
            json!("msg"),
        ])));
        let rpc = to_rpc_error(err, "echo");
        assert_eq!(rpc.kind(), ErrorKind::InvalidParams);
        assert_eq!(rpc.data().unwrap()[0]["msg"], "field required");
    }

    #[test]
    fn test_application_error_passes_through() {
        const APP: ApplicationError = ApplicationError::declare(-32001, "Application exception.");
        let rpc = to_rpc_error(APP.with_data("_").into(), "boom");
        assert_eq!(rpc.code(), -32001);
        assert_eq!(rpc.message(), "Application exception.");
        assert_eq!(rpc.data(), Some(&json!("_")));
    }

    #[test]
    fn test_internal_rpc_error_drops_data() {
        let err = HandlerError::Rpc(RpcError::internal_error().with_data("db password=hunter2"));
        let rpc = to_rpc_error(err, "leaky");
        assert_eq!(rpc, RpcError::internal_error());
        assert!(rpc.data().is_none());
    }

    #[test]
    fn test_internal_failures_hide_message() {
        for err in [
            HandlerError::Internal("secret".into()),
            HandlerError::http(StatusCode::BAD_REQUEST, "secret"),
        ] {
            let rpc = to_rpc_error(err, "m");
            assert_eq!(rpc, RpcError::internal_error());
            assert!(rpc.data().is_none());
        }
    }
}
