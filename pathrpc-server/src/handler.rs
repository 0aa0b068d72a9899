//! Method handlers
//!
//! A handler receives a [`CallContext`] (decoded params, request headers,
//! query string, the connection's [`State`]) and produces a [`Reply`] or a
//! [`HandlerError`]. Nothing in the context says whether the call came in
//! directly at the method's path or through the JSON-RPC envelope endpoint;
//! the same handler serves both.
//!
//! # Creating Handlers
//!
//! - [`from_fn`]: raw JSON params in, raw JSON value out
//! - [`from_typed_fn`]: params deserialized into `P`, any `Serialize` out
//! - [`from_typed_ctx_fn`]: like `from_typed_fn` but with the context and a
//!   full [`Reply`] (status, headers, cookies)
//! - [`from_ctx_fn`]: the base form every other constructor builds on
//! - [`RpcMethod`]: the params struct *is* the method; its type name gives
//!   the method name (`UpdateState` registers as `update_state`)
//! - `#[method]` in `pathrpc-macros`: an async fn turned into a [`MethodDef`]
//!
//! Params that fail to deserialize become [`HandlerError::InvalidParams`]
//! carrying a structured issue list.
//!
//! # Examples
//!
//! ```rust
//! use pathrpc_server::{from_fn, from_typed_fn, HandlerError};
//! use serde::Deserialize;
//!
//! let ping = from_fn(|_params| async { Ok(serde_json::json!("pong")) });
//!
//! #[derive(Deserialize)]
//! struct Echo { msg: String }
//!
//! let echo = from_typed_fn(|p: Echo| async move { Ok::<_, HandlerError>(p.msg) });
//! ```

use crate::registry::to_snake_case;
use crate::state::State;
use async_trait::async_trait;
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use pathrpc_core::{ApplicationError, RpcError, ValidationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by every handler
pub type HandlerResult = Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>>;

/// Failure raised by a handler
///
/// On the envelope path these map to JSON-RPC errors: `InvalidParams` to
/// -32602 with the issue list as data, `Rpc` passes through unchanged, and
/// everything else becomes -32603 with no data. On the direct path they map
/// to HTTP statuses: 422, the given status for `Http`, 500 otherwise.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Parameters did not match the declared shape
    #[error("Invalid params: {0}")]
    InvalidParams(#[from] ValidationError),

    /// A protocol error, usually a declared application error
    #[error("{0}")]
    Rpc(#[from] RpcError),

    /// An explicit HTTP failure
    #[error("HTTP {status}: {detail}")]
    Http {
        /// Status for direct calls
        status: StatusCode,
        /// Message placed in the `detail` field
        detail: String,
    },

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    /// Internal failure from any displayable error
    pub fn internal(err: impl std::fmt::Display) -> Self {
        HandlerError::Internal(err.to_string())
    }

    /// Explicit HTTP failure
    pub fn http(status: StatusCode, detail: impl Into<String>) -> Self {
        HandlerError::Http {
            status,
            detail: detail.into(),
        }
    }
}

impl From<ApplicationError> for HandlerError {
    fn from(err: ApplicationError) -> Self {
        HandlerError::Rpc(err.error())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Internal(err.to_string())
    }
}

impl From<pathrpc_core::Error> for HandlerError {
    fn from(err: pathrpc_core::Error) -> Self {
        match err {
            pathrpc_core::Error::Rpc(rpc) => HandlerError::Rpc(rpc),
            other => HandlerError::Internal(other.to_string()),
        }
    }
}

/// What a handler can see about the call
#[derive(Debug, Clone)]
pub struct CallContext {
    params: Value,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    state: State,
}

impl CallContext {
    /// Context with the given params and an empty everything else
    pub fn new(params: Value) -> Self {
        Self {
            params,
            path: String::new(),
            query: None,
            headers: HeaderMap::new(),
            state: State::new(),
        }
    }

    /// Set the request path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the query string
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    /// Set the request headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the connection state bag
    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// Decoded params (`{}` for an empty direct-call body)
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Move the params out, leaving `null`
    pub fn take_params(&mut self) -> Value {
        std::mem::take(&mut self.params)
    }

    /// Path of the method route
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, without `?`
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Connection state bag
    pub fn state(&self) -> &State {
        &self.state
    }
}

/// A handler's result value plus response parts
///
/// Headers and cookies set here reach the caller on both paths. A status
/// set here is only honoured on direct calls; envelope calls always answer
/// 200.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    value: Value,
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl Reply {
    /// Reply with a JSON value
    pub fn new(value: Value) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// Reply with any serializable value
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        serde_json::to_value(value)
            .map(Self::new)
            .map_err(HandlerError::internal)
    }

    /// Override the direct-call status
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Append a response header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Append a `set-cookie` header
    pub fn with_cookie(self, cookie: HeaderValue) -> Self {
        self.with_header(SET_COOKIE, cookie)
    }

    /// Result value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Status override, if any
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn into_parts(self) -> (Value, Option<StatusCode>, HeaderMap) {
        (self.value, self.status, self.headers)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::new(value)
    }
}

/// A method implementation
///
/// Usually built with one of the `from_*` constructors rather than
/// implemented by hand.
pub trait Handler: Send + Sync {
    /// Run the method
    fn handle(&self, ctx: CallContext) -> HandlerResult;
}

/// Adapts an async closure over [`CallContext`] into a [`Handler`]
pub struct AsyncHandler<F> {
    func: F,
}

impl<F> AsyncHandler<F> {
    /// Wrap a closure
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    fn handle(&self, ctx: CallContext) -> HandlerResult {
        Box::pin((self.func)(ctx))
    }
}

/// Handler from a closure over the full context
///
/// ```rust
/// use pathrpc_server::{from_ctx_fn, Reply};
/// use http::{header::HeaderName, HeaderValue, StatusCode};
///
/// let created = from_ctx_fn(|_ctx| async {
///     Ok(Reply::new(serde_json::json!({"id": 1}))
///         .with_status(StatusCode::CREATED)
///         .with_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc")))
/// });
/// ```
pub fn from_ctx_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    Box::new(AsyncHandler::new(func))
}

/// Handler from a closure over raw JSON params
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    from_ctx_fn(move |mut ctx: CallContext| {
        let fut = func(ctx.take_params());
        async move { fut.await.map(Reply::new) }
    })
}

/// Handler from a closure over typed params
///
/// Deserialization failures become [`HandlerError::InvalidParams`]; the
/// closure is not called.
pub fn from_typed_fn<P, R, E, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: Into<HandlerError> + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    from_ctx_fn(move |mut ctx: CallContext| {
        let call = decode_params::<P>(ctx.take_params()).map(&func);
        async move {
            let result = call?.await.map_err(Into::into)?;
            Reply::json(&result)
        }
    })
}

/// Handler from a closure over typed params and the context
pub fn from_typed_ctx_fn<P, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(P, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    from_ctx_fn(move |mut ctx: CallContext| {
        let call = decode_params::<P>(ctx.take_params()).map(|params| func(params, ctx));
        async move { call?.await }
    })
}

fn decode_params<P: DeserializeOwned>(params: Value) -> Result<P, HandlerError> {
    serde_json::from_value(params)
        .map_err(|e| HandlerError::InvalidParams(ValidationError::from_serde(&e, "body")))
}

/// A params struct that is also the method
///
/// The struct is deserialized from the call's params and then called. Its
/// method name is its type name in snake case.
///
/// ```rust
/// use pathrpc_server::{CallContext, HandlerError, RpcMethod};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct UpdateState { step: i64 }
///
/// #[async_trait::async_trait]
/// impl RpcMethod for UpdateState {
///     type Output = i64;
///
///     async fn call(self, ctx: CallContext) -> Result<i64, HandlerError> {
///         Ok(ctx.state().update(|bag| {
///             let next = bag.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + self.step;
///             bag.insert("count".into(), next.into());
///             next
///         }).await)
///     }
/// }
///
/// assert_eq!(UpdateState::name(), "update_state");
/// ```
#[async_trait]
pub trait RpcMethod: DeserializeOwned + Send + 'static {
    /// Result type
    type Output: Serialize + Send;

    /// Run the method
    async fn call(self, ctx: CallContext) -> Result<Self::Output, HandlerError>;

    /// Registered method name
    fn name() -> String {
        method_name::<Self>()
    }
}

/// Handler running an [`RpcMethod`]
pub fn method_handler<M: RpcMethod>() -> Box<dyn Handler> {
    from_ctx_fn(|mut ctx: CallContext| {
        let method = decode_params::<M>(ctx.take_params());
        async move {
            let output = method?.call(ctx).await?;
            Reply::json(&output)
        }
    })
}

/// Snake-cased last path segment of a type name, generics stripped
pub fn method_name<M>() -> String {
    let full = std::any::type_name::<M>();
    let base = full.split('<').next().unwrap_or(full);
    let ident = base.rsplit("::").next().unwrap_or(base);
    to_snake_case(ident)
}

/// A named handler ready for registration
pub struct MethodDef {
    name: String,
    handler: Box<dyn Handler>,
}

impl MethodDef {
    /// Pair a name with a handler
    pub fn new(name: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Definition for an [`RpcMethod`]
    pub fn of<M: RpcMethod>() -> Self {
        Self::new(M::name(), method_handler::<M>())
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn Handler>) {
        (self.name, self.handler)
    }
}

impl std::fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDef").field("name", &self.name).finish()
    }
}
