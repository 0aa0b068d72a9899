//! Path-based host dispatcher
//!
//! An [`App`] owns an ordered route table. Plain routes bind an HTTP verb
//! and an exact path to a handler; [`RpcRouter`]s are mounted under a
//! prefix, contributing one POST route per method, the envelope endpoint at
//! `{prefix}/` and their channel routes.
//!
//! [`App::dispatch`] is the single entry point for inbound requests, whether
//! they come from the hyper server or from a [`LocalClient`]. Envelope calls
//! re-enter the table through [`App::invoke`] at the method's own path, so
//! a handler runs the same way on both paths.
//!
//! # Examples
//!
//! ```rust
//! use http::Method;
//! use pathrpc_server::{from_fn, App, RpcRouter};
//!
//! let rpc = RpcRouter::new()
//!     .method("echo", from_fn(|params| async move { Ok(params["msg"].clone()) }))?;
//!
//! let app = App::new()
//!     .mount("/rpc", rpc)?
//!     .route(Method::GET, "/health", from_fn(|_| async { Ok(serde_json::json!("ok")) }))?;
//!
//! assert_eq!(app.route_paths(), vec!["/rpc/", "/rpc/echo", "/health"]);
//! # Ok::<(), pathrpc_core::Error>(())
//! ```

use crate::channel::{Channel, ChannelHandler, ChannelSession};
use crate::dispatch;
use crate::handler::{CallContext, Handler, HandlerError};
use crate::local::LocalClient;
use crate::metrics::ServerMetrics;
use crate::registry::MethodRegistry;
use crate::render::{PendingResponse, RenderedResponse, Transform};
use crate::router::{RpcRouter, ENTRYPOINT_PATH};
use crate::state::State;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use pathrpc_core::{Error, Result, ValidationError};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
enum Target {
    Handler(Arc<dyn Handler>),
    Entrypoint {
        prefix: String,
        registry: MethodRegistry,
    },
    Channel {
        handler: Arc<dyn ChannelHandler>,
        entrypoint: String,
    },
}

#[derive(Clone)]
struct Route {
    /// `None` for channel routes, which are not reachable by plain HTTP
    method: Option<Method>,
    path: String,
    target: Target,
}

enum Lookup<'a> {
    Found(&'a Route),
    WrongMethod,
    Missing,
}

/// Body of an inbound request
#[derive(Debug, Clone)]
pub(crate) enum Body {
    /// Bytes as received
    Raw(Bytes),
    /// Already-decoded params, used when an envelope call re-enters
    Decoded(Value),
}

impl Body {
    /// Params for the handler; an empty raw body is `{}`
    fn decode(self) -> std::result::Result<Value, HandlerError> {
        match self {
            Body::Decoded(value) => Ok(value),
            Body::Raw(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(Value::Object(Map::new()))
            }
            Body::Raw(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| HandlerError::InvalidParams(ValidationError::from_json_decode(&e))),
        }
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        match self {
            Body::Raw(bytes) => bytes,
            Body::Decoded(value) => Bytes::from(value.to_string()),
        }
    }
}

/// A request entering the dispatcher
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Body,
    state: State,
}

impl InboundRequest {
    /// Request with a raw body, no headers and a fresh state bag
    pub fn new(method: Method, path: impl Into<String>, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Body::Raw(body),
            state: State::new(),
        }
    }

    /// Set the query string
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    /// Set the headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the state bag
    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// HTTP verb
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Same request re-targeted at `path` with decoded params as body
    pub(crate) fn reroute(self, path: String, params: Value) -> Self {
        Self {
            method: Method::POST,
            path,
            body: Body::Decoded(params),
            ..self
        }
    }

    pub(crate) fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Raw(Bytes::new()))
    }
}

/// The host dispatcher
#[derive(Clone, Default)]
pub struct App {
    routes: Arc<Vec<Route>>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl App {
    /// App with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain route for any verb
    pub fn route(self, method: Method, path: &str, handler: Box<dyn Handler>) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(Error::Config(format!("Path '{}' must start with '/'", path)));
        }
        self.push(Route {
            method: Some(method),
            path: path.to_string(),
            target: Target::Handler(Arc::from(handler)),
        })
    }

    /// Mount an RPC router under `prefix` (`""` or `/segment...`, no trailing `/`)
    pub fn mount(mut self, prefix: &str, router: RpcRouter) -> Result<Self> {
        if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
            return Err(Error::Config(format!(
                "Prefix '{}' must start with '/' and must not end with '/'",
                prefix
            )));
        }

        let entrypoint = format!("{}{}", prefix, ENTRYPOINT_PATH);
        self = self.push(Route {
            method: Some(Method::POST),
            path: entrypoint.clone(),
            target: Target::Entrypoint {
                prefix: prefix.to_string(),
                registry: router.registry().clone(),
            },
        })?;

        let mut methods: Vec<_> = router.registry().iter().collect();
        methods.sort_by(|a, b| a.name().cmp(b.name()));
        for registration in methods {
            self = self.push(Route {
                method: Some(Method::POST),
                path: format!("{}{}", prefix, registration.path()),
                target: Target::Handler(registration.handler()),
            })?;
        }

        for channel in router.channels() {
            self = self.push(Route {
                method: None,
                path: format!("{}{}", prefix, channel.path),
                target: Target::Channel {
                    handler: Arc::clone(&channel.handler),
                    entrypoint: entrypoint.clone(),
                },
            })?;
        }

        Ok(self)
    }

    /// Record call metrics
    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub(crate) fn metrics(&self) -> Option<&ServerMetrics> {
        self.metrics.as_deref()
    }

    /// Full paths of every route, in registration order
    pub fn route_paths(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.path.as_str()).collect()
    }

    /// Whether `path` is a channel route
    pub fn has_channel(&self, path: &str) -> bool {
        self.channel_route(path).is_some()
    }

    fn push(mut self, route: Route) -> Result<Self> {
        let conflict = self.routes.iter().any(|existing| {
            existing.path == route.path
                && (existing.method.is_none()
                    || route.method.is_none()
                    || existing.method == route.method)
        });
        if conflict {
            return Err(Error::Config(format!(
                "Route '{}' already registered",
                route.path
            )));
        }
        Arc::make_mut(&mut self.routes).push(route);
        Ok(self)
    }

    fn find(&self, method: &Method, path: &str) -> Lookup<'_> {
        let mut path_matched = false;
        for route in self.routes.iter().filter(|r| r.path == path) {
            match &route.method {
                Some(m) if m == method => return Lookup::Found(route),
                Some(_) => path_matched = true,
                None => {}
            }
        }
        if path_matched {
            Lookup::WrongMethod
        } else {
            Lookup::Missing
        }
    }

    fn channel_route(&self, path: &str) -> Option<(&Arc<dyn ChannelHandler>, &str)> {
        self.routes.iter().find_map(|route| match &route.target {
            Target::Channel {
                handler,
                entrypoint,
            } if route.path == path => Some((handler, entrypoint.as_str())),
            _ => None,
        })
    }

    /// Dispatch a request to completion
    ///
    /// Never fails: every fault is rendered as a response. Unknown paths are
    /// 404, a known path with the wrong verb is 405.
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn dispatch(&self, request: InboundRequest) -> RenderedResponse {
        let route = match self.find(&request.method, &request.path) {
            Lookup::Found(route) => route,
            Lookup::WrongMethod => {
                return RenderedResponse::detail(
                    StatusCode::METHOD_NOT_ALLOWED,
                    json!("Method Not Allowed"),
                )
            }
            Lookup::Missing => {
                tracing::debug!("No route");
                return RenderedResponse::detail(StatusCode::NOT_FOUND, json!("Not Found"));
            }
        };

        match &route.target {
            Target::Handler(handler) => self.direct(handler.as_ref(), request).await,
            Target::Entrypoint { prefix, registry } => {
                dispatch::handle_envelope(self, prefix, registry, request).await
            }
            // Channel routes carry no verb and are never found here
            Target::Channel { .. } => {
                RenderedResponse::detail(StatusCode::NOT_FOUND, json!("Not Found"))
            }
        }
    }

    async fn direct(&self, handler: &dyn Handler, request: InboundRequest) -> RenderedResponse {
        let started = Instant::now();
        let path = request.path.clone();

        let result = match call_handler(handler, request).await {
            Ok(pending) => pending.finalize(Transform::Identity).map_err(HandlerError::from),
            Err(err) => Err(err),
        };

        let (rendered, outcome) = match result {
            Ok(rendered) => (rendered, "success"),
            Err(err) => (direct_error(err), "error"),
        };

        if let Some(metrics) = self.metrics() {
            metrics.record_call("direct", &path, outcome, started.elapsed().as_secs_f64());
        }
        rendered
    }

    /// Re-enter the route table and run the handler at the request's path
    ///
    /// The captured value is returned unrendered so the caller picks the
    /// wire shape.
    pub async fn invoke(
        &self,
        request: InboundRequest,
    ) -> std::result::Result<PendingResponse, HandlerError> {
        match self.find(&request.method, &request.path) {
            Lookup::Found(Route {
                target: Target::Handler(handler),
                ..
            }) => call_handler(handler.as_ref(), request).await,
            Lookup::Found(_) => Err(HandlerError::Internal("Already rerouting".to_string())),
            Lookup::WrongMethod | Lookup::Missing => Err(HandlerError::Internal(format!(
                "No route for rerouted path {}",
                request.path
            ))),
        }
    }

    /// Run the channel route at `path` over `channel`
    ///
    /// Calls made by the session carry `headers` and share one state bag.
    pub async fn connect_channel(
        &self,
        path: &str,
        channel: Box<dyn Channel>,
        headers: HeaderMap,
    ) -> Result<()> {
        let (handler, entrypoint) = self
            .channel_route(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;

        let client = LocalClient::new(self.clone()).with_headers(headers);
        let session = ChannelSession::new(channel, client, entrypoint.to_string(), path);

        tracing::info!(path = %path, entrypoint = %entrypoint, "Channel session started");
        if let Some(metrics) = self.metrics() {
            metrics.channel_opened();
        }

        let result = handler.run(session).await;

        if let Some(metrics) = self.metrics() {
            metrics.channel_closed();
        }
        match &result {
            Ok(()) => tracing::info!(path = %path, "Channel session ended"),
            Err(e) => tracing::warn!(path = %path, error = %e, "Channel session failed"),
        }
        result
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.route_paths())
            .finish_non_exhaustive()
    }
}

async fn call_handler(
    handler: &dyn Handler,
    request: InboundRequest,
) -> std::result::Result<PendingResponse, HandlerError> {
    let InboundRequest {
        path,
        query,
        headers,
        body,
        state,
        ..
    } = request;

    let params = body.decode()?;
    let ctx = CallContext::new(params)
        .with_path(path)
        .with_query(query)
        .with_headers(headers)
        .with_state(state);

    let reply = handler.handle(ctx).await?;
    Ok(PendingResponse::from(reply))
}

fn direct_error(err: HandlerError) -> RenderedResponse {
    match err {
        HandlerError::InvalidParams(detail) => {
            RenderedResponse::detail(StatusCode::UNPROCESSABLE_ENTITY, detail.to_value())
        }
        HandlerError::Http { status, detail } => RenderedResponse::detail(status, json!(detail)),
        HandlerError::Rpc(err) => {
            RenderedResponse::detail(StatusCode::INTERNAL_SERVER_ERROR, json!(err.to_string()))
        }
        HandlerError::Internal(message) => {
            tracing::error!(error = %message, "Handler failed");
            RenderedResponse::detail(StatusCode::INTERNAL_SERVER_ERROR, json!(message))
        }
    }
}
