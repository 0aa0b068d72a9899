//! In-process transport
//!
//! [`LocalClient`] replays a method + url + body through the full
//! [`App`] dispatch path without touching the network: it builds the same
//! inbound request the HTTP server would, runs dispatch to completion and
//! collects the outbound messages in memory. Channel sessions use it to
//! post JSON-RPC messages to their router's envelope endpoint.
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use http::Method;
//! use pathrpc_server::{from_fn, App, LocalClient, OutboundMessage};
//!
//! let app = App::new()
//!     .route(Method::GET, "/hello", from_fn(|_| async { Ok(serde_json::json!("hello")) }))
//!     .unwrap();
//!
//! let messages = LocalClient::new(app).call(Method::GET, "/hello", "").await.unwrap();
//! assert_eq!(messages.len(), 2);
//! assert!(matches!(&messages[1], OutboundMessage::Body { chunk, .. } if &chunk[..] == b"\"hello\""));
//! # });
//! ```

use crate::app::{App, InboundRequest};
use crate::render::{OutboundMessage, RenderedResponse};
use crate::state::State;
use bytes::Bytes;
use http::{HeaderMap, Method};
use pathrpc_core::{Error, Result};

/// Client issuing requests straight into an [`App`]
#[derive(Clone)]
pub struct LocalClient {
    app: App,
    headers: HeaderMap,
    state: State,
}

impl LocalClient {
    /// Client with no headers and a fresh state bag
    pub fn new(app: App) -> Self {
        Self {
            app,
            headers: HeaderMap::new(),
            state: State::new(),
        }
    }

    /// Headers sent with every request
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Share a state bag across every request
    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// The state bag handed to handlers
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Run a request and collect the outbound messages
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        body: impl Into<Bytes>,
    ) -> Result<Vec<OutboundMessage>> {
        Ok(self.request(method, url, body).await?.into_messages())
    }

    /// Run a request and return the assembled response
    ///
    /// `url` must be absolute (start with `/`); anything after `?` is the
    /// query string.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: impl Into<Bytes>,
    ) -> Result<RenderedResponse> {
        if !url.starts_with('/') {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (url, None),
        };

        let request = InboundRequest::new(method, path, body.into())
            .with_query(query)
            .with_headers(self.headers.clone())
            .with_state(self.state.clone());
        Ok(self.app.dispatch(request).await)
    }
}

impl std::fmt::Debug for LocalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalClient")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
