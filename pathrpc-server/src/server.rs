//! HTTP/1.1 server
//!
//! Serves an [`App`] with hyper. Every accepted TCP connection runs in its
//! own task. Request bodies are read fully, bounded by
//! [`ServerConfig::max_body_size`], and handed to [`App::dispatch`]; the
//! rendered response goes back as-is.
//!
//! A request carrying `Upgrade: websocket` on a channel route completes the
//! WebSocket handshake and the upgraded stream is given to the route through
//! [`App::connect_channel`]. Dropping a connection drops its in-flight
//! dispatch.

use crate::app::{App, InboundRequest};
use crate::builder::ServerBuilder;
use crate::channel::WebSocketChannel;
use crate::render::RenderedResponse;
use bytes::Bytes;
use http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use pathrpc_core::Result;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

/// Default request body limit: 1 MiB
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Server limits
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest accepted request body in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// HTTP server for an [`App`]
pub struct Server {
    listener: TcpListener,
    app: App,
    config: ServerConfig,
}

struct Shared {
    app: App,
    config: ServerConfig,
}

impl Server {
    /// Builder for a server
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn new(listener: TcpListener, app: App, config: ServerConfig) -> Self {
        Self {
            listener,
            app,
            config,
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The served app
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Server limits
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept connections until the listener fails
    #[tracing::instrument(skip(self), name = "server.run")]
    pub async fn run(self) -> Result<()> {
        let Server {
            listener,
            app,
            config,
        } = self;
        let shared = Arc::new(Shared { app, config });
        tracing::info!("Starting pathrpc server");

        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(peer = %peer, "Connection accepted");

            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let shared = Arc::clone(&shared);
                    async move { Ok::<_, Infallible>(shared.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .with_upgrades()
                    .await
                {
                    tracing::debug!(peer = %peer, error = %err, "Connection closed with error");
                }
            });
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Shared {
    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        if is_websocket_upgrade(req.headers()) && self.app.has_channel(&path) {
            return self.upgrade(req, path);
        }

        let (parts, body) = req.into_parts();
        let bytes = match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                return to_hyper(RenderedResponse::detail(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    json!("Request body too large"),
                ));
            }
            Err(err) => {
                tracing::debug!(error = %err, "Failed to read request body");
                return to_hyper(RenderedResponse::detail(
                    StatusCode::BAD_REQUEST,
                    json!("Failed to read request body"),
                ));
            }
        };

        let request = InboundRequest::new(parts.method, path, bytes)
            .with_query(parts.uri.query().map(str::to_string))
            .with_headers(parts.headers);
        to_hyper(self.app.dispatch(request).await)
    }

    fn upgrade(&self, mut req: Request<Incoming>, path: String) -> Response<Full<Bytes>> {
        let accept = match req.headers().get(SEC_WEBSOCKET_KEY) {
            Some(key) => derive_accept_key(key.as_bytes()),
            None => {
                return to_hyper(RenderedResponse::detail(
                    StatusCode::BAD_REQUEST,
                    json!("Missing Sec-WebSocket-Key"),
                ))
            }
        };
        let accept = match HeaderValue::from_str(&accept) {
            Ok(value) => value,
            Err(_) => {
                return to_hyper(RenderedResponse::detail(
                    StatusCode::BAD_REQUEST,
                    json!("Invalid Sec-WebSocket-Key"),
                ))
            }
        };

        let headers = req.headers().clone();
        let app = self.app.clone();
        tokio::spawn(async move {
            match hyper::upgrade::on(&mut req).await {
                Ok(upgraded) => {
                    let ws = WebSocketStream::from_raw_socket(
                        TokioIo::new(upgraded),
                        Role::Server,
                        None,
                    )
                    .await;
                    let channel = WebSocketChannel::accepted(ws);
                    if let Err(err) = app.connect_channel(&path, Box::new(channel), headers).await {
                        tracing::warn!(path = %path, error = %err, "Channel ended with error");
                    }
                }
                Err(err) => tracing::warn!(path = %path, error = %err, "WebSocket upgrade failed"),
            }
        });

        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        let headers = response.headers_mut();
        headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(SEC_WEBSOCKET_ACCEPT, accept);
        response
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

fn to_hyper(rendered: RenderedResponse) -> Response<Full<Bytes>> {
    let (status, headers, body) = rendered.into_parts();
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_websocket_upgrade(&headers));

        headers.insert(UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_websocket_upgrade(&headers));

        headers.insert(UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_websocket_upgrade(&headers));
    }

    #[test]
    fn test_to_hyper_keeps_parts() {
        let rendered = RenderedResponse::detail(StatusCode::NOT_FOUND, json!("Not Found"));
        let response = to_hyper(rendered);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "application/json");
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(ServerConfig::default().max_body_size, DEFAULT_MAX_BODY_SIZE);
    }
}
