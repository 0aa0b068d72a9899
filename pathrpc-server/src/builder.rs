//! Server builder
//!
//! Fluent configuration for a [`Server`]: bind address, the [`App`] to
//! serve, request body limit, observability and metrics.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pathrpc_server::{from_fn, App, RpcRouter, Server};
//!
//! # async fn example() -> pathrpc_core::Result<()> {
//! let rpc = RpcRouter::new()
//!     .method("ping", from_fn(|_| async { Ok(serde_json::json!("pong")) }))?;
//!
//! let server = Server::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .app(App::new().mount("/rpc", rpc)?)
//!     .max_body_size(64 * 1024)
//!     .with_default_observability()
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::app::App;
use crate::metrics::ServerMetrics;
use crate::server::{Server, ServerConfig};
use pathrpc_core::{Error, ObservabilityConfig, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for a [`Server`]
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    app: App,
    config: ServerConfig,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
    metrics: bool,
}

impl ServerBuilder {
    /// Builder with an empty app and default limits
    pub fn new() -> Self {
        Self {
            addr: None,
            app: App::new(),
            config: ServerConfig::default(),
            observability_config: None,
            service_name: None,
            metrics: false,
        }
    }

    /// Address to listen on
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Address to listen on, parsed from a string
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// App to serve
    pub fn app(mut self, app: App) -> Self {
        self.app = app;
        self
    }

    /// Largest accepted request body in bytes; larger bodies get 413
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Install tracing and OpenTelemetry at build time; implies metrics
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// [`with_observability`](Self::with_observability) with env-derived defaults
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name for telemetry, overriding the observability config's
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Record call and channel metrics on the global meter provider
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.metrics = enable;
        self
    }

    /// Bind the listener and assemble the server
    pub async fn build(self) -> Result<Server> {
        let addr = self
            .addr
            .ok_or_else(|| Error::Config("No bind address specified".to_string()))?;

        let mut service_name = self.service_name;
        let mut metrics_enabled = self.metrics;
        if let Some(mut config) = self.observability_config {
            if let Some(name) = &service_name {
                config.service_name = name.clone();
            }
            metrics_enabled |= config.enable_metrics;
            if service_name.is_none() {
                service_name = Some(config.service_name.clone());
            }

            pathrpc_core::init_observability(config).map_err(|e| {
                Error::Config(format!("Failed to initialize observability: {}", e))
            })?;
        }

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %addr, "Server listening");

        let mut app = self.app;
        if metrics_enabled {
            let name = service_name.unwrap_or_else(|| "pathrpc".to_string());
            app = app.with_metrics(Arc::new(ServerMetrics::new(name)));
        }

        Ok(Server::new(listener, app, self.config))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
