//! JSON-RPC route groups
//!
//! An [`RpcRouter`] is a POST-only group of method routes plus the envelope
//! endpoint at `/`. Every method registered on it is reachable two ways once
//! the router is mounted on an [`App`](crate::App) under some prefix:
//!
//! - `POST {prefix}/{name}` with the params object as body (direct call)
//! - `POST {prefix}/` with a JSON-RPC Request naming the method (envelope call)
//!
//! Setup mistakes are reported when the route is added, never at call time.
//!
//! # Examples
//!
//! ```rust
//! use pathrpc_server::{from_fn, RpcRouter};
//!
//! let router = RpcRouter::new()
//!     .method("ping", from_fn(|_| async { Ok(serde_json::json!("pong")) }))?
//!     .post("/echo", from_fn(|params| async move { Ok(params) }))?;
//!
//! assert_eq!(router.registry().names(), vec!["echo", "ping"]);
//! # Ok::<(), pathrpc_core::Error>(())
//! ```

use crate::channel::ChannelHandler;
use crate::handler::{Handler, MethodDef, RpcMethod};
use crate::registry::MethodRegistry;
use http::Method;
use pathrpc_core::{Error, Result};
use std::sync::Arc;

/// Path of the envelope endpoint inside a router
pub const ENTRYPOINT_PATH: &str = "/";

/// A channel route declared on a router
#[derive(Clone)]
pub(crate) struct ChannelRoute {
    pub(crate) path: String,
    pub(crate) handler: Arc<dyn ChannelHandler>,
}

/// POST-only group of JSON-RPC methods
#[derive(Clone, Default)]
pub struct RpcRouter {
    registry: MethodRegistry,
    channels: Vec<ChannelRoute>,
}

impl RpcRouter {
    /// Router holding only the envelope endpoint
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method by name
    pub fn method(mut self, name: impl Into<String>, handler: Box<dyn Handler>) -> Result<Self> {
        let name = name.into();
        let path = format!("/{}", name);
        if self.channels.iter().any(|c| c.path == path) {
            return Err(Error::Config(format!("Route '{}' already registered", path)));
        }
        self.registry.register(name, Arc::from(handler))?;
        Ok(self)
    }

    /// Register a method by path; the name is the path without its `/`
    pub fn post(self, path: &str, handler: Box<dyn Handler>) -> Result<Self> {
        if path == ENTRYPOINT_PATH {
            return Err(Error::Config("Not allow root.".to_string()));
        }
        let name = path
            .strip_prefix('/')
            .ok_or_else(|| Error::Config(format!("Path '{}' must start with '/'", path)))?;
        self.method(name, handler)
    }

    /// Register a route with an explicit verb; only POST is accepted
    pub fn route(self, verb: Method, path: &str, handler: Box<dyn Handler>) -> Result<Self> {
        if verb != Method::POST {
            return Err(Error::Config(
                "Only POST methods are allowed in JSON RPC.".to_string(),
            ));
        }
        self.post(path, handler)
    }

    /// Register an [`RpcMethod`] under its derived name
    pub fn rpc_method<M: RpcMethod>(self) -> Result<Self> {
        self.register_def(MethodDef::of::<M>())
    }

    /// Register a prepared definition, as produced by `#[method]`
    pub fn register_def(self, def: MethodDef) -> Result<Self> {
        let (name, handler) = def.into_parts();
        self.method(name, handler)
    }

    /// Register a channel route; its sessions post to this router's envelope endpoint
    pub fn channel(mut self, path: &str, handler: Box<dyn ChannelHandler>) -> Result<Self> {
        if path == ENTRYPOINT_PATH {
            return Err(Error::Config("Not allow root.".to_string()));
        }
        let name = path
            .strip_prefix('/')
            .ok_or_else(|| Error::Config(format!("Path '{}' must start with '/'", path)))?;
        if self.registry.contains(name) || self.channels.iter().any(|c| c.path == path) {
            return Err(Error::Config(format!("Route '{}' already registered", path)));
        }
        self.channels.push(ChannelRoute {
            path: path.to_string(),
            handler: Arc::from(handler),
        });
        Ok(self)
    }

    /// Nesting RPC routers is not supported; always fails
    pub fn include_router(self, _router: RpcRouter) -> Result<Self> {
        Err(Error::Config(
            "Nested JSON RPC routers are not supported".to_string(),
        ))
    }

    /// The method table
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub(crate) fn channels(&self) -> &[ChannelRoute] {
        &self.channels
    }
}

impl std::fmt::Debug for RpcRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels: Vec<&str> = self.channels.iter().map(|c| c.path.as_str()).collect();
        f.debug_struct("RpcRouter")
            .field("registry", &self.registry)
            .field("channels", &channels)
            .finish()
    }
}
