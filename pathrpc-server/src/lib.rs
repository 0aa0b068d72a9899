//! JSON-RPC 2.0 envelope layer over a path-based HTTP dispatcher
//!
//! Methods registered on an [`RpcRouter`] are plain POST routes: each one
//! answers at its own path with its raw result, and the router's `/`
//! endpoint additionally accepts JSON-RPC 2.0 Requests and Notifications
//! naming any of them. An envelope call is re-routed through the [`App`]'s
//! own route table to the method's path, so the handler cannot tell the two
//! apart; only the final rendering differs.
//!
//! # Core Features
//!
//! - **Dual access**: every method reachable directly and through the envelope
//! - **Error taxonomy**: handler failures map to JSON-RPC errors on the
//!   envelope path and to HTTP statuses on the direct path
//! - **Deferred rendering**: one handler execution, two wire shapes, one
//!   serialization
//! - **In-process transport**: [`LocalClient`] runs requests through the full
//!   pipeline without a socket
//! - **Channels**: WebSocket (or in-memory) sessions that post JSON-RPC
//!   messages to their router's envelope endpoint
//! - **Observability**: `tracing` spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pathrpc_server::{from_typed_fn, App, HandlerError, RpcRouter, Server};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Echo { msg: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rpc = RpcRouter::new()
//!         .method("echo", from_typed_fn(|p: Echo| async move { Ok::<_, HandlerError>(p.msg) }))?;
//!
//!     let server = Server::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .app(App::new().mount("", rpc)?)
//!         .build()
//!         .await?;
//!
//!     // POST /echo   {"msg":"hi"}                                        -> "hi"
//!     // POST /       {"jsonrpc":"2.0","method":"echo","params":{"msg":"hi"},"id":1}
//!     //                                         -> {"jsonrpc":"2.0","result":"hi","id":1}
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod app;
mod builder;
mod channel;
mod dispatch;
mod handler;
mod local;
mod metrics;
mod registry;
mod render;
mod router;
mod server;
mod state;

pub use app::{App, InboundRequest};
pub use builder::ServerBuilder;
pub use channel::{
    channel_fn, Channel, ChannelFuture, ChannelHandler, ChannelSession, MemoryChannel,
    WebSocketChannel,
};
pub use handler::{
    from_ctx_fn, from_fn, from_typed_ctx_fn, from_typed_fn, method_handler, method_name,
    AsyncHandler, CallContext, Handler, HandlerError, HandlerResult, MethodDef, Reply, RpcMethod,
};
pub use local::LocalClient;
pub use metrics::ServerMetrics;
pub use registry::{to_snake_case, MethodRegistration, MethodRegistry};
pub use render::{OutboundMessage, PendingResponse, RenderedResponse, Transform};
pub use router::{RpcRouter, ENTRYPOINT_PATH};
pub use server::{Server, ServerConfig, DEFAULT_MAX_BODY_SIZE};
pub use state::State;

#[doc(hidden)]
pub mod __private {
    pub use serde_json::Value;
}
