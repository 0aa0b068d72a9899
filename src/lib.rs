//! pathrpc - JSON-RPC 2.0 over a path-based HTTP dispatcher
//!
//! This is the convenience crate re-exporting the pathrpc sub-crates.
//!
//! # Architecture
//!
//! - **pathrpc-core**: error taxonomy, message model, classification,
//!   validation detail, observability setup
//! - **pathrpc-server**: routers, host dispatcher, envelope engine, deferred
//!   rendering, in-process transport, channels, hyper server
//! - **pathrpc-macros**: `#[method]` for declaring methods as async fns
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pathrpc::server::{from_typed_fn, App, HandlerError, RpcRouter};
//! use pathrpc::Server;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i32, b: i32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rpc = RpcRouter::new()
//!         .method("add", from_typed_fn(|p: AddParams| async move {
//!             Ok::<_, HandlerError>(p.a + p.b)
//!         }))?;
//!
//!     let server = Server::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .app(App::new().mount("/rpc", rpc)?)
//!         .build()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # In-Process Calls
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use pathrpc::server::{from_fn, App, LocalClient, RpcRouter};
//! use http::Method;
//!
//! let rpc = RpcRouter::new()
//!     .method("ping", from_fn(|_| async { Ok(serde_json::json!("pong")) }))
//!     .unwrap();
//! let client = LocalClient::new(App::new().mount("", rpc).unwrap());
//!
//! let response = client
//!     .request(Method::POST, "/", r#"{"jsonrpc":"2.0","method":"ping","id":7}"#)
//!     .await
//!     .unwrap();
//! assert_eq!(response.text(), r#"{"jsonrpc":"2.0","result":"pong","id":7}"#);
//! # });
//! ```

pub use pathrpc_core as core;
pub use pathrpc_macros as macros;
pub use pathrpc_server as server;

pub use pathrpc_macros::method;
pub use pathrpc_server::{App, RpcRouter, Server};
