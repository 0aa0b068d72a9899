//! JSON-RPC echo server
//!
//! Serves the same methods directly and through the envelope endpoint, plus
//! a WebSocket channel answering JSON-RPC frames.
//!
//! Run with: cargo run --example jsonrpc_echo
//!
//! Then try:
//!
//! ```text
//! curl -s localhost:9020/echo -d '{"msg":"hello!!!"}'
//! curl -s localhost:9020/ -d '{"jsonrpc":"2.0","method":"echo","params":{"msg":"hello!!!"},"id":1}'
//! curl -s localhost:9020/ -d '{"jsonrpc":"2.0","method":"boom","params":{}}'
//! curl -s localhost:9020/ -d '{"jsonrpc":"2.0","method":"rpc_error","params":{}}'
//! ```

use pathrpc::core::ApplicationError;
use pathrpc::method;
use pathrpc::server::{channel_fn, CallContext, HandlerError, RpcMethod};
use pathrpc::{App, RpcRouter, Server};
use serde::Deserialize;

const YOUR_APP_ERROR: ApplicationError =
    ApplicationError::declare(-32001, "Application exception.");

#[derive(Deserialize)]
struct EchoParams {
    msg: String,
}

#[method]
async fn echo(params: EchoParams) -> Result<String, HandlerError> {
    tracing::info!(msg = %params.msg, "Echo");
    Ok(params.msg)
}

#[method]
async fn boom() -> Result<(), HandlerError> {
    Err(HandlerError::internal("_"))
}

#[method]
async fn rpc_error() -> Result<(), HandlerError> {
    Err(YOUR_APP_ERROR.with_data("_").into())
}

/// Counter kept in the channel's state bag
#[derive(Deserialize)]
struct UpdateState {
    #[serde(default = "one")]
    step: i64,
}

fn one() -> i64 {
    1
}

#[async_trait::async_trait]
impl RpcMethod for UpdateState {
    type Output = i64;

    async fn call(self, ctx: CallContext) -> Result<i64, HandlerError> {
        let count = ctx
            .state()
            .update(|bag| {
                let next = bag.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + self.step;
                bag.insert("count".into(), next.into());
                next
            })
            .await;
        Ok(count)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let rpc = RpcRouter::new()
        .register_def(echo())?
        .register_def(boom())?
        .register_def(rpc_error())?
        .rpc_method::<UpdateState>()?
        .channel(
            "/ws",
            channel_fn(|mut session| async move {
                session.accept().await?;
                session.serve().await
            }),
        )?;

    let server = Server::builder()
        .bind_str("127.0.0.1:9020")?
        .app(App::new().mount("", rpc)?)
        .service_name("jsonrpc-echo")
        .build()
        .await?;

    println!("JSON-RPC server running on http://127.0.0.1:9020");
    println!("Envelope endpoint: POST /");
    println!("WebSocket channel: ws://127.0.0.1:9020/ws");

    server.run().await?;
    Ok(())
}
