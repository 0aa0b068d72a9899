//! Persistent channels and the channel RPC bridge
//!
//! A [`Channel`] is any bidirectional text-frame transport. Two are provided:
//! [`WebSocketChannel`] over any async byte stream (tokio-tungstenite) and
//! [`MemoryChannel`], an in-process pair used by tests and embedders.
//!
//! A channel route (see [`RpcRouter::channel`](crate::RpcRouter::channel))
//! hands each connection to its [`ChannelHandler`] as a [`ChannelSession`].
//! The session knows the envelope endpoint of the router that owns the route
//! and posts JSON-RPC messages to it through a [`LocalClient`], so calls made
//! over a channel run the same pipeline as HTTP calls. All calls of one
//! session share one [`State`] bag and run one at a time.
//!
//! # Examples
//!
//! ```rust
//! use pathrpc_server::{channel_fn, from_fn, RpcRouter};
//!
//! let router = RpcRouter::new()
//!     .method("echo", from_fn(|params| async move { Ok(params["msg"].clone()) }))?
//!     .channel("/ws", channel_fn(|mut session| async move {
//!         session.accept().await?;
//!         session.serve().await
//!     }))?;
//! # Ok::<(), pathrpc_core::Error>(())
//! ```

use crate::local::LocalClient;
use crate::state::State;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use http::Method;
use pathrpc_core::{codec, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

/// A bidirectional text-frame transport
#[async_trait]
pub trait Channel: Send {
    /// Complete the opening handshake
    async fn accept(&mut self) -> Result<()>;

    /// Next text frame, `None` once the peer has closed
    ///
    /// Implementations must be cancel safe: a frame is either returned or
    /// left for the next call.
    async fn receive_text(&mut self) -> Result<Option<String>>;

    /// Send a text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;
}

fn ws_error(err: tungstenite::Error) -> Error {
    Error::WebSocket(err.to_string())
}

enum WsState<S> {
    Pending(S),
    Open(WebSocketStream<S>),
    Closed,
}

/// WebSocket channel over any async stream
pub struct WebSocketChannel<S> {
    state: WsState<S>,
}

impl<S> WebSocketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Raw stream; `accept` performs the server handshake
    pub fn pending(stream: S) -> Self {
        Self {
            state: WsState::Pending(stream),
        }
    }

    /// Stream that already completed its handshake (e.g. after an HTTP upgrade)
    pub fn accepted(ws: WebSocketStream<S>) -> Self {
        Self {
            state: WsState::Open(ws),
        }
    }
}

#[async_trait]
impl<S> Channel for WebSocketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn accept(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, WsState::Closed) {
            WsState::Pending(stream) => {
                let ws = tokio_tungstenite::accept_async(stream)
                    .await
                    .map_err(ws_error)?;
                self.state = WsState::Open(ws);
                Ok(())
            }
            open @ WsState::Open(_) => {
                self.state = open;
                Ok(())
            }
            WsState::Closed => Err(Error::ConnectionClosed),
        }
    }

    async fn receive_text(&mut self) -> Result<Option<String>> {
        let WsState::Open(ws) = &mut self.state else {
            return Err(Error::ConnectionClosed);
        };

        let text = loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => break Some(text),
                Some(Ok(Message::Binary(bytes))) => {
                    let text = String::from_utf8(bytes)
                        .map_err(|e| Error::WebSocket(e.to_string()))?;
                    break Some(text);
                }
                Some(Ok(Message::Close(_))) | None => break None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ws_error(e)),
            }
        };

        if text.is_none() {
            self.state = WsState::Closed;
        }
        Ok(text)
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        match &mut self.state {
            WsState::Open(ws) => ws.send(Message::Text(text)).await.map_err(ws_error),
            _ => Err(Error::ConnectionClosed),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let result = match &mut self.state {
            WsState::Open(ws) => match ws.close(None).await {
                Ok(())
                | Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
                Err(e) => Err(ws_error(e)),
            },
            _ => Ok(()),
        };
        self.state = WsState::Closed;
        result
    }
}

/// One end of an in-process channel pair
#[derive(Debug)]
pub struct MemoryChannel {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryChannel {
    /// Two connected ends; what one sends the other receives
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            MemoryChannel {
                tx: Some(a_tx),
                rx: a_rx,
            },
            MemoryChannel {
                tx: Some(b_tx),
                rx: b_rx,
            },
        )
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn accept(&mut self) -> Result<()> {
        if self.tx.is_none() {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    async fn receive_text(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::ConnectionClosed)?;
        tx.send(text).map_err(|_| Error::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the sender ends the peer's receive loop.
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

/// Boxed future returned by channel handlers
pub type ChannelFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Runs one channel connection
pub trait ChannelHandler: Send + Sync {
    /// Drive the session until it ends
    fn run(&self, session: ChannelSession) -> ChannelFuture;
}

struct FnChannelHandler<F> {
    func: F,
}

impl<F, Fut> ChannelHandler for FnChannelHandler<F>
where
    F: Fn(ChannelSession) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn run(&self, session: ChannelSession) -> ChannelFuture {
        Box::pin((self.func)(session))
    }
}

/// Channel handler from an async closure
pub fn channel_fn<F, Fut>(func: F) -> Box<dyn ChannelHandler>
where
    F: Fn(ChannelSession) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(FnChannelHandler { func })
}

/// A live channel bound to a router's envelope endpoint
pub struct ChannelSession {
    channel: Box<dyn Channel>,
    client: LocalClient,
    entrypoint: String,
    path: String,
}

impl ChannelSession {
    pub(crate) fn new(
        channel: Box<dyn Channel>,
        client: LocalClient,
        entrypoint: String,
        path: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            client,
            entrypoint,
            path: path.into(),
        }
    }

    /// Accept the connection
    pub async fn accept(&mut self) -> Result<()> {
        self.channel.accept().await
    }

    /// Full path of the envelope endpoint calls are posted to
    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    /// Path of the channel route
    pub fn path(&self) -> &str {
        &self.path
    }

    /// State bag shared by every call of this session
    pub fn state(&self) -> &State {
        self.client.state()
    }

    /// Dispatch a JSON-RPC message and return the decoded response
    pub async fn post(&mut self, message: &Value) -> Result<Value> {
        let body = codec::encode(message)?;
        post_envelope(&self.client, &self.entrypoint, body).await
    }

    /// Dispatch raw text as an envelope body
    ///
    /// The text does not have to be valid JSON; malformed input yields the
    /// matching Error Response.
    pub async fn post_text(&mut self, text: String) -> Result<Value> {
        post_envelope(&self.client, &self.entrypoint, text.into_bytes()).await
    }

    /// Read one frame, dispatch it and return the response without sending it
    ///
    /// `None` once the peer has closed.
    pub async fn receive_and_respond(&mut self) -> Result<Option<Value>> {
        match self.channel.receive_text().await? {
            Some(text) => {
                tracing::debug!(path = %self.path, len = text.len(), "Channel frame received");
                post_envelope(&self.client, &self.entrypoint, text.into_bytes())
                    .await
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    /// Next inbound text frame, `None` once the peer has closed
    ///
    /// Cancel safe: dropping the future before it completes loses no frame,
    /// so it can sit in a `tokio::select!` next to a timer that pushes
    /// server-initiated calls with [`post`](Self::post). Answer a frame with
    /// [`post_text`](Self::post_text).
    ///
    /// ```rust,no_run
    /// use pathrpc_server::channel_fn;
    /// use std::time::Duration;
    ///
    /// let handler = channel_fn(|mut session| async move {
    ///     session.accept().await?;
    ///     let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ///     loop {
    ///         tokio::select! {
    ///             frame = session.receive_text() => match frame? {
    ///                 Some(text) => {
    ///                     let response = session.post_text(text).await?;
    ///                     session.send_json(&response).await?;
    ///                 }
    ///                 None => return Ok(()),
    ///             },
    ///             _ = ticker.tick() => {
    ///                 let call = serde_json::json!({"jsonrpc": "2.0", "method": "ping", "id": 0});
    ///                 let response = session.post(&call).await?;
    ///                 session.send_json(&response).await?;
    ///             }
    ///         }
    ///     }
    /// });
    /// ```
    pub async fn receive_text(&mut self) -> Result<Option<String>> {
        self.channel.receive_text().await
    }

    /// Send a text frame
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.channel.send_text(text).await
    }

    /// Send a value as a JSON text frame
    pub async fn send_json<T: Serialize + Sync>(&mut self, value: &T) -> Result<()> {
        let text = codec::encode_string(value)?;
        self.channel.send_text(text).await
    }

    /// Receive a JSON text frame
    pub async fn receive_json<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.channel.receive_text().await? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Answer every inbound frame until the peer closes
    pub async fn serve(&mut self) -> Result<()> {
        while let Some(response) = self.receive_and_respond().await? {
            self.send_json(&response).await?;
        }
        tracing::debug!(path = %self.path, "Channel peer closed");
        Ok(())
    }

    /// Close the channel
    pub async fn close(&mut self) -> Result<()> {
        self.channel.close().await
    }
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("path", &self.path)
            .field("entrypoint", &self.entrypoint)
            .finish_non_exhaustive()
    }
}

async fn post_envelope(client: &LocalClient, entrypoint: &str, body: Vec<u8>) -> Result<Value> {
    let response = client.request(Method::POST, entrypoint, body).await?;
    response.json_body()
}
