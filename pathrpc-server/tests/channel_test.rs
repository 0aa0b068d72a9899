//! Channel bridge tests over in-memory channels

use async_trait::async_trait;
use http::HeaderMap;
use pathrpc_core::Error;
use pathrpc_server::{
    channel_fn, from_typed_fn, App, CallContext, Channel, HandlerError, MemoryChannel, RpcMethod,
    RpcRouter,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::task::JoinHandle;

const PUSHED_CALLS: i64 = 3;

#[derive(Deserialize)]
struct Echo {
    msg: String,
}

#[derive(Deserialize)]
struct Counter {}

#[async_trait]
impl RpcMethod for Counter {
    type Output = i64;

    async fn call(self, ctx: CallContext) -> Result<i64, HandlerError> {
        Ok(ctx
            .state()
            .update(|bag| {
                let next = bag.get("n").and_then(Value::as_i64).unwrap_or(0) + 1;
                bag.insert("n".into(), json!(next));
                next
            })
            .await)
    }
}

fn app() -> App {
    let rpc = RpcRouter::new()
        .method(
            "echo",
            from_typed_fn(|p: Echo| async move { Ok::<_, HandlerError>(p.msg) }),
        )
        .unwrap()
        .rpc_method::<Counter>()
        .unwrap()
        .channel(
            "/ws",
            channel_fn(|mut session| async move {
                session.accept().await?;
                session.serve().await
            }),
        )
        .unwrap()
        .channel(
            "/once",
            channel_fn(|mut session| async move {
                session.accept().await?;
                let request = json!({
                    "jsonrpc": "2.0",
                    "method": "echo",
                    "params": {"msg": session.path()},
                    "id": 0
                });
                let response = session.post(&request).await?;
                session.send_json(&response).await?;
                session.close().await
            }),
        )
        .unwrap()
        .channel(
            "/push",
            channel_fn(|mut session| async move {
                session.accept().await?;
                let mut ticker = tokio::time::interval(Duration::from_millis(5));
                let mut pushed = 0;
                loop {
                    tokio::select! {
                        frame = session.receive_text() => match frame? {
                            Some(text) => {
                                let response = session.post_text(text).await?;
                                session.send_json(&response).await?;
                            }
                            None => return Ok(()),
                        },
                        _ = ticker.tick(), if pushed < PUSHED_CALLS => {
                            pushed += 1;
                            let request = json!({
                                "jsonrpc": "2.0",
                                "method": "echo",
                                "params": {"msg": "tick"},
                                "id": pushed
                            });
                            let response = session.post(&request).await?;
                            session.send_json(&response).await?;
                        }
                    }
                }
            }),
        )
        .unwrap();

    App::new().mount("/rpc", rpc).unwrap()
}

fn connect(app: &App, path: &'static str) -> (MemoryChannel, JoinHandle<pathrpc_core::Result<()>>) {
    let (server_end, client_end) = MemoryChannel::pair();
    let app = app.clone();
    let task = tokio::spawn(async move {
        app.connect_channel(path, Box::new(server_end), HeaderMap::new())
            .await
    });
    (client_end, task)
}

async fn round_trip(peer: &mut MemoryChannel, text: &str) -> Value {
    peer.send_text(text.to_string()).await.unwrap();
    let reply = peer.receive_text().await.unwrap().unwrap();
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn test_serve_answers_each_frame() {
    let app = app();
    let (mut peer, task) = connect(&app, "/rpc/ws");

    for id in 1..=3 {
        let request = json!({"jsonrpc": "2.0", "method": "echo", "params": {"msg": format!("m{id}")}, "id": id});
        let reply = round_trip(&mut peer, &request.to_string()).await;
        assert_eq!(reply, json!({"jsonrpc": "2.0", "result": format!("m{id}"), "id": id}));
    }

    peer.close().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_frames_get_error_responses() {
    let app = app();
    let (mut peer, task) = connect(&app, "/rpc/ws");

    let cases = [
        ("", -32700, Value::Null),
        ("a", -32700, Value::Null),
        ("1", -32600, Value::Null),
        ("null", -32600, Value::Null),
        ("{}", -32600, Value::Null),
        (r#"{"jsonrpc":"2.0","method":"missing","id":4}"#, -32601, json!(4)),
        (r#"{"jsonrpc":"2.0","method":"echo","params":{},"id":5}"#, -32602, json!(5)),
    ];
    for (frame, code, id) in cases {
        let reply = round_trip(&mut peer, frame).await;
        assert_eq!(reply["error"]["code"], code, "frame {:?}", frame);
        assert_eq!(reply["id"], id, "frame {:?}", frame);
    }

    // The session survives bad frames
    let reply = round_trip(
        &mut peer,
        r#"{"jsonrpc":"2.0","method":"echo","params":{"msg":"still here"},"id":6}"#,
    )
    .await;
    assert_eq!(reply["result"], "still here");

    peer.close().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_state_lives_for_the_session() {
    let app = app();
    let call = r#"{"jsonrpc":"2.0","method":"counter","id":1}"#;

    let (mut first, first_task) = connect(&app, "/rpc/ws");
    assert_eq!(round_trip(&mut first, call).await["result"], 1);
    assert_eq!(round_trip(&mut first, call).await["result"], 2);

    let (mut second, second_task) = connect(&app, "/rpc/ws");
    assert_eq!(round_trip(&mut second, call).await["result"], 1);
    assert_eq!(round_trip(&mut first, call).await["result"], 3);

    first.close().await.unwrap();
    second.close().await.unwrap();
    first_task.await.unwrap().unwrap();
    second_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_notification_still_answered() {
    let app = app();
    let (mut peer, task) = connect(&app, "/rpc/ws");

    let reply = round_trip(
        &mut peer,
        r#"{"jsonrpc":"2.0","method":"echo","params":{"msg":"n"}}"#,
    )
    .await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": "n", "id": null}));

    peer.close().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_session_posts_and_closes() {
    let app = app();
    let (mut peer, task) = connect(&app, "/rpc/once");

    let reply: Value = serde_json::from_str(&peer.receive_text().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["result"], "/rpc/once");
    assert_eq!(peer.receive_text().await.unwrap(), None);

    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_push_alongside_requests() {
    let app = app();
    let (mut peer, task) = connect(&app, "/rpc/push");

    for id in [100, 101] {
        let request = json!({"jsonrpc": "2.0", "method": "echo", "params": {"msg": "asked"}, "id": id});
        peer.send_text(request.to_string()).await.unwrap();
    }

    let mut pushed = BTreeSet::new();
    let mut answered = BTreeSet::new();
    while pushed.len() < PUSHED_CALLS as usize || answered.len() < 2 {
        let frame = peer.receive_text().await.unwrap().unwrap();
        let reply: Value = serde_json::from_str(&frame).unwrap();
        let id = reply["id"].as_i64().unwrap();
        match reply["result"].as_str().unwrap() {
            "tick" => assert!(pushed.insert(id)),
            "asked" => assert!(answered.insert(id)),
            other => panic!("unexpected result {other}"),
        }
    }

    assert_eq!(pushed.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(answered.into_iter().collect::<Vec<_>>(), vec![100, 101]);

    peer.close().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_channel_path() {
    let app = app();
    let (mut peer, task) = connect(&app, "/rpc/nope");

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::NotFound(path) if path == "/rpc/nope"));
    assert_eq!(peer.receive_text().await.unwrap(), None);
}
