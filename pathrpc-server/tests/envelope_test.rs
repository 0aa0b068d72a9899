//! Envelope endpoint integration tests

use http::header::SET_COOKIE;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use pathrpc_core::{ApplicationError, ErrorKind, Response, RpcError};
use pathrpc_server::{
    from_typed_ctx_fn, from_typed_fn, App, HandlerError, LocalClient, RenderedResponse, Reply,
    RpcRouter,
};
use serde::Deserialize;
use serde_json::{json, Value};

const YOUR_APP_ERROR: ApplicationError =
    ApplicationError::declare(-32001, "Application exception.");

#[derive(Deserialize)]
struct Echo {
    msg: String,
}

#[derive(Deserialize)]
struct Empty {}

fn client() -> LocalClient {
    let rpc = RpcRouter::new()
        .method(
            "echo",
            from_typed_fn(|p: Echo| async move { Ok::<_, HandlerError>(p.msg) }),
        )
        .unwrap()
        .method(
            "boom",
            from_typed_fn(|_: Empty| async { Err::<(), _>(HandlerError::internal("_")) }),
        )
        .unwrap()
        .method(
            "rpc_error",
            from_typed_fn(|_: Empty| async { Err::<(), _>(YOUR_APP_ERROR.with_data("_")) }),
        )
        .unwrap()
        .method(
            "leaky",
            from_typed_fn(|_: Empty| async {
                Err::<(), _>(RpcError::internal_error().with_data("db password=hunter2"))
            }),
        )
        .unwrap()
        .method(
            "decorated",
            from_typed_ctx_fn(|_: Empty, _ctx| async {
                Ok(Reply::new(json!("ok"))
                    .with_status(StatusCode::CREATED)
                    .with_header(
                        HeaderName::from_static("x-trace"),
                        HeaderValue::from_static("abc"),
                    )
                    .with_cookie(HeaderValue::from_static("session=1")))
            }),
        )
        .unwrap();

    LocalClient::new(App::new().mount("", rpc).unwrap())
}

async fn post(client: &LocalClient, url: &str, body: &str) -> RenderedResponse {
    client
        .request(Method::POST, url, body.to_string())
        .await
        .unwrap()
}

async fn envelope(client: &LocalClient, body: &str) -> Value {
    let response = post(client, "/", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.json_body().unwrap()
}

#[tokio::test]
async fn test_echo_both_paths() {
    let client = client();

    let response = post(
        &client,
        "/",
        r#"{"jsonrpc":"2.0","method":"echo","params":{"msg":"hello!!!"},"id":1}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.text(),
        r#"{"jsonrpc":"2.0","result":"hello!!!","id":1}"#
    );

    let response = post(&client, "/echo", r#"{"msg":"hello!!!"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), r#""hello!!!""#);
}

#[tokio::test]
async fn test_notification_gets_null_id() {
    let body = envelope(
        &client(),
        r#"{"jsonrpc":"2.0","method":"echo","params":{"msg":"hi"}}"#,
    )
    .await;
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": "hi", "id": null}));
}

#[tokio::test]
async fn test_internal_error_hides_detail() {
    let client = client();

    let body = envelope(&client, r#"{"jsonrpc":"2.0","method":"boom","params":{}}"#).await;
    assert_eq!(
        body,
        json!({
            "jsonrpc": "2.0",
            "error": {"code": -32603, "message": "Internal Server Error.", "data": null},
            "id": null
        })
    );

    let response = post(&client, "/boom", "{}").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains('_'));
}

#[tokio::test]
async fn test_internal_error_data_is_dropped() {
    let body = envelope(
        &client(),
        r#"{"jsonrpc":"2.0","method":"leaky","params":{},"id":1}"#,
    )
    .await;
    assert_eq!(
        body,
        json!({
            "jsonrpc": "2.0",
            "error": {"code": -32603, "message": "Internal Server Error.", "data": null},
            "id": 1
        })
    );
    assert!(!body.to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_missing_version_tag_defaults() {
    let body = envelope(&client(), r#"{"method":"echo","params":{"msg":"hi"},"id":1}"#).await;
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": "hi", "id": 1}));
}

#[tokio::test]
async fn test_application_error_passes_through() {
    let body = envelope(
        &client(),
        r#"{"jsonrpc":"2.0","method":"rpc_error","params":{},"id":5}"#,
    )
    .await;
    assert_eq!(
        body,
        json!({
            "jsonrpc": "2.0",
            "error": {"code": -32001, "message": "Application exception.", "data": "_"},
            "id": 5
        })
    );
}

#[tokio::test]
async fn test_parse_errors() {
    let client = client();
    for raw in ["", "not json{"] {
        let body = envelope(&client, raw).await;
        assert_eq!(body["error"]["code"], -32700, "body {:?}", raw);
        assert_eq!(body["error"]["message"], "Parse error.");
        assert!(body["error"]["data"].is_string());
        assert_eq!(body["id"], Value::Null);
    }
}

#[tokio::test]
async fn test_invalid_request() {
    let client = client();

    let body = envelope(&client, "{}").await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["error"]["message"], "Invalid Request.");
    let issues = body["error"]["data"].as_array().unwrap();
    assert!(issues
        .iter()
        .any(|issue| issue["loc"] == json!(["method"]) && issue["msg"] == "field required"));

    let body = envelope(&client, "42").await;
    assert_eq!(body["error"]["code"], -32600);

    let body = envelope(&client, r#"{"jsonrpc":"1.0","method":"echo","id":1}"#).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_method_not_found() {
    let client = client();
    for method in ["", "xxx", "/", "echo/"] {
        let request = json!({"jsonrpc": "2.0", "method": method, "params": {}, "id": 3});
        let body = envelope(&client, &request.to_string()).await;
        assert_eq!(body["error"]["code"], -32601, "method {:?}", method);
        assert_eq!(body["error"]["message"], "Method not found.");
        assert_eq!(body["error"]["data"], Value::Null);
        assert_eq!(body["id"], 3);
    }
}

#[tokio::test]
async fn test_invalid_params() {
    let body = envelope(
        &client(),
        r#"{"jsonrpc":"2.0","method":"echo","params":{},"id":9}"#,
    )
    .await;
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["error"]["message"], "Invalid params.");
    assert_eq!(body["error"]["data"][0]["msg"], "field required");
    assert_eq!(body["error"]["data"][0]["loc"], json!(["body", "msg"]));
    assert_eq!(body["id"], 9);
}

#[tokio::test]
async fn test_batch_is_rejected() {
    let body = envelope(
        &client(),
        r#"[{"jsonrpc":"2.0","method":"echo","params":{"msg":"a"},"id":1},
            {"jsonrpc":"2.0","method":"echo","params":{"msg":"b"},"id":2}]"#,
    )
    .await;
    assert_eq!(
        body,
        json!({
            "jsonrpc": "2.0",
            "error": {"code": -32603, "message": "Internal Server Error.", "data": null},
            "id": null
        })
    );
}

#[tokio::test]
async fn test_single_element_batch_is_rejected() {
    let body = envelope(
        &client(),
        r#"[{"jsonrpc":"2.0","method":"echo","params":{"msg":"a"},"id":1}]"#,
    )
    .await;
    assert_eq!(body["error"]["code"], -32603);
    assert_eq!(body["error"]["data"], Value::Null);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_repeated_calls_are_identical() {
    let client = client();
    let request = r#"{"jsonrpc":"2.0","method":"echo","params":{"msg":"same"},"id":11}"#;

    let first = post(&client, "/", request).await;
    let second = post(&client, "/", request).await;
    assert_eq!(first.body(), second.body());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_reply_headers_survive_envelope() {
    let client = client();

    let response = post(
        &client,
        "/",
        r#"{"jsonrpc":"2.0","method":"decorated","params":{},"id":2}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-trace"], "abc");
    assert_eq!(response.headers()[SET_COOKIE], "session=1");
    let decoded: Response = response.json_body().unwrap();
    assert_eq!(decoded.into_result().unwrap(), json!("ok"));

    let response = post(&client, "/decorated", "").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-trace"], "abc");
}

#[tokio::test]
async fn test_error_kinds_decode() {
    let client = client();
    let response = post(&client, "/", r#"{"jsonrpc":"2.0","method":"nope","id":1}"#).await;
    let decoded: Response = response.json_body().unwrap();
    let err = decoded.into_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotFound);
}
