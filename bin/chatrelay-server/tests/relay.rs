//! Relay behaviour against an in-process fake backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chatrelay_core::{StreamDecoder, StreamEvent};
use chatrelay_server::config::Config;
use chatrelay_server::routes;
use chatrelay_server::state::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

// ── Fake backend ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct Hits(AtomicUsize);

fn event_stream(body: String) -> axum::response::Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn fake_backend(hits: Arc<Hits>) -> Router {
    Router::new()
        .route(
            "/messages",
            get(|| async {
                Json(json!([
                    { "id": 1, "sender": "user", "content": "Hi, thanks for connecting!" },
                    { "id": 2, "sender": "bot", "content": "<b>Welcome</b>" },
                ]))
            }),
        )
        .route(
            "/send",
            post(|Json(body): Json<Value>| async move {
                let echo = body["content"].as_str().unwrap_or_default().to_owned();
                event_stream(format!(
                    "data: {}\n\ndata: [DONE]\n\n",
                    json!({ "content": format!("echo: {echo}") })
                ))
            }),
        )
        .route(
            "/delete/{id}",
            delete(|Path(id): Path<u64>| async move {
                event_stream(format!("data: {{\"deleted\": {id}}}\n\ndata: [DONE]\n\n"))
            }),
        )
        .route(
            "/edit/{id}",
            put(|Path(id): Path<u64>, Json(body): Json<Value>| async move {
                if id != 1 {
                    return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Message not found" })))
                        .into_response();
                }
                let updated = body["updated_content"].as_str().unwrap_or("<missing>").to_owned();
                event_stream(format!("data: {}\n\ndata: [DONE]\n\n", json!({ "content": updated })))
            }),
        )
        .layer(axum::middleware::from_fn_with_state(
            hits,
            |State(hits): State<Arc<Hits>>,
             req: Request<Body>,
             next: axum::middleware::Next| async move {
                hits.0.fetch_add(1, Ordering::SeqCst);
                next.run(req).await
            },
        ))
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn relay_with_backend() -> (Router, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let base = spawn(fake_backend(hits.clone())).await;
    let state = Arc::new(AppState::new(Config::for_backend(base)).unwrap());
    (routes::build(state), hits)
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn decode(bytes: &[u8]) -> Vec<StreamEvent> {
    let mut decoder = StreamDecoder::new();
    let mut events = decoder.push(bytes);
    events.extend(decoder.finish());
    events
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_relays_message_list() {
    let (app, _) = relay_with_backend().await;
    let resp = app
        .oneshot(Request::get("/api/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["content"], "Hi, thanks for connecting!");
}

#[tokio::test]
async fn post_relays_event_stream() {
    let (app, _) = relay_with_backend().await;
    let body = json!({ "id": 5, "sender": "user", "content": "ping" });
    let req = json_request("POST", "/api/chat", body);
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_owned();
    assert!(content_type.starts_with("text/event-stream"));
    assert!(resp.headers().contains_key("x-trace-id"));
    assert_eq!(
        decode(&body_bytes(resp).await),
        vec![StreamEvent::delta("echo: ping"), StreamEvent::Done]
    );
}

#[tokio::test]
async fn delete_relays_deleted_event() {
    let (app, _) = relay_with_backend().await;
    let resp = app
        .oneshot(Request::delete("/api/chat?id=7").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        decode(&body_bytes(resp).await),
        vec![StreamEvent::Deleted { id: chatrelay_core::MessageId(7) }, StreamEvent::Done]
    );
}

#[tokio::test]
async fn delete_without_id_is_rejected_before_backend_call() {
    let (app, hits) = relay_with_backend().await;
    let resp = app
        .oneshot(Request::delete("/api/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await, json!({ "error": "Message ID is required." }));
    assert_eq!(hits.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn put_forwards_content_as_updated_content() {
    let (app, _) = relay_with_backend().await;
    let req = json_request("PUT", "/api/chat?id=1", json!({ "content": "reworded" }));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        decode(&body_bytes(resp).await),
        vec![StreamEvent::delta("reworded"), StreamEvent::Done]
    );
}

#[tokio::test]
async fn backend_error_status_becomes_uniform_500() {
    let (app, hits) = relay_with_backend().await;
    let req = json_request("PUT", "/api/chat?id=99", json!({ "content": "x" }));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await, json!({ "error": "Failed to edit message in the backend." }));
    assert_eq!(hits.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_backend_becomes_uniform_500() {
    let state = Arc::new(AppState::new(Config::for_backend("http://127.0.0.1:9")).unwrap());
    let resp = routes::build(state)
        .oneshot(Request::get("/api/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(resp).await,
        json!({ "error": "Failed to fetch messages from the backend." })
    );
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let (app, hits) = relay_with_backend().await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await, json!({ "error": "Failed to send message to the backend." }));
    assert_eq!(hits.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn edit_without_content_uses_the_edit_error_message() {
    let (app, hits) = relay_with_backend().await;
    let req = json_request("PUT", "/api/chat?id=1", json!({ "text": "wrong field" }));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await, json!({ "error": "Failed to edit message in the backend." }));
    assert_eq!(hits.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn widget_renders_backend_history_with_context_palette() {
    let (app, _) = relay_with_backend().await;
    let resp = app
        .oneshot(Request::get("/widget?context=Campaign").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(html.contains("Hi, thanks for connecting!"));
    assert!(html.contains("&lt;b&gt;Welcome"));
    assert!(html.contains("text-yellow-600"));
}

#[tokio::test]
async fn health_does_not_touch_backend() {
    let (app, hits) = relay_with_backend().await;
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
    assert_eq!(hits.0.load(Ordering::SeqCst), 0);
}
