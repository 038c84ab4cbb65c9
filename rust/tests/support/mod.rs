#![allow(dead_code)]

//! In-process league API for integration tests.
//!
//! Serves the REST surface the core polls on its own tokio runtime and records every hit so
//! tests can assert on request counts, bodies, and headers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Default)]
pub struct MockState {
    pub messages: Mutex<HashMap<u64, Vec<Value>>>,
    pub notifications: Mutex<Vec<Value>>,
    pub friend_requests: Mutex<Vec<Value>>,
    /// Delay applied to `GET notifications/` before responding.
    pub notifications_delay: Mutex<Duration>,
    /// Non-200 status forced on `GET notifications/`.
    pub notifications_status: Mutex<Option<u16>>,
    pub send_status: Mutex<Option<u16>>,
    hits: Mutex<HashMap<&'static str, usize>>,
    pub requests: Mutex<Vec<(String, Value)>>,
    pub auth_headers: Mutex<Vec<String>>,
    next_message_id: AtomicU64,
}

impl MockState {
    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    fn hit(&self, route: &'static str, headers: &HeaderMap) {
        *self.hits.lock().unwrap().entry(route).or_default() += 1;
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.auth_headers.lock().unwrap().push(auth.to_string());
        }
    }

    fn record(&self, path: String, body: Value) {
        self.requests.lock().unwrap().push((path, body));
    }

    pub fn recorded(&self, path: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

pub struct MockApi {
    pub base_url: String,
    pub state: Arc<MockState>,
    _runtime: tokio::runtime::Runtime,
}

impl MockApi {
    pub fn start() -> Self {
        let state = Arc::new(MockState {
            next_message_id: AtomicU64::new(1000),
            ..Default::default()
        });
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("mock runtime");

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind mock api");
        listener.set_nonblocking(true).expect("nonblocking");
        let addr = listener.local_addr().expect("local addr");

        let app = Router::new()
            .route("/api/leagues/:id/chat/messages", get(list_messages))
            .route("/api/leagues/:id/chat/send/", post(send_message))
            .route("/api/notifications/", get(list_notifications))
            .route("/api/notifications/mark-read/", post(mark_read))
            .route("/api/friend-requests/", get(list_friend_requests))
            .route("/api/friend-request/:id/handle/", post(handle_friend_request))
            .route("/api/league-invites/:id/handle/", post(handle_league_invite))
            .with_state(state.clone());

        runtime.spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
            _runtime: runtime,
        }
    }

    pub fn write_config(&self, data_dir: &std::path::Path, extra: Value) {
        let mut cfg = json!({
            "api_base_url": self.base_url,
            "message_poll_interval_ms": 60_000,
            "notification_poll_interval_ms": 60_000,
            "request_timeout_ms": 5_000,
        });
        if let (Some(cfg), Some(extra)) = (cfg.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                cfg.insert(k.clone(), v.clone());
            }
        }
        std::fs::write(
            data_dir.join("roster_config.json"),
            serde_json::to_vec(&cfg).unwrap(),
        )
        .unwrap();
    }
}

pub fn user(id: u64, username: &str) -> Value {
    json!({ "id": id, "username": username })
}

pub fn chat_message(id: u64, sender: Value, content: &str) -> Value {
    json!({
        "id": id,
        "sender": sender,
        "content": content,
        "timestamp": "2024-03-05T14:07:00Z",
    })
}

pub fn wait_until(what: &str, timeout: Duration, mut f: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("{what}: condition not met within {timeout:?}");
}

fn status(code: u16) -> Response {
    StatusCode::from_u16(code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

async fn list_messages(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    state.hit("messages", &headers);
    let list = state
        .messages
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .unwrap_or_default();
    Json(Value::Array(list)).into_response()
}

async fn send_message(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("send", &headers);
    state.record(format!("leagues/{id}/chat/send/"), body.clone());
    if let Some(code) = *state.send_status.lock().unwrap() {
        return status(code);
    }
    let content = body["content"].as_str().unwrap_or_default().to_string();
    let message_id = state.next_message_id.fetch_add(1, Ordering::SeqCst);
    let created = chat_message(message_id, user(9, "me"), &content);
    state
        .messages
        .lock()
        .unwrap()
        .entry(id)
        .or_default()
        .push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn list_notifications(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.hit("notifications", &headers);
    let delay = *state.notifications_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if let Some(code) = *state.notifications_status.lock().unwrap() {
        return status(code);
    }
    let list = state.notifications.lock().unwrap().clone();
    Json(Value::Array(list)).into_response()
}

async fn mark_read(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.hit("mark_read", &headers);
    for n in state.notifications.lock().unwrap().iter_mut() {
        n["is_read"] = Value::Bool(true);
    }
    Json(json!({ "status": "ok" })).into_response()
}

async fn list_friend_requests(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.hit("friend_requests", &headers);
    let list = state.friend_requests.lock().unwrap().clone();
    Json(json!({ "requests": list })).into_response()
}

async fn handle_friend_request(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("friend_request_handle", &headers);
    state.record(format!("friend-request/{id}/handle/"), body);
    state
        .friend_requests
        .lock()
        .unwrap()
        .retain(|r| r["id"].as_u64() != Some(id));
    Json(json!({ "status": "ok" })).into_response()
}

async fn handle_league_invite(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit("league_invite_handle", &headers);
    state.record(format!("league-invites/{id}/handle/"), body);
    state
        .notifications
        .lock()
        .unwrap()
        .retain(|n| n["reference_id"].as_u64() != Some(id));
    Json(json!({ "status": "ok" })).into_response()
}
