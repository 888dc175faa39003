//! In-process stand-in for a capability-URL bucket API, served by axum on an
//! ephemeral localhost port.
//!
//! - `GET    /p/tok/n/ns/b/bucket/o/?prefix=&start=` -> paginated JSON listing
//! - `GET|PUT|DELETE /p/tok/n/ns/b/bucket/o/{key}`  -> object access
//! - `GET    /remote/{name}`                          -> arbitrary external file

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use serde_json::json;
use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

pub const BUCKET_PATH: &str = "/p/tok/n/ns/b/bucket/o/";

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

#[derive(Default)]
struct MockState {
    objects: BTreeMap<String, StoredObject>,
    put_counts: HashMap<String, usize>,
    failing_puts: HashMap<String, StatusCode>,
    failing_gets: HashMap<String, StatusCode>,
    page_size: Option<usize>,
    list_requests: usize,
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockPar {
    addr: SocketAddr,
    state: Shared,
}

impl MockPar {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route(BUCKET_PATH, get(list_objects))
            .route(
                &format!("{BUCKET_PATH}{{key}}"),
                get(get_object).put(put_object).delete(delete_object),
            )
            .route("/remote/{name}", get(remote_file))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn par_url(&self) -> String {
        format!("http://{}{}", self.addr, BUCKET_PATH)
    }

    pub fn remote_url(&self, name: &str) -> String {
        format!("http://{}/remote/{}", self.addr, name)
    }

    pub fn insert(&self, key: &str, body: &str) {
        self.lock().objects.insert(
            key.to_string(),
            StoredObject {
                body: Bytes::from(body.to_string()),
                content_type: None,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn put_count(&self, key: &str) -> usize {
        self.lock().put_counts.get(key).copied().unwrap_or(0)
    }

    pub fn list_requests(&self) -> usize {
        self.lock().list_requests
    }

    pub fn fail_puts_for(&self, key: &str, status: StatusCode) {
        self.lock().failing_puts.insert(key.to_string(), status);
    }

    pub fn fail_gets_for(&self, key: &str, status: StatusCode) {
        self.lock().failing_gets.insert(key.to_string(), status);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_puts.clear();
        state.failing_gets.clear();
    }

    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = Some(size);
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    prefix: Option<String>,
    start: Option<String>,
}

async fn list_objects(State(state): State<Shared>, Query(q): Query<ListQuery>) -> Json<serde_json::Value> {
    let mut state = state.lock().unwrap();
    state.list_requests += 1;
    let prefix = q.prefix.unwrap_or_default();
    let mut matching = state
        .objects
        .iter()
        .filter(|(key, _)| key.starts_with(&prefix))
        .filter(|(key, _)| q.start.as_deref().is_none_or(|start| key.as_str() >= start));

    let limit = state.page_size.unwrap_or(usize::MAX);
    let page: Vec<serde_json::Value> = matching
        .by_ref()
        .take(limit)
        .map(|(key, object)| {
            json!({
                "name": key,
                "size": object.body.len(),
                "timeModified": "2024-05-01T12:00:00Z",
            })
        })
        .collect();
    let next = matching.next().map(|(key, _)| key.clone());

    let mut body = json!({ "objects": page });
    if let Some(next) = next {
        body["nextStartWith"] = json!(next);
    }
    Json(body)
}

async fn get_object(State(state): State<Shared>, Path(key): Path<String>) -> Response {
    let state = state.lock().unwrap();
    if let Some(status) = state.failing_gets.get(&key) {
        return (*status, "injected failure").into_response();
    }
    match state.objects.get(&key) {
        Some(object) => {
            let content_type = object
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".into());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                object.body.clone(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "The object was not found").into_response(),
    }
}

async fn put_object(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    *state.put_counts.entry(key.clone()).or_default() += 1;
    if let Some(status) = state.failing_puts.get(&key) {
        return *status;
    }

    if let Some(sent) = headers.get("content-md5").and_then(|v| v.to_str().ok()) {
        let actual = general_purpose::STANDARD.encode(md5::compute(&body).0);
        if sent != actual {
            return StatusCode::BAD_REQUEST;
        }
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .objects
        .insert(key, StoredObject { body, content_type });
    StatusCode::OK
}

async fn delete_object(State(state): State<Shared>, Path(key): Path<String>) -> StatusCode {
    match state.lock().unwrap().objects.remove(&key) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn remote_file(Path(name): Path<String>) -> Response {
    if name.starts_with("missing") {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-test")],
        format!("remote:{name}"),
    )
        .into_response()
}
