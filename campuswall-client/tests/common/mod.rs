//! In-process backend + client harness for the integration tests.
//!
//! The backend issues bearer tokens at `/auth/login` and `/auth/register`
//! and guards the feature routes behind them, recording every hit so
//! tests can assert on replay traffic.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};

use campuswall_client::config::{ApiSettings, Settings};
use campuswall_client::{ApiClient, MemoryStore, ReauthPrompt};

pub const PASSWORD: &str = "secret";

#[derive(Clone, Debug)]
pub struct Hit {
    pub path: String,
    pub authorized: bool,
}

#[derive(Default)]
pub struct BackendState {
    pub valid_token: Option<String>,
    pub issued: usize,
    pub hits: Vec<Hit>,
}

type SharedState = Arc<Mutex<BackendState>>;

pub struct CountingPrompt(pub Arc<AtomicUsize>);

impl ReauthPrompt for CountingPrompt {
    fn authentication_required(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct TestApp {
    pub client: ApiClient,
    pub prompts: Arc<AtomicUsize>,
    pub backend: SharedState,
    pub addr: SocketAddr,
}

impl TestApp {
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn authorized_hits(&self) -> Vec<String> {
        self.backend
            .lock()
            .unwrap()
            .hits
            .iter()
            .filter(|h| h.authorized)
            .map(|h| h.path.clone())
            .collect()
    }

    pub fn unauthorized_hits(&self) -> Vec<String> {
        self.backend
            .lock()
            .unwrap()
            .hits
            .iter()
            .filter(|h| !h.authorized)
            .map(|h| h.path.clone())
            .collect()
    }

    pub fn current_token(&self) -> Option<String> {
        self.backend.lock().unwrap().valid_token.clone()
    }
}

pub async fn spawn_app() -> TestApp {
    let backend: SharedState = Arc::default();

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/users/info", get(user_info))
        .route("/posts", get(guarded))
        .route("/comments", get(guarded))
        .route("/likes", post(guarded))
        .route("/boom", get(boom))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test backend");
    let addr = listener.local_addr().expect("failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test backend died");
    });

    let settings = Settings {
        api: ApiSettings {
            base_url: format!("http://{addr}"),
            timeout_ms: 5_000,
        },
        ..Settings::default()
    };

    let prompts = Arc::new(AtomicUsize::new(0));
    let client = ApiClient::new(
        &settings,
        Arc::new(MemoryStore::new()),
        Arc::new(CountingPrompt(prompts.clone())),
    )
    .expect("failed to build client");

    TestApp {
        client,
        prompts,
        backend,
        addr,
    }
}

/// Poll until `cond` holds; panics after two seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn authorized(state: &SharedState, headers: &HeaderMap) -> (Option<String>, bool) {
    let presented = bearer(headers);
    let valid = state.lock().unwrap().valid_token.clone();
    let ok = presented.is_some() && presented == valid;
    (presented, ok)
}

async fn login(
    State(state): State<SharedState>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    if body["password"] == PASSWORD {
        let token = {
            let mut state = state.lock().unwrap();
            state.issued += 1;
            let token = format!("token-{}", state.issued);
            state.valid_token = Some(token.clone());
            token
        };
        (StatusCode::OK, Json(serde_json::json!({ "token": token })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "bad credentials" })),
        )
    }
}

async fn register(
    State(state): State<SharedState>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let name = body["name"].as_str().unwrap_or("anonymous").to_string();
    let token = {
        let mut state = state.lock().unwrap();
        state.issued += 1;
        let token = format!("token-{}", state.issued);
        state.valid_token = Some(token.clone());
        token
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "token": token,
            "user": { "uid": format!("u-{name}"), "name": name, "avatar": "", "enable": true },
        })),
    )
}

async fn user_info(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let (_, ok) = authorized(&state, &headers);
    if ok {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "uid": "u-1", "name": "alice", "avatar": "", "enable": true,
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "unauthenticated" })),
        )
    }
}

async fn guarded(
    State(state): State<SharedState>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let (presented, ok) = authorized(&state, &headers);
    state.lock().unwrap().hits.push(Hit {
        path: uri.path().to_string(),
        authorized: ok,
    });
    if ok {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "path": uri.path(), "via": presented })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "message": "unauthenticated" })),
        )
    }
}

async fn boom() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "message": "boom" })),
    )
}
