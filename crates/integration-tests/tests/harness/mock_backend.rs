//! Mock generation backend for integration tests
//!
//! Serves both an OpenAI-style inline generation endpoint and an AI
//! Horde-style async submit/status pair, plus a plain image download
//! route for URL-returning scenarios.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use base64::Engine;
use tokio_util::sync::CancellationToken;

/// Bytes served for every mock image (comfortably above the minimum
/// payload size the orchestrator accepts)
pub const IMAGE_BYTES: usize = 5000;

/// Mock backend with predictable responses and request counters
pub struct MockBackend {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockBackendState>,
}

struct MockBackendState {
    generate_count: AtomicU32,
    status_count: AtomicU32,
    download_count: AtomicU32,
    /// Number of generation requests to fail before succeeding
    fail_count: AtomicU32,
    fail_status: u16,
    /// Scripted status responses for the async queue route, served in
    /// order as (http status, body) pairs
    status_script: Mutex<VecDeque<(u16, serde_json::Value)>>,
}

impl MockBackend {
    /// Start a mock backend that always succeeds
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0, 500).await
    }

    /// Start a mock backend that fails the first `n` generation requests
    /// with the given status code
    pub async fn start_failing(n: u32, status: u16) -> anyhow::Result<Self> {
        Self::start_inner(n, status).await
    }

    async fn start_inner(fail_count: u32, fail_status: u16) -> anyhow::Result<Self> {
        let state = Arc::new(MockBackendState {
            generate_count: AtomicU32::new(0),
            status_count: AtomicU32::new(0),
            download_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            fail_status,
            status_script: Mutex::new(VecDeque::new()),
        });

        let app = Router::new()
            .route("/v1/images/generations", routing::post(handle_generate))
            .route("/v2/generate/async", routing::post(handle_submit))
            .route("/v2/generate/status/{id}", routing::get(handle_status))
            .route("/image.png", routing::get(handle_download))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL without a path prefix (queue-style backends)
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL including `/v1` (OpenAI-style backends append
    /// `/images/generations` themselves)
    pub fn openai_base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Full URL for a path on this mock
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Queue a scripted response for the next status poll
    pub fn push_status(&self, response: serde_json::Value) {
        self.state
            .status_script
            .lock()
            .expect("status script lock")
            .push_back((200, response));
    }

    /// Queue an error status code for the next status poll
    pub fn push_status_error(&self, status: u16) {
        self.state
            .status_script
            .lock()
            .expect("status script lock")
            .push_back((status, serde_json::json!({ "message": "mock status error" })));
    }

    /// Number of generation submissions received
    pub fn generate_count(&self) -> u32 {
        self.state.generate_count.load(Ordering::Relaxed)
    }

    /// Number of status polls received
    pub fn status_count(&self) -> u32 {
        self.state.status_count.load(Ordering::Relaxed)
    }

    /// Number of image downloads served
    pub fn download_count(&self) -> u32 {
        self.state.download_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Raw bytes of the canned mock image
pub fn image_bytes() -> Vec<u8> {
    vec![0xAB; IMAGE_BYTES]
}

async fn handle_generate(State(state): State<Arc<MockBackendState>>) -> impl IntoResponse {
    state.generate_count.fetch_add(1, Ordering::Relaxed);

    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.fail_count.fetch_sub(1, Ordering::Relaxed);
        let status = StatusCode::from_u16(state.fail_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            Json(serde_json::json!({
                "error": { "message": "mock backend intentional failure", "type": "server_error" }
            })),
        )
            .into_response();
    }

    let b64 = base64::engine::general_purpose::STANDARD.encode(image_bytes());
    Json(serde_json::json!({
        "created": 1_700_000_000,
        "data": [{ "b64_json": b64 }]
    }))
    .into_response()
}

async fn handle_submit(State(state): State<Arc<MockBackendState>>) -> impl IntoResponse {
    state.generate_count.fetch_add(1, Ordering::Relaxed);

    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.fail_count.fetch_sub(1, Ordering::Relaxed);
        let status = StatusCode::from_u16(state.fail_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(serde_json::json!({ "message": "queue unavailable" }))).into_response();
    }

    Json(serde_json::json!({ "id": "mock-queue-job-1", "kudos": 10 })).into_response()
}

async fn handle_status(State(state): State<Arc<MockBackendState>>) -> impl IntoResponse {
    state.status_count.fetch_add(1, Ordering::Relaxed);

    let scripted = state
        .status_script
        .lock()
        .expect("status script lock")
        .pop_front();

    // An exhausted script keeps the job in progress rather than erroring
    let (status, body) = scripted.unwrap_or_else(|| {
        (
            200,
            serde_json::json!({
                "done": false,
                "faulted": false,
                "waiting": 1,
                "processing": 0,
                "finished": 0,
                "queue_position": 1
            }),
        )
    });

    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(body),
    )
}

async fn handle_download(State(state): State<Arc<MockBackendState>>) -> impl IntoResponse {
    state.download_count.fetch_add(1, Ordering::Relaxed);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "image/png")],
        image_bytes(),
    )
}
