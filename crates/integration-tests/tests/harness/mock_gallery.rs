//! Mock gallery persistence service

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

/// Mock gallery that records save requests for later inspection
pub struct MockGallery {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockGalleryState>,
}

struct MockGalleryState {
    save_count: AtomicU32,
    last_request: Mutex<Option<serde_json::Value>>,
}

impl MockGallery {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockGalleryState {
            save_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        });

        let app = Router::new()
            .route("/internal/generated-images", routing::post(handle_save))
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

    /// Base URL for configuration
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of save requests received
    pub fn save_count(&self) -> u32 {
        self.state.save_count.load(Ordering::Relaxed)
    }

    /// Body of the most recent save request
    pub fn last_request(&self) -> Option<serde_json::Value> {
        self.state.last_request.lock().expect("last request lock").clone()
    }
}

impl Drop for MockGallery {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_save(
    State(state): State<Arc<MockGalleryState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.save_count.fetch_add(1, Ordering::Relaxed);
    *state.last_request.lock().expect("last request lock") = Some(body);

    Json(serde_json::json!({
        "id": "rec_1",
        "canonical_url": "https://gallery.test/images/rec_1"
    }))
}
