//! Mock CDN upload endpoint (Cloudinary-shaped)

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

/// Mock CDN that accepts multipart uploads and returns a well-formed
/// upload response
pub struct MockCdn {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockCdnState>,
}

struct MockCdnState {
    upload_count: AtomicU32,
    /// Number of uploads to reject with 400 before succeeding
    fail_count: AtomicU32,
}

impl MockCdn {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0).await
    }

    /// Start a mock CDN that rejects the first `n` uploads with 400
    pub async fn start_failing(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n).await
    }

    async fn start_inner(fail_count: u32) -> anyhow::Result<Self> {
        let state = Arc::new(MockCdnState {
            upload_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
        });

        let app = Router::new()
            .route("/{cloud_name}/image/upload", routing::post(handle_upload))
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

    /// Base URL to use as the upload API base in configuration
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of upload requests received
    pub fn upload_count(&self) -> u32 {
        self.state.upload_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockCdn {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_upload(
    State(state): State<Arc<MockCdnState>>,
    Path(cloud_name): Path<String>,
) -> impl IntoResponse {
    state.upload_count.fetch_add(1, Ordering::Relaxed);

    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.fail_count.fetch_sub(1, Ordering::Relaxed);
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": { "message": "Upload preset not found" } })),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "public_id": "generated/gen_mock",
        "secure_url": format!(
            "https://res.cloudinary.com/{cloud_name}/image/upload/v1/generated/gen_mock.png"
        ),
        "resource_type": "image",
        "format": "png",
        "width": 512,
        "height": 512,
        "bytes": 5000
    }))
    .into_response()
}
