//! Test server wrapper that starts atelier on a random port
//!
//! Beyond lifecycle management, the wrapper carries helpers for the
//! generation endpoints so queue tests can submit, track, and await jobs
//! without repeating the polling choreography.

use std::net::SocketAddr;
use std::time::Duration;

use atelier_config::Config;
use atelier_server::Server;
use tokio_util::sync::CancellationToken;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// Binds to port 0 for automatic port assignment; the configured
    /// listen address is ignored so tests never collide.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let server = Server::new(&config)?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        let client = reqwest::Client::new();

        Ok(Self { addr, shutdown, client })
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Submit a generation request, returning HTTP status and parsed body
    pub async fn submit(&self, body: &serde_json::Value) -> (reqwest::StatusCode, serde_json::Value) {
        let response = self
            .client
            .post(self.url("/v1/images/generations"))
            .json(body)
            .send()
            .await
            .expect("submission request");

        let status = response.status();
        let body = response.json().await.expect("submission response body");
        (status, body)
    }

    /// Fetch the tracked view of a job; panics on anything but 200
    pub async fn job_status(&self, job_id: &str) -> serde_json::Value {
        let response = self
            .client
            .get(self.url(&format!("/v1/images/generations/{job_id}")))
            .send()
            .await
            .expect("status request");

        assert_eq!(response.status(), 200, "job {job_id} is no longer tracked");
        response.json().await.expect("status response body")
    }

    /// Poll the status endpoint until the job reports done, asserting
    /// that progress never moves backwards along the way
    ///
    /// The deadline spans several one second poll intervals plus one
    /// in-check retry backoff, so a single scripted failure-and-retry
    /// still resolves within it.
    pub async fn wait_for_terminal(&self, job_id: &str) -> serde_json::Value {
        let mut last_progress = 0u64;

        for _ in 0..60 {
            let body = self.job_status(job_id).await;

            let progress = body["progress"].as_u64().expect("progress field");
            assert!(
                progress >= last_progress,
                "progress went backwards: {last_progress} -> {progress}"
            );
            last_progress = progress;

            if body["done"] == true {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        panic!("job {job_id} did not reach a terminal state in time");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
