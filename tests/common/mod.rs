//! Shared test harness for integration tests.
//!
//! Builds a full [`AppContext`] backed by a temp-dir SQLite file and starts
//! Axum on a random port. The "ffmpeg" binary is swappable so tests can use
//! `true` (instant success) or `false` (instant failure) instead of a real
//! encoder.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use vidmill::config::Config;
use vidmill::server::{auth, create_router, AppContext};
use vidmill::transcode::{EncodeInvoker, JobOrchestrator, WorkerPool};
use vidmill_db::{init_pool, DbPool};

pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    /// Start a server whose encoder is the `true` binary, so every job
    /// succeeds instantly.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_ffmpeg("true").await
    }

    /// Start a server with a custom fake encoder binary.
    pub async fn with_server_ffmpeg(fake_ffmpeg: &str) -> (Self, SocketAddr) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads");
        config.storage.transcoded_dir = dir.path().join("transcoded");
        config.storage.db_path = dir.path().join("vidmill.db");
        std::fs::create_dir_all(&config.storage.upload_dir).unwrap();
        std::fs::create_dir_all(&config.storage.transcoded_dir).unwrap();

        let db = init_pool(&config.storage.db_path.to_string_lossy())
            .expect("failed to create test pool");

        {
            let conn = db.get().unwrap();
            auth::seed_default_admin(&conn).unwrap();
        }

        let pool = WorkerPool::new(config.transcode.max_concurrent_jobs);
        let invoker = Arc::new(EncodeInvoker::new(
            db.clone(),
            PathBuf::from(fake_ffmpeg),
            config.storage.upload_dir.clone(),
            config.storage.transcoded_dir.clone(),
        ));
        let orchestrator = Arc::new(JobOrchestrator::new(db.clone(), pool, invoker));

        let ctx = AppContext {
            db: db.clone(),
            config: Arc::new(config),
            token_secret: Arc::new("test-secret".to_string()),
            orchestrator,
            ffmpeg: PathBuf::from(fake_ffmpeg),
            ffprobe: None,
        };

        let app = create_router(ctx.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (Self { ctx, db, dir }, addr)
    }
}

/// Register a user and return a bearer token for them.
pub async fn register_and_login(addr: SocketAddr, username: &str) -> String {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "register failed for {username}");

    login(addr, username, "password123").await
}

/// Log in and return the bearer token.
pub async fn login(addr: SocketAddr, username: &str, password: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/v1/auth/login"))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "login failed for {username}");

    let json: serde_json::Value = resp.json().await.unwrap();
    json["token"].as_str().unwrap().to_string()
}

/// Upload a small fake video and return the created record.
pub async fn upload_video(addr: SocketAddr, token: &str, filename: &str) -> serde_json::Value {
    upload_bytes(addr, token, filename, b"fake video bytes".to_vec()).await
}

/// Upload arbitrary bytes under a filename and return the created record.
pub async fn upload_bytes(
    addr: SocketAddr,
    token: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> serde_json::Value {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
    let form = reqwest::multipart::Form::new().part("video", part);

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/videos"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "upload failed for {filename}");
    resp.json().await.unwrap()
}

/// Poll a job until it reaches a terminal status.
pub async fn wait_for_terminal(
    addr: SocketAddr,
    token: &str,
    job_id: &str,
) -> serde_json::Value {
    let client = reqwest::Client::new();
    for _ in 0..200 {
        let job: serde_json::Value = client
            .get(format!("http://{addr}/api/v1/transcoding/jobs/{job_id}"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        match job["status"].as_str() {
            Some("completed") | Some("failed") => return job,
            _ => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
        }
    }
    panic!("job {job_id} never reached a terminal state");
}
