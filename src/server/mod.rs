use crate::config::Config;
use crate::transcode::JobOrchestrator;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use vidmill_db::DbPool;

pub mod auth;
pub mod routes_api;
pub mod routes_jobs;
pub mod routes_users;
pub mod routes_videos;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    pub config: Arc<Config>,
    /// Secret used to sign session tokens
    pub token_secret: Arc<String>,
    pub orchestrator: Arc<JobOrchestrator>,
    /// Encoder binary the invoker runs; health reports on its availability.
    pub ffmpeg: PathBuf,
    /// Resolved ffprobe binary, when available. Uploads still work without
    /// it, they just carry no probed metadata.
    pub ffprobe: Option<PathBuf>,
}

impl AppContext {
    pub fn conn(&self) -> vidmill_common::Result<vidmill_db::PooledConnection> {
        vidmill_db::get_conn(&self.db)
    }
}

/// Error wrapper mapping the common error type onto HTTP responses.
pub struct ApiError(vidmill_common::Error);

impl From<vidmill_common::Error> for ApiError {
    fn from(err: vidmill_common::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use vidmill_common::Error;

        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
                tracing::error!("Internal error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = axum::Json(serde_json::json!({ "message": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let max_upload = ctx.config.storage.max_upload_bytes;

    Router::new()
        // Health check (unauthenticated)
        .route("/health", get(routes_api::health))
        .nest("/api/v1", api_routes(&ctx))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn api_routes(ctx: &AppContext) -> Router<AppContext> {
    // Auth routes carry no middleware
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = routes_videos::video_routes()
        .merge(routes_jobs::job_routes())
        .merge(routes_users::user_routes())
        .merge(routes_api::api_routes())
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::auth_middleware,
        ));

    auth_routes.merge(protected_routes)
}

/// Start the HTTP server
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
