mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use vidmill::server::{self, auth, AppContext};
use vidmill::transcode::{EncodeInvoker, JobOrchestrator, WorkerPool};
use vidmill::{config, probe};
use vidmill_db::init_pool;

async fn start_server(
    host: String,
    port: u16,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting vidmill server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    // Storage directories
    std::fs::create_dir_all(&config.storage.upload_dir)
        .with_context(|| format!("Failed to create {:?}", config.storage.upload_dir))?;
    std::fs::create_dir_all(&config.storage.transcoded_dir)
        .with_context(|| format!("Failed to create {:?}", config.storage.transcoded_dir))?;
    if let Some(parent) = config.storage.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Initialize database
    let db_path = config.storage.db_path.to_string_lossy().to_string();
    tracing::info!("Initializing database at {}", db_path);
    let db = init_pool(&db_path)?;

    {
        let conn = vidmill_db::get_conn(&db)?;
        auth::seed_default_admin(&conn)?;
    }

    // External tools: ffmpeg is required, ffprobe is optional
    let ffmpeg = probe::resolve_tool(config.transcode.ffmpeg_path.as_deref(), "ffmpeg")
        .context("ffmpeg is required to run the server")?;
    let ffprobe = probe::resolve_tool(config.transcode.ffprobe_path.as_deref(), "ffprobe").ok();
    if ffprobe.is_none() {
        tracing::warn!("ffprobe not found, uploads will carry no probed metadata");
    }
    tracing::info!("Using ffmpeg at {:?}", ffmpeg);

    // Token secret: configured, or random per-process
    let token_secret = match config.server.auth.token_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!(
                "No auth.token_secret configured, tokens will not survive a restart"
            );
            auth::generate_secret()
        }
    };

    // Transcode machinery
    let pool = WorkerPool::new(config.transcode.max_concurrent_jobs);
    let invoker = Arc::new(EncodeInvoker::new(
        db.clone(),
        ffmpeg.clone(),
        config.storage.upload_dir.clone(),
        config.storage.transcoded_dir.clone(),
    ));
    let orchestrator = Arc::new(JobOrchestrator::new(db.clone(), pool, invoker));
    tracing::info!(
        "Worker pool started with {} slots",
        config.transcode.max_concurrent_jobs
    );

    let ctx = AppContext {
        db,
        config: Arc::new(config),
        token_secret: Arc::new(token_secret),
        orchestrator,
        ffmpeg,
        ffprobe,
    };

    server::start_server(ctx).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidmill=trace,vidmill_db=debug,vidmill_common=debug,tower_http=debug".to_string()
        } else {
            "vidmill=debug,vidmill_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::HashPassword { password } => {
            println!("{}", auth::hash_password(&password)?);
            Ok(())
        }
        Commands::GenerateSecret => {
            println!("{}", auth::generate_secret());
            Ok(())
        }
        Commands::Version => {
            println!("vidmill {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = probe::check_tools(
        config.transcode.ffmpeg_path.as_deref(),
        config.transcode.ffprobe_path.as_deref(),
    );
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}
