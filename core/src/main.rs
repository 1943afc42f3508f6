use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use rmcp::ServiceExt;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService,
    session::local::LocalSessionManager,
};
use tokio_util::sync::CancellationToken;

use dex_core::config::DexConfig;
use dex_core::db::Database;
use dex_core::mcp::DexServer;

#[derive(Parser)]
#[command(name = "dex", about = "Pokedex lookups over MCP")]
struct Cli {
    /// SQLite database path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Config file (default: ~/.dex/config.toml, if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run HTTP MCP server instead of stdio
    #[arg(long)]
    http: bool,

    /// HTTP port (only with --http)
    #[arg(long, default_value = "3100")]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dex=info".parse()?)
                .add_directive("dex_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DexConfig::load(cli.config.as_deref())?;
    let options = config.query_options();

    let db_path = match cli.db {
        Some(p) => p,
        None => config.database_path()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db_path_str = db_path.to_string_lossy().to_string();

    tracing::info!(db = %db_path_str, "opening database");
    let db = Database::open(&db_path_str)?;
    let count = db.pokemon_count()?;
    if count == 0 {
        tracing::warn!("database has no pokemon; run ingestion first");
    } else {
        tracing::info!(pokemon = count, "database ready");
    }

    let db = Arc::new(Mutex::new(db));

    if cli.http {
        let port = cli.port;
        let ct = CancellationToken::new();

        let service: StreamableHttpService<DexServer, LocalSessionManager> =
            StreamableHttpService::new(
                {
                    let db = Arc::clone(&db);
                    move || Ok(DexServer::new(Arc::clone(&db), options))
                },
                Default::default(),
                StreamableHttpServerConfig {
                    stateful_mode: true,
                    cancellation_token: ct.child_token(),
                    ..Default::default()
                },
            );

        let router = axum::Router::new().nest_service("/mcp", service);
        let bind_addr = format!("127.0.0.1:{port}");
        let tcp_listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        tracing::info!(addr = %bind_addr, "serving MCP over HTTP");

        axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for CTRL+C");
                }
                tracing::info!("shutting down HTTP MCP server");
                ct.cancel();
            })
            .await?;

        return Ok(());
    }

    tracing::info!("serving MCP over stdio");
    let server = DexServer::new(db, options);
    let running = server.serve(rmcp::transport::stdio()).await?;
    running.waiting().await?;

    Ok(())
}
