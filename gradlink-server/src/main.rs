// gradlink-server/src/main.rs

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use gradlink_core::http;
use gradlink_core::Database;

mod adapters;
mod context;

use adapters::{DevTokenVerifier, DiskObjectStore, LogNotifier};
use context::ServerContext;

#[derive(Parser, Debug, Clone)]
#[command(name = "gradlink")]
#[command(author, version, about = "GradLink chat - realtime messaging for the alumni portal")]
struct Args {
    /// Address to which the server will bind
    #[arg(long, default_value = "0.0.0.0:8080")]
    server_addr: String,

    /// Postgres connection URL. Falls back to DATABASE_URL from the
    /// environment (or .env) before the built-in default.
    #[arg(long)]
    database_url: Option<String>,

    /// Directory for stored attachments
    #[arg(long, default_value = "uploads")]
    upload_dir: String,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("gradlink=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("GradLink chat starting on {}", args.server_addr);

    let database_url = args
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "postgres://gradlink@localhost:5432/gradlink".to_string());
    let db = Database::new(&database_url).await?;
    db.migrate().await?;

    let ctx = ServerContext::new(
        &db,
        Arc::new(DevTokenVerifier),
        Arc::new(LogNotifier),
        Arc::new(DiskObjectStore::new(&args.upload_dir)),
    );
    ctx.spawn_tasks();

    let app = http::router(ctx.state.clone()).merge(http::static_uploads(&args.upload_dir));
    let listener = tokio::net::TcpListener::bind(&args.server_addr).await?;

    let event_bus = ctx.event_bus.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {:?}", e);
        }
        info!("shutdown signal received");
        event_bus.shutdown();
    });

    serve.await?;
    info!("GradLink chat stopped");
    Ok(())
}
