//! Notes service demonstrating the three sinks.
//!
//! ```text
//!     Client Request
//!     ─────────▶ network_logger ─▶ catch-panic ─▶ timeout ─▶ handler
//!                     │                                        │
//!                     ▼                                        ▼
//!              "network" record                    DbSink::traced (sqlx)
//!                                                          │
//!                                                          ▼
//!                                                     "db" record
//!
//!     startup / shutdown ─▶ AppSink ─▶ "app" record (fatal exits)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer};

use service_logs::config::{load_config, LoggingConfig};
use service_logs::sinks::{network_logger, ErrorCode, ResponseMessage};
use service_logs::{AppSink, DbSink, NetworkSink, Sinks};

#[derive(Parser)]
#[command(name = "service-logs")]
#[command(about = "Notes service writing app, db and network records", long_about = None)]
struct Cli {
    /// Logging config (TOML). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    #[arg(long, default_value = "sqlite::memory:")]
    database_url: String,
}

/// Handler state.
#[derive(Clone)]
struct AppState {
    db: DbSink,
    pool: SqlitePool,
}

#[derive(Deserialize)]
struct NewNote {
    body: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LoggingConfig::default(),
    };
    let sinks = Sinks::from_config(&config);
    let app = sinks.app.clone();

    // A single connection keeps an in-memory database alive and shared.
    let pool = match SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&cli.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => app.fatal("failed to open database", &e),
    };

    let state = AppState {
        db: sinks.db.clone(),
        pool,
    };
    if let Err(e) = create_schema(&state).await {
        app.fatal("failed to create schema", &e);
    }

    let listener = match TcpListener::bind(cli.bind).await {
        Ok(listener) => listener,
        Err(e) => app.fatal("failed to bind listener", &e),
    };
    app.info(&format!("listening on {}", cli.bind));

    let router = build_router(state, sinks.network);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(app.clone()))
    .await?;

    app.info("shutdown complete");
    Ok(())
}

/// Build the router. The network logger is the outermost layer so panics
/// and timeouts still reach it as responses.
#[allow(deprecated)]
fn build_router(state: AppState, network: NetworkSink) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/notes", post(create_note))
        .route("/notes/{id}", get(get_note))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(network, network_logger))
}

async fn create_schema(state: &AppState) -> Result<(), sqlx::Error> {
    let sql = "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL)";
    state
        .db
        .traced(sql, sqlx::query(sql).execute(&state.pool))
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn create_note(State(state): State<AppState>, Json(note): Json<NewNote>) -> Response {
    let sql = "INSERT INTO notes (body) VALUES (?)";
    let insert = sqlx::query(sql).bind(note.body).execute(&state.pool);

    match state.db.traced(sql, insert).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(json!({ "id": result.last_insert_rowid() })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ResponseMessage::new("could not store note"),
            ErrorCode::new("NOTE_WRITE_FAILED"),
            "internal error",
        )
            .into_response(),
    }
}

async fn get_note(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let sql = "SELECT body FROM notes WHERE id = ?";
    let lookup = sqlx::query_scalar::<sqlx::Sqlite, String>(sql)
        .bind(id)
        .fetch_optional(&state.pool);

    match state.db.traced(sql, lookup).await {
        Ok(Some(body)) => Json(json!({ "id": id, "body": body })).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            ResponseMessage::new("note not found"),
            ErrorCode::new("NOTE_NOT_FOUND"),
            "not found",
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ResponseMessage::new("could not load note"),
            ErrorCode::new("NOTE_READ_FAILED"),
            "internal error",
        )
            .into_response(),
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal(app: AppSink) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        app.fatal("failed to install Ctrl+C handler", &e);
    }
    app.info("shutdown signal received");
}
