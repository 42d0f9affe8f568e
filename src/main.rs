mod accounts;
mod aggregate;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod handlers;
mod models;
mod notes;
mod repository;
mod state;
mod storage;
mod validate;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::AppError;
use state::AppState;
use storage::FileStorage;

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::permissive().max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/auth/register", post(handlers::register_user))
        .route("/auth/login", post(handlers::login_user))
        .route("/auth/logout", post(handlers::logout_user))
        .route("/users/me", get(handlers::current_user))
        .route("/subjects", get(handlers::list_subjects))
        .route(
            "/notes",
            get(handlers::list_notes)
                .post(handlers::upload_note)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/notes/:note_id", get(handlers::get_note))
        .route("/comments", post(handlers::add_comment))
        .route("/ratings", post(handlers::submit_rating))
        .route("/files/:stored_name", get(handlers::download_file))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn run(config: Config) -> Result<(), AppError> {
    let conn = db::establish_connection(&config.database_path)?;
    info!("Opened database at {}", config.database_path.display());

    if config.seed {
        db::seed(&*conn.lock().await, config.bcrypt_cost)?;
    }

    let storage = FileStorage::new(&config.upload_dir).await?;
    info!("Storing uploads under {}", storage.root().display());

    let state = AppState::new(conn, storage, config.bcrypt_cost);
    let app = router(state, config.max_upload_bytes);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down...");
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("studynotes=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run(Config::load()).await {
        error!("{e}");
        std::process::exit(1);
    }
}
