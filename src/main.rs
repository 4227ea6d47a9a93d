mod app;
mod auth;
mod config;
mod error;
mod images;
mod places;
mod state;
mod storage;
mod store;
mod users;

use crate::state::{AppState, Startup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "places=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let Startup {
        state,
        db,
        static_dir,
    } = AppState::init().await?;

    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("migrations applied");

    if let Some(dir) = &static_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let app = app::build_app(state, static_dir);
    app::serve(app).await
}
