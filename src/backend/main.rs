use std::sync::Arc;

use axum::http::HeaderName;
use fortnight_finance::api::{AppState, app_router};
use fortnight_finance::config::Config;
use fortnight_finance::{LogTarget, db, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.store.log_format, LogTarget::Stdout);

    let conn = db::init_db(&config.store.db_path)?;
    tracing::info!(db_path = %config.store.db_path, anchor = %config.store.calendar.anchor(), "database ready");

    let user_header = HeaderName::from_bytes(config.user_header.as_bytes())?;
    let state = Arc::new(AppState::new(conn, config.store.calendar, user_header));
    let router = app_router(state, &config.cors_allow);

    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
