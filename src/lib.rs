pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::execution::fallback::FallbackExecutor;
use crate::services::execution::{judge0::Judge0Client, piston::PistonClient};
use crate::services::subjective::AiSubjectiveScorer;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without drafts");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let piston = PistonClient::from_settings(&settings)?;
    let judge0 = Judge0Client::from_settings(&settings)?;
    let executor = Arc::new(FallbackExecutor::new(Arc::new(piston), Arc::new(judge0)));
    let subjective = Arc::new(AiSubjectiveScorer::from_settings(&settings)?);

    let state = AppState::new(settings, db_pool, redis.clone(), executor, subjective);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "QuizForge API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
