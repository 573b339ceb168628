use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::execution::ExecutionProvider;
use crate::services::subjective::SubjectiveScorer;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    executor: Arc<dyn ExecutionProvider>,
    subjective: Arc<dyn SubjectiveScorer>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        executor: Arc<dyn ExecutionProvider>,
        subjective: Arc<dyn SubjectiveScorer>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, executor, subjective }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn executor(&self) -> Arc<dyn ExecutionProvider> {
        self.inner.executor.clone()
    }

    pub(crate) fn subjective(&self) -> Arc<dyn SubjectiveScorer> {
        self.inner.subjective.clone()
    }
}
