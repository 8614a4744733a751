use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::grading::aggregate::AnswerScorer;
use crate::services::storage::StorageService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    storage: Option<StorageService>,
    scorer: Arc<AnswerScorer>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        storage: Option<StorageService>,
        scorer: Arc<AnswerScorer>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, storage, scorer }) }
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

    pub(crate) fn storage(&self) -> Option<&StorageService> {
        self.inner.storage.as_ref()
    }

    /// Scores typed student answers on submission.
    pub(crate) fn scorer(&self) -> &AnswerScorer {
        &self.inner.scorer
    }

    pub(crate) fn scorer_handle(&self) -> Arc<AnswerScorer> {
        self.inner.scorer.clone()
    }
}
