pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::database::{
    bank::PgQuestionBank, parts::PgPartCatalog, result_store::PgResultStore,
    test_store::PgTestStore,
};
use crate::services::{
    assembly_service::TestAssembler, attempt_service::AttemptService,
    media_service::LocalMediaStore, score_service::ToeicScoreTable, test_service::TestService,
};

#[derive(Clone)]
pub struct AppState {
    pub test_service: TestService,
    pub attempt_service: AttemptService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let tests = Arc::new(PgTestStore::new(pool.clone()));
        let parts = Arc::new(PgPartCatalog::new(pool.clone()));
        let bank = Arc::new(PgQuestionBank::new(pool.clone()));
        let results = Arc::new(PgResultStore::new(pool));
        let media = Arc::new(LocalMediaStore::new(
            config.uploads_dir.clone(),
            config.uploads_public_path.clone(),
        ));

        let test_service = TestService::new(
            tests.clone(),
            TestAssembler::new(bank, parts.clone()),
            parts.clone(),
            media,
        );
        let attempt_service =
            AttemptService::new(tests, results, parts, Arc::new(ToeicScoreTable));

        Self::from_services(test_service, attempt_service)
    }

    pub fn from_services(test_service: TestService, attempt_service: AttemptService) -> Self {
        Self {
            test_service,
            attempt_service,
        }
    }
}

/// Full application: API routes, uploaded media and the HTTP layers.
pub fn build_app(state: AppState, config: &Config) -> Router {
    routes::router(state)
        .nest_service(
            &config.uploads_public_path,
            ServeDir::new(&config.uploads_dir),
        )
        .layer(middleware::cors::cors_layer(&config.cors_allowed_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_upload_mb * 1024 * 1024))
}
