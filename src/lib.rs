// src/lib.rs
// Public library surface for integration tests and the Shuttle binary.

pub mod api;
pub mod auth;
pub mod classify;
pub mod config;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use axum::Router;

pub use crate::api::{create_router, AppState};
pub use crate::ingest::{run_once, Pipeline, RunSummary};

use crate::auth::TriggerAuth;
use crate::config::AppConfig;
use crate::ingest::providers::windy::WindyDirectory;
use crate::ingest::types::CameraDirectory;
use crate::metrics::Metrics;
use crate::store::{MemoryStore, SqliteStore, WebcamStore};

/// Wired application: the HTTP router plus the pipeline it drives, so the
/// caller can also hand the pipeline to a scheduler.
pub struct App {
    pub router: Router,
    pub pipeline: Arc<Pipeline>,
}

pub async fn open_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn WebcamStore>> {
    match cfg.database_url.as_deref() {
        Some(url) => {
            let store = SqliteStore::connect(url)
                .await
                .context("opening sqlite store")?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(target: "ingest", "no database_url; state is kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Fixture body when `fetch.fixture_path` is set, else the live directory
/// (which needs `WINDY_API_KEY`).
pub fn open_directory(
    cfg: &AppConfig,
    api_key: Option<&str>,
) -> anyhow::Result<Arc<dyn CameraDirectory>> {
    if let Some(path) = cfg.fetch.fixture_path.as_ref() {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading directory fixture {}", path.display()))?;
        tracing::info!(target: "ingest", path = %path.display(), "serving directory from fixture");
        return Ok(Arc::new(WindyDirectory::from_fixture(&body)?));
    }

    let key = api_key.ok_or_else(|| {
        anyhow!(
            "{} is not set and no fetch.fixture_path configured",
            config::ENV_WINDY_API_KEY
        )
    })?;
    Ok(Arc::new(WindyDirectory::from_api_key(
        &cfg.fetch.base_url,
        key,
        Duration::from_secs(cfg.fetch.request_timeout_secs),
    )?))
}

/// Build the application from parts; used by `main` and by tests that want
/// their own directory and store.
pub fn app_with(
    directory: Arc<dyn CameraDirectory>,
    store: Arc<dyn WebcamStore>,
    cfg: &AppConfig,
    auth: TriggerAuth,
    metrics: Option<&Metrics>,
) -> App {
    let pipeline = Arc::new(Pipeline::new(directory, store, cfg.pipeline()));
    let state = AppState {
        pipeline: pipeline.clone(),
        auth,
    };
    App {
        router: create_router(state, metrics),
        pipeline,
    }
}

pub async fn build_app(
    cfg: &AppConfig,
    auth: TriggerAuth,
    metrics: Option<&Metrics>,
) -> anyhow::Result<App> {
    let directory = open_directory(cfg, config::windy_api_key().as_deref())?;
    let store = open_store(cfg).await?;
    Ok(app_with(directory, store, cfg, auth, metrics))
}
