//! Terminator webcams service: binary entrypoint.
//! Loads config, opens the store, wires the router and (optionally) the
//! in-process scheduler.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use terminator_webcams::auth::TriggerAuth;
use terminator_webcams::config::AppConfig;
use terminator_webcams::ingest::scheduler::spawn_scheduler;
use terminator_webcams::metrics::Metrics;

const DEFAULT_LOG_FILTER: &str =
    "terminator_webcams=info,ingest=info,fetch=info,reconcile=info,auth=info,api=info,scheduler=info,warn";

/// Compact logs by default, JSON with LOG_FORMAT=json. `try_init` so a
/// subscriber the host runtime already installed wins.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let auth = TriggerAuth::from_env();
    if !auth.is_configured() {
        tracing::warn!(target: "auth", "CRON_SECRET not set; triggers will be refused");
    }

    let app = terminator_webcams::build_app(&cfg, auth, metrics.as_ref()).await?;

    if let Some(interval) = cfg.schedule.interval() {
        tracing::info!(
            target: "scheduler",
            interval_secs = interval.as_secs(),
            "in-process scheduler on"
        );
        spawn_scheduler(app.pipeline.clone(), interval);
    }

    Ok(app.router.into())
}
