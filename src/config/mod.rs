// src/config/mod.rs
//! Runtime configuration: a TOML file plus a few environment overrides.
//!
//! Lookup order for the file:
//! 1) `$TERMINATOR_CONFIG_PATH` (must exist)
//! 2) `config/terminator.toml`
//! 3) built-in defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::RankOrder;
use crate::ingest::fetch::FetchParams;
use crate::ingest::providers::windy::DEFAULT_BASE_URL;

pub const DEFAULT_CONFIG_PATH: &str = "config/terminator.toml";
pub const ENV_CONFIG_PATH: &str = "TERMINATOR_CONFIG_PATH";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_WINDY_API_KEY: &str = "WINDY_API_KEY";

/// Ceiling for `stagger_ms` and `batch_delay_ms`.
pub const MAX_PACING_MS: u64 = 60_000;
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Angular step between ring vertices (degrees).
    pub precision_deg: f64,
    /// Sun altitude the ring is drawn at; ring radius is `90 - sun_altitude_deg`.
    pub sun_altitude_deg: f64,
    /// Extra rings shifted west by these many degrees of longitude. `0` is the main ring.
    pub ring_offsets_deg: Vec<f64>,
    /// Add a midpoint between consecutive arc vertices.
    pub sample_midpoints: bool,
    pub rank_order: RankOrder,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            precision_deg: 12.0,
            sun_altitude_deg: -13.0,
            ring_offsets_deg: vec![0.0, 15.75],
            sample_midpoints: false,
            rank_order: RankOrder::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub search_radius_deg: f64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub stagger_ms: u64,
    pub request_timeout_secs: u64,
    pub base_url: String,
    /// Serve a canned clusters body instead of calling the directory.
    pub fixture_path: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_radius_deg: 9.0,
            batch_size: 5,
            batch_delay_ms: 1000,
            stagger_ms: 200,
            request_timeout_secs: 10,
            base_url: DEFAULT_BASE_URL.to_string(),
            fixture_path: None,
        }
    }
}

impl FetchConfig {
    pub fn params(&self) -> FetchParams {
        FetchParams {
            radius_deg: self.search_radius_deg,
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            stagger: Duration::from_millis(self.stagger_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Upper bound on concurrent store writes.
    pub store_concurrency: usize,
    /// Value of the `source` column for this directory.
    pub source: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            store_concurrency: 8,
            source: "windy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// In-process trigger period; absent or 0 leaves scheduling to the host.
    pub interval_secs: Option<u64>,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub geometry: GeometryConfig,
    pub fetch: FetchConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub geometry: GeometryConfig,
    pub fetch: FetchConfig,
    pub reconcile: ReconcileConfig,
    pub schedule: ScheduleConfig,
    /// sqlx SQLite URL; absent keeps state in memory.
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            geometry: self.geometry.clone(),
            fetch: self.fetch.clone(),
            reconcile: self.reconcile.clone(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing terminator config toml")?;
        Ok(cfg.sanitized())
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks, then apply `DATABASE_URL`.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                AppConfig::default()
            }
        };

        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            let url = url.trim();
            if !url.is_empty() {
                cfg.database_url = Some(url.to_string());
            }
        }
        Ok(cfg)
    }

    fn sanitized(mut self) -> Self {
        let g = &mut self.geometry;
        if !g.precision_deg.is_finite() {
            g.precision_deg = GeometryConfig::default().precision_deg;
        }
        g.precision_deg = g.precision_deg.clamp(0.1, 90.0);
        if !g.sun_altitude_deg.is_finite() {
            g.sun_altitude_deg = 0.0;
        }
        g.sun_altitude_deg = g.sun_altitude_deg.clamp(-89.0, 89.0);
        g.ring_offsets_deg.retain(|o| o.is_finite());
        if g.ring_offsets_deg.is_empty() {
            g.ring_offsets_deg.push(0.0);
        }

        let f = &mut self.fetch;
        if !f.search_radius_deg.is_finite() {
            f.search_radius_deg = FetchConfig::default().search_radius_deg;
        }
        f.search_radius_deg = f.search_radius_deg.clamp(0.1, 45.0);
        f.batch_size = f.batch_size.max(1);
        f.request_timeout_secs = f.request_timeout_secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS);
        f.stagger_ms = f.stagger_ms.min(MAX_PACING_MS);
        f.batch_delay_ms = f.batch_delay_ms.min(MAX_PACING_MS);

        let r = &mut self.reconcile;
        r.store_concurrency = r.store_concurrency.max(1);
        if r.source.trim().is_empty() {
            r.source = ReconcileConfig::default().source;
        }

        self
    }
}

/// Directory API key from the environment, if any.
pub fn windy_api_key() -> Option<String> {
    std::env::var(ENV_WINDY_API_KEY)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
