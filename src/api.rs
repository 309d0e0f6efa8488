use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::auth::TriggerAuth;
use crate::geo::ring::shifted_terminator_ring;
use crate::geo::{split_arcs, subsolar_point, ArcSplit, SubsolarPoint, TerminatorRing};
use crate::ingest::types::{CameraLocation, Category, WebcamImages, WebcamPlayer, WebcamUrls};
use crate::ingest::{Pipeline, RunError};
use crate::metrics::Metrics;
use crate::store::{StoreError, TerminatorWebcam, WebcamRecord};

/// Row cap for the read endpoint.
pub const TERMINATOR_WEBCAMS_LIMIT: usize = 2000;
/// Row cap for the all-webcams listing.
pub const ALL_WEBCAMS_LIMIT: usize = 5000;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub auth: TriggerAuth,
}

/// Full router; `/metrics` is mounted when a recorder was installed.
pub fn create_router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let router = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/cron/update-terminator",
            get(update_terminator).post(update_terminator),
        )
        .route("/terminator-webcams", get(terminator_webcams))
        .route("/webcams", get(all_webcams))
        .route("/terminator/ring", get(terminator_ring))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    }
}

fn error_body(status: StatusCode, msg: impl Into<String>) -> Response {
    let body = json!({ "ok": false, "error": msg.into() });
    (status, Json(body)).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct TriggerQuery {
    secret: Option<String>,
}

async fn update_terminator(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<TriggerQuery>,
) -> Response {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if let Err(e) = state.auth.check(authorization, q.secret.as_deref()) {
        return error_body(StatusCode::UNAUTHORIZED, e.to_string());
    }

    match state.pipeline.try_run(Utc::now()).await {
        Ok(summary) => Json(summary).into_response(),
        Err(RunError::Busy) => error_body(StatusCode::CONFLICT, RunError::Busy.to_string()),
        Err(RunError::Store(e)) => {
            tracing::error!(target: "api", error = %e, "terminator update failed");
            error_body(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationView {
    latitude: f64,
    longitude: f64,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    continent: Option<String>,
}

impl From<CameraLocation> for LocationView {
    fn from(l: CameraLocation) -> Self {
        Self {
            latitude: l.lat,
            longitude: l.lng,
            city: l.city,
            region: l.region,
            country: l.country,
            continent: l.continent,
        }
    }
}

/// Client-facing webcam shape, in the directory's camelCase.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TerminatorWebcamView {
    webcam_id: i64,
    external_id: String,
    source: String,
    phase: crate::geo::Phase,
    rank: i64,
    title: Option<String>,
    view_count: Option<i64>,
    status: Option<String>,
    location: LocationView,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<WebcamImages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    urls: Option<WebcamUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    player: Option<WebcamPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<Vec<Category>>,
    rating: Option<f64>,
    orientation: Option<String>,
    last_fetched_at: DateTime<Utc>,
}

impl From<TerminatorWebcam> for TerminatorWebcamView {
    fn from(t: TerminatorWebcam) -> Self {
        let w = t.webcam;
        Self {
            webcam_id: w.id,
            external_id: w.external_id,
            source: w.source,
            phase: t.phase,
            rank: t.rank,
            title: w.title,
            view_count: w.view_count,
            status: w.status,
            location: w.location.into(),
            images: w.metadata.images,
            urls: w.metadata.urls,
            player: w.metadata.player,
            categories: w.metadata.categories,
            rating: w.rating,
            orientation: w.orientation,
            last_fetched_at: w.last_fetched_at,
        }
    }
}

fn read_error(e: StoreError, what: &str) -> Response {
    tracing::error!(target: "api", error = %e, "{what} read failed");
    let status = if e.is_fatal() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_body(status, e.to_string())
}

async fn terminator_webcams(State(state): State<AppState>) -> Response {
    match state
        .pipeline
        .store()
        .active_terminator_webcams(TERMINATOR_WEBCAMS_LIMIT)
        .await
    {
        Ok(rows) => {
            let out: Vec<TerminatorWebcamView> = rows.into_iter().map(Into::into).collect();
            Json(out).into_response()
        }
        Err(e) => read_error(e, "terminator webcams"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebcamView {
    webcam_id: i64,
    external_id: String,
    source: String,
    title: Option<String>,
    view_count: Option<i64>,
    status: Option<String>,
    location: LocationView,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<WebcamImages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    urls: Option<WebcamUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    player: Option<WebcamPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<Vec<Category>>,
    rating: Option<f64>,
    orientation: Option<String>,
    last_fetched_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<WebcamRecord> for WebcamView {
    fn from(w: WebcamRecord) -> Self {
        Self {
            webcam_id: w.id,
            external_id: w.external_id,
            source: w.source,
            title: w.title,
            view_count: w.view_count,
            status: w.status,
            location: w.location.into(),
            images: w.metadata.images,
            urls: w.metadata.urls,
            player: w.metadata.player,
            categories: w.metadata.categories,
            rating: w.rating,
            orientation: w.orientation,
            last_fetched_at: w.last_fetched_at,
            updated_at: w.updated_at,
            created_at: w.created_at,
        }
    }
}

async fn all_webcams(State(state): State<AppState>) -> Response {
    match state.pipeline.store().recent_webcams(ALL_WEBCAMS_LIMIT).await {
        Ok(rows) => {
            let out: Vec<WebcamView> = rows.into_iter().map(Into::into).collect();
            Json(out).into_response()
        }
        Err(e) => read_error(e, "webcams"),
    }
}

#[derive(Debug, Serialize)]
struct RingView {
    offset_deg: f64,
    ring: TerminatorRing,
    arcs: ArcSplit,
}

#[derive(Debug, Serialize)]
struct GeometryView {
    at: DateTime<Utc>,
    subsolar: SubsolarPoint,
    precision_deg: f64,
    sun_altitude_deg: f64,
    rings: Vec<RingView>,
}

async fn terminator_ring(State(state): State<AppState>) -> Json<GeometryView> {
    let g = &state.pipeline.config().geometry;
    let at = Utc::now();
    let subsolar = subsolar_point(at);

    let rings = g
        .ring_offsets_deg
        .iter()
        .map(|&offset_deg| {
            let ring =
                shifted_terminator_ring(&subsolar, g.precision_deg, g.sun_altitude_deg, offset_deg);
            let arcs = split_arcs(&ring, &subsolar);
            RingView {
                offset_deg,
                ring,
                arcs,
            }
        })
        .collect();

    Json(GeometryView {
        at,
        subsolar,
        precision_deg: g.precision_deg,
        sun_altitude_deg: g.sun_altitude_deg,
        rings,
    })
}
