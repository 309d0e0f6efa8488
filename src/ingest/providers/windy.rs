// src/ingest/providers/windy.rs
//! Windy webcams v3 directory (`/webcams/api/v3/map/clusters`).

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::geo::{normalize_deg, Location};
use crate::ingest::types::{
    CameraDirectory, CameraLocation, CameraMetadata, Category, ExternalCameraRecord, WebcamImages,
    WebcamPlayer, WebcamUrls,
};

pub const DEFAULT_BASE_URL: &str = "https://api.windy.com";
const CLUSTERS_PATH: &str = "/webcams/api/v3/map/clusters";
const API_KEY_HEADER: &str = "x-windy-api-key";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WindyId {
    Num(i64),
    Text(String),
}

impl WindyId {
    fn into_string(self) -> String {
        match self {
            WindyId::Num(n) => n.to_string(),
            WindyId::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WindyLocation {
    latitude: f64,
    longitude: f64,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    continent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindyWebcam {
    webcam_id: WindyId,
    title: Option<String>,
    view_count: Option<i64>,
    status: Option<String>,
    location: Option<WindyLocation>,
    images: Option<WebcamImages>,
    urls: Option<WebcamUrls>,
    player: Option<WebcamPlayer>,
    categories: Option<Vec<Category>>,
}

impl From<WindyWebcam> for ExternalCameraRecord {
    fn from(w: WindyWebcam) -> Self {
        ExternalCameraRecord {
            external_id: w.webcam_id.into_string(),
            title: w.title,
            view_count: w.view_count,
            status: w.status,
            location: w.location.map(|l| CameraLocation {
                lat: l.latitude,
                lng: l.longitude,
                city: l.city,
                region: l.region,
                country: l.country,
                continent: l.continent,
            }),
            metadata: CameraMetadata {
                images: w.images,
                urls: w.urls,
                player: w.player,
                categories: w.categories,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClustersBody {
    List(Vec<serde_json::Value>),
    Wrapped { webcams: Vec<serde_json::Value> },
}

/// Parse a clusters response. Entries that do not parse are skipped one by
/// one; only a body that is not a list at all is an error.
pub fn parse_clusters(body: &str) -> Result<Vec<ExternalCameraRecord>> {
    let t0 = std::time::Instant::now();
    let parsed: ClustersBody = serde_json::from_str(body).context("parsing windy clusters json")?;
    let entries = match parsed {
        ClustersBody::List(v) => v,
        ClustersBody::Wrapped { webcams } => webcams,
    };

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<WindyWebcam>(entry) {
            Ok(w) => out.push(ExternalCameraRecord::from(w)),
            Err(e) => {
                tracing::warn!(target: "fetch", error = %e, "skipping malformed windy webcam");
                counter!("ingest_malformed_records_total").increment(1);
            }
        }
    }

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// Search box for a query centre. `west <= east` always holds; a search
/// area that crosses the antimeridian is covered by two boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl QueryBox {
    /// Boxes covering `center ± radius_deg`. One box normally, two when the
    /// longitude span runs past ±180.
    pub fn around(center: Location, radius_deg: f64) -> Vec<Self> {
        let north = (center.lat + radius_deg).min(90.0);
        let south = (center.lat - radius_deg).max(-90.0);
        let lng = normalize_deg(center.lng);
        let (west, east) = (lng - radius_deg, lng + radius_deg);
        let span = |west: f64, east: f64| Self {
            north,
            south,
            east,
            west,
        };

        if radius_deg >= 180.0 {
            vec![span(-180.0, 180.0)]
        } else if west < -180.0 {
            vec![span(west + 360.0, 180.0), span(-180.0, east)]
        } else if east > 180.0 {
            vec![span(west, 180.0), span(-180.0, east - 360.0)]
        } else {
            vec![span(west, east)]
        }
    }

    pub fn contains(&self, p: Location) -> bool {
        (self.south..=self.north).contains(&p.lat) && (self.west..=self.east).contains(&p.lng)
    }
}

pub struct WindyDirectory {
    mode: Mode,
}

enum Mode {
    /// Canned clusters body; queries return the cameras inside the box.
    Fixture(Vec<ExternalCameraRecord>),
    Http {
        base_url: String,
        api_key: String,
        client: reqwest::Client,
    },
}

impl WindyDirectory {
    pub fn from_fixture(body: &str) -> Result<Self> {
        Ok(Self {
            mode: Mode::Fixture(parse_clusters(body)?),
        })
    }

    /// The HTTP client is built once here and shared by every query of every run.
    pub fn from_api_key(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("terminator-webcams/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building windy http client")?;
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
                client,
            },
        })
    }

    async fn fetch_http(
        base_url: &str,
        api_key: &str,
        client: &reqwest::Client,
        bbox: QueryBox,
    ) -> Result<Vec<ExternalCameraRecord>> {
        let url = format!("{base_url}{CLUSTERS_PATH}");
        let resp = client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(API_KEY_HEADER, api_key)
            .query(&[
                ("lang", "en".to_string()),
                ("northLat", bbox.north.to_string()),
                ("southLat", bbox.south.to_string()),
                ("eastLon", bbox.east.to_string()),
                ("westLon", bbox.west.to_string()),
                ("zoom", "4".to_string()),
                ("include", "images".to_string()),
                ("include", "urls".to_string()),
                ("include", "player".to_string()),
                ("include", "location".to_string()),
                ("include", "categories".to_string()),
            ])
            .send()
            .await
            .context("windy http get()")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("windy returned {status}"));
        }
        let body = resp.text().await.context("windy http .text()")?;
        parse_clusters(&body)
    }
}

#[async_trait]
impl CameraDirectory for WindyDirectory {
    async fn cameras_near(
        &self,
        center: Location,
        radius_deg: f64,
    ) -> Result<Vec<ExternalCameraRecord>> {
        let boxes = QueryBox::around(center, radius_deg);
        match &self.mode {
            Mode::Fixture(all) => Ok(all
                .iter()
                .filter(|c| {
                    c.point()
                        .is_some_and(|p| boxes.iter().any(|b| b.contains(p)))
                })
                .cloned()
                .collect()),
            Mode::Http {
                base_url,
                api_key,
                client,
            } => {
                if let [bbox] = boxes.as_slice() {
                    return Self::fetch_http(base_url, api_key, client, *bbox).await;
                }
                // Both halves of a split box; a camera can only sit in one.
                let mut by_id: BTreeMap<String, ExternalCameraRecord> = BTreeMap::new();
                for bbox in boxes {
                    for cam in Self::fetch_http(base_url, api_key, client, bbox).await? {
                        by_id.insert(cam.external_id.clone(), cam);
                    }
                }
                Ok(by_id.into_values().collect())
            }
        }
    }

    fn name(&self) -> &'static str {
        "windy"
    }
}
