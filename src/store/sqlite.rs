// src/store/sqlite.rs
//! SQLite-backed store (sqlx, runtime-checked queries).

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use super::{
    MetadataColumns, NewWebcam, StoreError, TerminatorState, TerminatorWebcam, WebcamId,
    WebcamRecord, WebcamStore,
};
use crate::geo::Phase;
use crate::ingest::types::CameraLocation;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS webcams ( \
        id INTEGER PRIMARY KEY AUTOINCREMENT, \
        source TEXT NOT NULL, \
        external_id TEXT NOT NULL, \
        title TEXT, \
        status TEXT, \
        view_count INTEGER, \
        lat REAL NOT NULL, \
        lng REAL NOT NULL, \
        city TEXT, \
        region TEXT, \
        country TEXT, \
        continent TEXT, \
        images TEXT, \
        urls TEXT, \
        player TEXT, \
        categories TEXT, \
        rating REAL, \
        orientation TEXT, \
        last_fetched_at TEXT NOT NULL, \
        updated_at TEXT NOT NULL, \
        created_at TEXT NOT NULL, \
        UNIQUE (source, external_id))",
    "CREATE TABLE IF NOT EXISTS terminator_states ( \
        webcam_id INTEGER NOT NULL REFERENCES webcams(id) ON DELETE CASCADE, \
        phase TEXT NOT NULL CHECK (phase IN ('sunrise', 'sunset')), \
        rank INTEGER NOT NULL, \
        last_seen_at TEXT NOT NULL, \
        active INTEGER NOT NULL DEFAULT 1, \
        updated_at TEXT NOT NULL, \
        PRIMARY KEY (webcam_id, phase))",
    "CREATE INDEX IF NOT EXISTS terminator_states_active_idx \
        ON terminator_states (active, phase, rank)",
];

/// Column list for the `webcams` table.
const WEBCAM_COLUMNS: &str = "id, source, external_id, title, status, view_count, lat, lng, \
     city, region, country, continent, images, urls, player, categories, rating, orientation, \
     last_fetched_at, updated_at, created_at";

const STATE_COLUMNS: &str = "webcam_id, phase, rank, last_seen_at, active, updated_at";

#[derive(sqlx::FromRow)]
struct WebcamRow {
    id: i64,
    source: String,
    external_id: String,
    title: Option<String>,
    status: Option<String>,
    view_count: Option<i64>,
    lat: f64,
    lng: f64,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    continent: Option<String>,
    images: Option<String>,
    urls: Option<String>,
    player: Option<String>,
    categories: Option<String>,
    rating: Option<f64>,
    orientation: Option<String>,
    last_fetched_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WebcamRow> for WebcamRecord {
    type Error = StoreError;

    fn try_from(r: WebcamRow) -> Result<Self, StoreError> {
        let metadata = MetadataColumns {
            images: r.images,
            urls: r.urls,
            player: r.player,
            categories: r.categories,
        }
        .decode()
        .map_err(|e| StoreError::Record(format!("webcam {} metadata: {e}", r.id)))?;

        Ok(WebcamRecord {
            id: r.id,
            source: r.source,
            external_id: r.external_id,
            title: r.title,
            status: r.status,
            view_count: r.view_count,
            location: CameraLocation {
                lat: r.lat,
                lng: r.lng,
                city: r.city,
                region: r.region,
                country: r.country,
                continent: r.continent,
            },
            metadata,
            rating: r.rating,
            orientation: r.orientation,
            last_fetched_at: r.last_fetched_at,
            updated_at: r.updated_at,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StateRow {
    webcam_id: i64,
    phase: String,
    rank: i64,
    last_seen_at: DateTime<Utc>,
    active: bool,
    updated_at: DateTime<Utc>,
}

fn parse_phase(s: &str) -> Result<Phase, StoreError> {
    Phase::parse(s).ok_or_else(|| StoreError::Record(format!("unknown phase {s:?}")))
}

impl TryFrom<StateRow> for TerminatorState {
    type Error = StoreError;

    fn try_from(r: StateRow) -> Result<Self, StoreError> {
        Ok(TerminatorState {
            webcam_id: r.webcam_id,
            phase: parse_phase(&r.phase)?,
            rank: r.rank,
            last_seen_at: r.last_seen_at,
            active: r.active,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JoinedRow {
    state_phase: String,
    state_rank: i64,
    #[sqlx(flatten)]
    webcam: WebcamRow,
}

/// Connection-level failures stop the run; anything else is one bad write.
fn store_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Configuration(_)
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        other => StoreError::Record(other.to_string()),
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating the file if needed) and make sure the tables exist.
    ///
    /// In-memory URLs get a single connection that never idles out, since
    /// each SQLite memory connection is its own database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)
            .map_err(store_err)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        }
        .connect_with(opts)
        .await
        .map_err(store_err)?;

        let store = Self { pool };
        store.ensure_schema().await?;
        tracing::info!(target: "reconcile", in_memory, "sqlite store ready");
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(format!("creating schema: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl WebcamStore for SqliteStore {
    async fn upsert_webcam(
        &self,
        webcam: &NewWebcam,
        now: DateTime<Utc>,
    ) -> Result<WebcamId, StoreError> {
        let meta = MetadataColumns::encode(&webcam.metadata).map_err(|e| {
            StoreError::Malformed {
                external_id: webcam.external_id.clone(),
                reason: format!("metadata: {e}"),
            }
        })?;
        let loc = &webcam.location;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO webcams (source, external_id, title, status, view_count, lat, lng, \
                city, region, country, continent, images, urls, player, categories, \
                last_fetched_at, updated_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (source, external_id) DO UPDATE SET \
                updated_at = CASE WHEN \
                    webcams.title IS NOT excluded.title \
                    OR webcams.status IS NOT excluded.status \
                    OR webcams.lat IS NOT excluded.lat \
                    OR webcams.lng IS NOT excluded.lng \
                    OR webcams.images IS NOT excluded.images \
                    OR webcams.urls IS NOT excluded.urls \
                    OR webcams.player IS NOT excluded.player \
                    OR webcams.categories IS NOT excluded.categories \
                  THEN excluded.updated_at ELSE webcams.updated_at END, \
                title = excluded.title, \
                status = excluded.status, \
                view_count = excluded.view_count, \
                lat = excluded.lat, \
                lng = excluded.lng, \
                city = excluded.city, \
                region = excluded.region, \
                country = excluded.country, \
                continent = excluded.continent, \
                images = excluded.images, \
                urls = excluded.urls, \
                player = excluded.player, \
                categories = excluded.categories, \
                last_fetched_at = excluded.last_fetched_at \
             RETURNING id",
        )
        .bind(&webcam.source)
        .bind(&webcam.external_id)
        .bind(&webcam.title)
        .bind(&webcam.status)
        .bind(webcam.view_count)
        .bind(loc.lat)
        .bind(loc.lng)
        .bind(&loc.city)
        .bind(&loc.region)
        .bind(&loc.country)
        .bind(&loc.continent)
        .bind(&meta.images)
        .bind(&meta.urls)
        .bind(&meta.player)
        .bind(&meta.categories)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(id)
    }

    async fn upsert_terminator_state(
        &self,
        webcam_id: WebcamId,
        phase: Phase,
        rank: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO terminator_states (webcam_id, phase, rank, last_seen_at, active, updated_at) \
             VALUES (?, ?, ?, ?, 1, ?) \
             ON CONFLICT (webcam_id, phase) DO UPDATE SET \
                rank = excluded.rank, \
                last_seen_at = excluded.last_seen_at, \
                active = 1, \
                updated_at = excluded.updated_at",
        )
        .bind(webcam_id)
        .bind(phase.as_str())
        .bind(rank)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn deactivate_missing(
        &self,
        phase: Phase,
        keep: &[WebcamId],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE terminator_states SET active = 0, updated_at = ");
        qb.push_bind(now);
        qb.push(" WHERE phase = ");
        qb.push_bind(phase.as_str());
        qb.push(" AND active = 1");
        if !keep.is_empty() {
            qb.push(" AND webcam_id NOT IN (");
            let mut ids = qb.separated(", ");
            for id in keep {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
        }

        let res = qb.build().execute(&self.pool).await.map_err(store_err)?;
        Ok(res.rows_affected())
    }

    async fn find_webcam(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<WebcamRecord>, StoreError> {
        let query =
            format!("SELECT {WEBCAM_COLUMNS} FROM webcams WHERE source = ? AND external_id = ?");
        let row = sqlx::query_as::<_, WebcamRow>(&query)
            .bind(source)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(WebcamRecord::try_from).transpose()
    }

    async fn terminator_state(
        &self,
        webcam_id: WebcamId,
        phase: Phase,
    ) -> Result<Option<TerminatorState>, StoreError> {
        let query = format!(
            "SELECT {STATE_COLUMNS} FROM terminator_states WHERE webcam_id = ? AND phase = ?"
        );
        let row = sqlx::query_as::<_, StateRow>(&query)
            .bind(webcam_id)
            .bind(phase.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(TerminatorState::try_from).transpose()
    }

    async fn active_terminator_webcams(
        &self,
        limit: usize,
    ) -> Result<Vec<TerminatorWebcam>, StoreError> {
        let columns = WEBCAM_COLUMNS
            .split(',')
            .map(|c| format!("w.{c} AS {c}", c = c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT s.phase AS state_phase, s.rank AS state_rank, {columns} \
             FROM terminator_states s \
             JOIN webcams w ON w.id = s.webcam_id \
             WHERE s.active = 1 AND w.status = 'active' \
             ORDER BY CASE s.phase WHEN 'sunrise' THEN 0 ELSE 1 END, s.rank \
             LIMIT ?"
        );
        let rows = sqlx::query_as::<_, JoinedRow>(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        rows.into_iter()
            .map(|r| {
                Ok(TerminatorWebcam {
                    phase: parse_phase(&r.state_phase)?,
                    rank: r.state_rank,
                    webcam: WebcamRecord::try_from(r.webcam)?,
                })
            })
            .collect()
    }

    async fn recent_webcams(&self, limit: usize) -> Result<Vec<WebcamRecord>, StoreError> {
        let query = format!(
            "SELECT {WEBCAM_COLUMNS} FROM webcams ORDER BY updated_at DESC, id ASC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, WebcamRow>(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter().map(WebcamRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::ingest::types::ExternalCameraRecord;

    #[tokio::test]
    async fn upsert_leaves_rating_and_orientation_alone() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        let w = NewWebcam::from_record("windy", &ExternalCameraRecord::new("42", 60.39, 5.32))
            .unwrap();
        let id = store.upsert_webcam(&w, now).await.unwrap();

        sqlx::query("UPDATE webcams SET rating = ?, orientation = ? WHERE id = ?")
            .bind(4.5)
            .bind("landscape")
            .bind(id)
            .execute(&store.pool)
            .await
            .unwrap();

        store
            .upsert_webcam(&w, now + chrono::Duration::minutes(5))
            .await
            .unwrap();
        let row = store.find_webcam("windy", "42").await.unwrap().unwrap();
        assert_eq!(row.rating, Some(4.5));
        assert_eq!(row.orientation.as_deref(), Some("landscape"));
    }
}
