// tests/store_sqlite.rs
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use terminator_webcams::classify::Classified;
use terminator_webcams::geo::Phase;
use terminator_webcams::ingest::types::{
    CameraLocation, Category, ExternalCameraRecord, WebcamUrls,
};
use terminator_webcams::store::{reconcile, NewWebcam, SqliteStore, WebcamStore};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

async fn memory_store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

fn new_webcam(id: &str, lat: f64, lng: f64) -> NewWebcam {
    let mut rec = ExternalCameraRecord::new(id, lat, lng);
    rec.title = Some(format!("Camera {id}"));
    rec.view_count = Some(10);
    rec.location = Some(CameraLocation {
        city: Some("Bergen".into()),
        country: Some("Norway".into()),
        ..CameraLocation::at(lat, lng)
    });
    NewWebcam::from_record("windy", &rec).unwrap()
}

#[tokio::test]
async fn upsert_is_keyed_by_source_and_external_id() {
    let store = memory_store().await;
    let w = new_webcam("42", 60.39, 5.32);

    let id = store.upsert_webcam(&w, t(0)).await.unwrap();
    let again = store.upsert_webcam(&w, t(5)).await.unwrap();
    assert_eq!(id, again);

    let other_source = NewWebcam {
        source: "other".into(),
        ..w.clone()
    };
    let other = store.upsert_webcam(&other_source, t(5)).await.unwrap();
    assert_ne!(id, other);

    let row = store.find_webcam("windy", "42").await.unwrap().unwrap();
    assert_eq!(row.id, id);
    assert_eq!(row.location.city.as_deref(), Some("Bergen"));
    assert_eq!(row.created_at, t(0));
    assert_eq!(row.updated_at, t(0));
    assert_eq!(row.last_fetched_at, t(5));
}

#[tokio::test]
async fn updated_at_moves_only_on_tracked_changes() {
    let store = memory_store().await;
    let mut w = new_webcam("42", 60.39, 5.32);
    store.upsert_webcam(&w, t(0)).await.unwrap();

    w.view_count = Some(11);
    w.location.region = Some("Vestland".into());
    store.upsert_webcam(&w, t(5)).await.unwrap();
    let row = store.find_webcam("windy", "42").await.unwrap().unwrap();
    assert_eq!(row.updated_at, t(0));
    assert_eq!(row.view_count, Some(11));
    assert_eq!(row.location.region.as_deref(), Some("Vestland"));

    w.metadata.urls = Some(WebcamUrls {
        detail: Some("https://example.org/42".into()),
        ..Default::default()
    });
    store.upsert_webcam(&w, t(10)).await.unwrap();
    let row = store.find_webcam("windy", "42").await.unwrap().unwrap();
    assert_eq!(row.updated_at, t(10));

    w.location.lat = 60.4;
    store.upsert_webcam(&w, t(15)).await.unwrap();
    let row = store.find_webcam("windy", "42").await.unwrap().unwrap();
    assert_eq!(row.updated_at, t(15));
}

#[tokio::test]
async fn metadata_round_trips_absent_and_empty() {
    let store = memory_store().await;
    let mut w = new_webcam("42", 60.39, 5.32);
    w.metadata.categories = Some(vec![]);
    store.upsert_webcam(&w, t(0)).await.unwrap();

    let mut v = new_webcam("43", 61.0, 5.0);
    v.metadata.categories = Some(vec![Category {
        id: "mountain".into(),
        name: "Mountain".into(),
    }]);
    store.upsert_webcam(&v, t(0)).await.unwrap();

    let row = store.find_webcam("windy", "42").await.unwrap().unwrap();
    assert_eq!(row.metadata.categories, Some(vec![]));
    assert_eq!(row.metadata.images, None);
    let row = store.find_webcam("windy", "43").await.unwrap().unwrap();
    assert_eq!(row.metadata, v.metadata);
}

#[tokio::test]
async fn deactivate_missing_respects_phase_and_keep_list() {
    let store = memory_store().await;
    let a = store.upsert_webcam(&new_webcam("a", 1.0, 1.0), t(0)).await.unwrap();
    let b = store.upsert_webcam(&new_webcam("b", 2.0, 2.0), t(0)).await.unwrap();
    let c = store.upsert_webcam(&new_webcam("c", 3.0, 3.0), t(0)).await.unwrap();
    store.upsert_terminator_state(a, Phase::Sunrise, 0, t(0)).await.unwrap();
    store.upsert_terminator_state(b, Phase::Sunrise, 1, t(0)).await.unwrap();
    store.upsert_terminator_state(c, Phase::Sunset, 0, t(0)).await.unwrap();

    let n = store.deactivate_missing(Phase::Sunrise, &[a], t(5)).await.unwrap();
    assert_eq!(n, 1);
    let sb = store.terminator_state(b, Phase::Sunrise).await.unwrap().unwrap();
    assert!(!sb.active);
    assert_eq!(sb.updated_at, t(5));
    assert!(store.terminator_state(c, Phase::Sunset).await.unwrap().unwrap().active);

    // Already inactive rows are not counted again; empty keep clears the phase.
    assert_eq!(store.deactivate_missing(Phase::Sunrise, &[a], t(6)).await.unwrap(), 0);
    assert_eq!(store.deactivate_missing(Phase::Sunset, &[], t(7)).await.unwrap(), 1);

    store.upsert_terminator_state(b, Phase::Sunrise, 3, t(8)).await.unwrap();
    let sb = store.terminator_state(b, Phase::Sunrise).await.unwrap().unwrap();
    assert!(sb.active);
    assert_eq!(sb.rank, 3);
    assert_eq!(sb.last_seen_at, t(8));
}

#[tokio::test]
async fn active_list_is_ordered_and_filtered_by_status() {
    let store = memory_store().await;
    let a = store.upsert_webcam(&new_webcam("a", 1.0, 1.0), t(0)).await.unwrap();
    let b = store.upsert_webcam(&new_webcam("b", 2.0, 2.0), t(0)).await.unwrap();
    let c = store.upsert_webcam(&new_webcam("c", 3.0, 3.0), t(0)).await.unwrap();
    store.upsert_terminator_state(c, Phase::Sunset, 0, t(0)).await.unwrap();
    store.upsert_terminator_state(b, Phase::Sunrise, 1, t(0)).await.unwrap();
    store.upsert_terminator_state(a, Phase::Sunrise, 0, t(0)).await.unwrap();

    let rows = store.active_terminator_webcams(2000).await.unwrap();
    let got: Vec<(Phase, i64, i64)> = rows.iter().map(|r| (r.phase, r.rank, r.webcam.id)).collect();
    assert_eq!(got, vec![(Phase::Sunrise, 0, a), (Phase::Sunrise, 1, b), (Phase::Sunset, 0, c)]);

    // The directory now reports "a" as inactive.
    let mut a_off = new_webcam("a", 1.0, 1.0);
    a_off.status = Some("inactive".into());
    store.upsert_webcam(&a_off, t(5)).await.unwrap();
    let rows = store.active_terminator_webcams(2000).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].webcam.external_id, "b");

    assert_eq!(store.active_terminator_webcams(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn state_for_unknown_webcam_is_a_record_error() {
    let store = memory_store().await;
    let err = store
        .upsert_terminator_state(9999, Phase::Sunrise, 0, t(0))
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn reconcile_against_a_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("terminator.db").display());

    {
        let store = Arc::new(SqliteStore::connect(&url).await.unwrap());
        let input = Classified {
            sunrise: vec![ExternalCameraRecord::new("a", 10.0, -70.0)],
            sunset: vec![ExternalCameraRecord::new("b", -10.0, 100.0)],
        };
        let report = reconcile(store.clone(), "windy", &input, 4, t(0)).await.unwrap();
        assert_eq!(report.states_written, 2);
    }

    let store = SqliteStore::connect(&url).await.unwrap();
    let rows = store.active_terminator_webcams(2000).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].phase, Phase::Sunrise);
    assert_eq!(rows[1].webcam.external_id, "b");
}

#[tokio::test]
async fn recent_webcams_lists_changed_rows_first() {
    let store = memory_store().await;
    let a = store.upsert_webcam(&new_webcam("a", 1.0, 1.0), t(0)).await.unwrap();
    let b = store.upsert_webcam(&new_webcam("b", 2.0, 2.0), t(0)).await.unwrap();
    let c = store.upsert_webcam(&new_webcam("c", 3.0, 3.0), t(0)).await.unwrap();

    // Same content later: only the fetch time moves.
    store.upsert_webcam(&new_webcam("c", 3.0, 3.0), t(10)).await.unwrap();
    let mut b_renamed = new_webcam("b", 2.0, 2.0);
    b_renamed.title = Some("Renamed".into());
    store.upsert_webcam(&b_renamed, t(10)).await.unwrap();

    let rows = store.recent_webcams(5000).await.unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![b, a, c]);
    assert_eq!(rows[0].updated_at, t(10));

    assert_eq!(store.recent_webcams(1).await.unwrap().len(), 1);
}
