// tests/providers_windy.rs
use std::fs;
use std::time::Duration;

use terminator_webcams::geo::Location;
use terminator_webcams::ingest::providers::windy::{parse_clusters, WindyDirectory};
use terminator_webcams::ingest::types::CameraDirectory;

fn fixture() -> String {
    fs::read_to_string("tests/fixtures/windy_clusters.json")
        .expect("missing tests/fixtures/windy_clusters.json")
}

#[test]
fn fixture_parses_and_skips_malformed_entries() {
    let cams = parse_clusters(&fixture()).expect("clusters parse ok");

    // Six entries: one without an id and one with a text latitude are dropped.
    let ids: Vec<&str> = cams.iter().map(|c| c.external_id.as_str()).collect();
    assert_eq!(ids, vec!["1010101010", "1020202020", "1030303030", "1040404040"]);

    let harbour = &cams[0];
    assert_eq!(harbour.title.as_deref(), Some("Reykjavik: Harbour"));
    assert_eq!(harbour.view_count, Some(183422));
    let loc = harbour.location.as_ref().unwrap();
    assert_eq!(loc.city.as_deref(), Some("Reykjavik"));
    assert_eq!(loc.continent.as_deref(), Some("Europe"));
    let images = harbour.metadata.images.as_ref().unwrap();
    assert!(images.current.is_some());
    assert!(images.daylight.is_none());
    assert_eq!(images.sizes.as_ref().unwrap().preview.unwrap().width, 400);
    assert_eq!(harbour.metadata.categories.as_ref().unwrap().len(), 2);

    // Empty list and absent field stay distinguishable.
    assert_eq!(cams[1].metadata.categories, Some(vec![]));
    assert_eq!(cams[2].metadata.categories, None);
    assert!(cams[3].location.is_none());
}

#[test]
fn wrapped_body_is_accepted() {
    let body = r#"{"webcams": [{"webcamId": 7, "location": {"latitude": 1.0, "longitude": 2.0}}]}"#;
    let cams = parse_clusters(body).unwrap();
    assert_eq!(cams.len(), 1);
    assert_eq!(cams[0].external_id, "7");
}

#[tokio::test]
async fn fixture_directory_answers_by_bounding_box() {
    let dir = WindyDirectory::from_fixture(&fixture()).unwrap();
    assert_eq!(dir.name(), "windy");

    let near_iceland = dir.cameras_near(Location::new(64.0, -21.0), 9.0).await.unwrap();
    let mut ids: Vec<String> = near_iceland.into_iter().map(|c| c.external_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["1010101010", "1020202020"]);

    let pacific = dir.cameras_near(Location::new(0.0, -150.0), 9.0).await.unwrap();
    assert!(pacific.is_empty());
}

#[tokio::test]
async fn unreachable_directory_is_an_error() {
    let dir = WindyDirectory::from_api_key("http://127.0.0.1:9", "test-key", Duration::from_secs(1))
        .unwrap();
    assert!(dir.cameras_near(Location::new(0.0, 0.0), 9.0).await.is_err());
}

#[tokio::test]
async fn fixture_directory_sees_across_the_antimeridian() {
    let body = r#"[
        {"webcamId": 1, "title": "Taveuni", "location": {"latitude": 0.0, "longitude": 179.0}},
        {"webcamId": 2, "title": "Apia", "location": {"latitude": 0.0, "longitude": -174.0}},
        {"webcamId": 3, "title": "Far", "location": {"latitude": 0.0, "longitude": 160.0}}
    ]"#;
    let dir = WindyDirectory::from_fixture(body).unwrap();

    let from_west = dir.cameras_near(Location::new(0.0, -178.0), 9.0).await.unwrap();
    let mut ids: Vec<String> = from_west.into_iter().map(|c| c.external_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2"]);

    let from_east = dir.cameras_near(Location::new(0.0, 178.0), 9.0).await.unwrap();
    let mut ids: Vec<String> = from_east.into_iter().map(|c| c.external_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2"]);
}
