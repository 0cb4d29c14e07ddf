//! NeoWs client against a local stub server.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;

use neowatch::config::Config;
use neowatch::feed::{FeedSource, NeoWsClient, SkipReason};

fn neo(id: &str, name: &str, hazardous: bool, approaches: Value) -> Value {
    json!({
        "id": id,
        "name": name,
        "absolute_magnitude_h": 21.4,
        "estimated_diameter": {
            "kilometers": {"estimated_diameter_min": 0.12, "estimated_diameter_max": 0.27}
        },
        "is_potentially_hazardous_asteroid": hazardous,
        "close_approach_data": approaches,
    })
}

/// Echoes the requested day and key back so the query string is checked too.
async fn feed(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let day = q.get("start_date").cloned().unwrap_or_default();
    let key = q.get("api_key").cloned().unwrap_or_default();
    let pass = json!([{
        "close_approach_date": day,
        "relative_velocity": {"kilometers_per_hour": "61234.5"},
        "miss_distance": {"kilometers": "3981234.25"},
        "orbiting_body": "Earth",
    }]);
    Json(json!({
        "element_count": 2,
        "near_earth_objects": {
            day.clone(): [
                neo("3542519", &format!("(2010 PK9) key={}", key), true, pass),
                neo("3727639", "(2015 RQ36)", false, json!([])),
            ]
        }
    }))
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/feed", get(feed))
        .route("/denied", get(|| async { (StatusCode::FORBIDDEN, "API_KEY_INVALID") }))
        .route("/links", get(|| async { Json(json!({"links": {"self": "x"}})) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, path: &str) -> NeoWsClient {
    let cfg = Config {
        feed_url: format!("http://{}{}", addr, path),
        api_key: "DEMO_KEY".to_string(),
        http_timeout_secs: 5,
        ..Config::default()
    };
    NeoWsClient::new(&cfg).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[tokio::test]
async fn ok_response_is_flattened_and_skips_reported() {
    let addr = spawn_stub().await;
    let batch = client(addr, "/feed").fetch(day()).await.unwrap();

    assert_eq!(batch.records.len(), 1);
    let rec = &batch.records[0];
    assert_eq!(rec.id, "3542519");
    assert_eq!(rec.name, "(2010 PK9) key=DEMO_KEY");
    assert_eq!(rec.close_approach_date, "2024-06-01");
    assert_eq!(rec.is_potentially_hazardous_asteroid, Some(true));
    assert_eq!(rec.estimated_diameter_max_km, Some(0.27));
    assert_eq!(rec.relative_velocity_kmph, Some(61234.5));
    assert_eq!(rec.miss_distance_km, Some(3981234.25));
    assert_eq!(rec.orbiting_body, "Earth");

    assert_eq!(
        batch.skipped,
        vec![SkipReason::NoCloseApproach {
            id: "3727639".to_string()
        }]
    );
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let addr = spawn_stub().await;
    let err = client(addr, "/denied").fetch(day()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("403"), "{:#}", err);
}

#[tokio::test]
async fn wrong_body_shape_is_an_error() {
    let addr = spawn_stub().await;
    let err = client(addr, "/links").fetch(day()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("decode feed body"), "{:#}", err);
}
