//! Geolocation client tests against a local stand-in service
//!
//! A throwaway axum server plays both geolocation endpoints so the tests
//! exercise real HTTP, status handling, decoding and timeouts.

use async_trait::async_trait;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use geolog::config::{GeoConfig, PipelineConfig};
use geolog::geo::{CountryLookup, GeoError, GeoIdentity, GeoTimeouts, GeolocationClient};
use geolog::models::EnrichedRecord;
use geolog::pipeline::{Enricher, Pipeline};
use geolog::resolver::{NameResolver, ResolutionCache};
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

const API_KEY: &str = "test-key";

async fn by_address(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if params.get("format").map(String::as_str) != Some("json") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match params.get("ip").map(String::as_str) {
        Some("8.8.8.8") => Json(json!({
            "ip": "8.8.8.8",
            "country_code": "US",
            "country_name": "United States of America"
        }))
        .into_response(),
        Some("192.0.2.1") => "this is not json".into_response(),
        Some("192.0.2.2") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("192.0.2.3") => std::future::pending::<Response>().await,
        Some("192.0.2.4") => Json(json!({ "country_code": "" })).into_response(),
        _ => Json(json!({ "error": { "error_code": 10001 } })).into_response(),
    }
}

async fn by_domain(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match params.get("domain").map(String::as_str) {
        Some("nasa.gov") => Json(json!({ "domain": "nasa.gov", "country_code": "US" })).into_response(),
        Some("slow.example") => std::future::pending::<Response>().await,
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start the stand-in service and return its base URL.
async fn spawn_geo_service() -> String {
    let router = Router::new()
        .route("/ip", get(by_address))
        .route("/whois", get(by_domain));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn geo_config(base: &str, api_key: &str) -> GeoConfig {
    GeoConfig {
        api_key: api_key.to_string(),
        address_endpoint: format!("{base}/ip"),
        domain_endpoint: format!("{base}/whois"),
        timeouts: GeoTimeouts {
            address: Duration::from_millis(300),
            domain: Duration::from_millis(500),
        },
        max_in_flight: 100,
    }
}

async fn client() -> GeolocationClient {
    let base = spawn_geo_service().await;
    GeolocationClient::from_config(&geo_config(&base, API_KEY)).unwrap()
}

#[tokio::test]
async fn test_address_lookup() {
    let client = client().await;
    let code = client.lookup(&GeoIdentity::parse("8.8.8.8")).await.unwrap();
    assert_eq!(code, "US");
}

#[tokio::test]
async fn test_domain_lookup() {
    let client = client().await;
    let identity = GeoIdentity::parse("nasa.gov");
    assert!(!identity.is_address());
    assert_eq!(client.country_code_for(&identity).await.as_deref(), Some("US"));
}

#[tokio::test]
async fn test_failures_degrade_to_none() {
    let client = client().await;

    for ip in ["192.0.2.1", "192.0.2.2", "192.0.2.4", "198.51.100.7"] {
        let identity = GeoIdentity::parse(ip);
        assert_eq!(client.country_code_for(&identity).await, None, "{ip}");
    }
    assert_eq!(
        client
            .country_code_for(&GeoIdentity::parse("unknown.example"))
            .await,
        None
    );
}

#[tokio::test]
async fn test_error_kinds() {
    let client = client().await;

    let err = client.lookup(&GeoIdentity::parse("192.0.2.1")).await.unwrap_err();
    assert!(matches!(err, GeoError::Decode(_)), "{err}");

    let err = client.lookup(&GeoIdentity::parse("192.0.2.2")).await.unwrap_err();
    assert!(
        matches!(err, GeoError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
        "{err}"
    );

    let err = client.lookup(&GeoIdentity::parse("192.0.2.4")).await.unwrap_err();
    assert!(matches!(err, GeoError::EmptyCountryCode), "{err}");
}

#[tokio::test]
async fn test_wrong_key_is_a_status_error() {
    let base = spawn_geo_service().await;
    let client = GeolocationClient::from_config(&geo_config(&base, "wrong-key")).unwrap();

    let err = client.lookup(&GeoIdentity::parse("8.8.8.8")).await.unwrap_err();
    assert!(matches!(err, GeoError::Status(StatusCode::UNAUTHORIZED)), "{err}");
}

#[tokio::test]
async fn test_missing_key_fails_at_construction() {
    let base = spawn_geo_service().await;
    let result = GeolocationClient::from_config(&geo_config(&base, ""));
    assert!(matches!(result, Err(GeoError::MissingApiKey)));
}

#[tokio::test]
async fn test_stalled_address_lookup_times_out() {
    let client = client().await;

    let started = Instant::now();
    let err = client.lookup(&GeoIdentity::parse("192.0.2.3")).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, GeoError::Timeout(d) if d == Duration::from_millis(300)));
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn test_stalled_domain_lookup_uses_domain_timeout() {
    let client = client().await;

    let err = client
        .lookup(&GeoIdentity::parse("slow.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, GeoError::Timeout(d) if d == Duration::from_millis(500)));
}

#[tokio::test]
async fn test_unreachable_service_degrades() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = GeolocationClient::from_config(&geo_config(&base, API_KEY)).unwrap();
    assert_eq!(
        client.country_code_for(&GeoIdentity::parse("8.8.8.8")).await,
        None
    );
}

struct NoDns;

#[async_trait]
impl NameResolver for NoDns {
    async fn lookup(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_stalled_lookup_does_not_hang_batch() {
    let base = spawn_geo_service().await;
    let geo = Arc::new(GeolocationClient::from_config(&geo_config(&base, API_KEY)).unwrap());
    let cache = Arc::new(ResolutionCache::new(Arc::new(NoDns)));
    let pipeline = Pipeline::new(Enricher::new(cache, geo), &PipelineConfig::default());

    let lines = vec![
        r#"192.0.2.3 - - [01/Jul/1995:00:00:01 -0400] "GET /stalled.html HTTP/1.0" 200 10"#,
        r#"8.8.8.8 - - [01/Jul/1995:00:00:02 -0400] "GET /ok.html HTTP/1.0" 200 20"#,
    ]
    .into_iter()
    .map(|line| Ok::<_, io::Error>(line.to_string()));

    let started = Instant::now();
    let records: Vec<EnrichedRecord> = pipeline
        .run(futures::stream::iter(lines))
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_uri, "/ok.html");
    assert_eq!(records[0].country_code, "US");
    assert_eq!(pipeline.stats().snapshot().degraded, 1);
}
