mod common;

use bytes::Bytes;
use common::spawn_reporter;
use ecomm_reporter::models::archive::{ArchiveUrl, StoredArchive};
use futures::stream;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde_json::Value;
use std::collections::BTreeSet;

#[tokio::test]
async fn post_then_get_returns_identical_bytes() {
    let reporter = spawn_reporter().await;
    let client = reqwest::Client::new();
    let payload = r#"{"orders":[{"id":1,"total":12.5}],"generated":"today"}"#;

    let resp = client
        .post(format!("{}/api/archive", reporter.base))
        .header(CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let stored: StoredArchive = resp.json().await.unwrap();
    assert!(!stored.key.is_empty());
    assert!(stored.key.chars().all(|c| c.is_ascii_digit()));

    let resp = client
        .get(format!("{}/api/archives/{}", reporter.base, stored.key))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(resp.text().await.unwrap(), payload);
}

#[tokio::test]
async fn listing_matches_stored_keys() {
    let reporter = spawn_reporter().await;
    let keys = ["1700000000", "1700000005", "1700000010"];
    for key in keys {
        reporter
            .store
            .store_under(
                key,
                stream::once(async { Ok(Bytes::from_static(b"{}")) }),
                None,
            )
            .await
            .unwrap();
    }

    let listing: Vec<ArchiveUrl> = reqwest::get(format!("{}/api/archives", reporter.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(listing.len(), keys.len());
    let names: BTreeSet<String> = listing.iter().map(|e| e.name.clone()).collect();
    let urls: BTreeSet<String> = listing.iter().map(|e| e.url.clone()).collect();
    let expected: BTreeSet<String> = keys.iter().map(|k| k.to_string()).collect();
    assert_eq!(names, expected);
    assert_eq!(urls, expected);
}

#[tokio::test]
async fn empty_bucket_lists_nothing() {
    let reporter = spawn_reporter().await;
    let body: Value = reqwest::get(format!("{}/api/archives", reporter.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn unknown_archive_is_not_found() {
    let reporter = spawn_reporter().await;
    let resp = reqwest::get(format!("{}/api/archives/1234", reporter.base))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], 404);
    assert!(body["error"].as_str().unwrap().contains("1234"));
}

#[tokio::test]
async fn unsafe_key_is_rejected() {
    let reporter = spawn_reporter().await;
    let resp = reqwest::get(format!("{}/api/archives/..%2Fsecrets", reporter.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn readiness_checks_database_and_disk() {
    let reporter = spawn_reporter().await;
    let resp = reqwest::get(format!("{}/readyz", reporter.base))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["disk"]["ok"], true);
}
