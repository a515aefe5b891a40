use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use super::{pipeline, sample_embedder, sample_loader};
use crate::config::Config;
use crate::web::{router, SharedState};

fn app() -> Router {
    let config = Config::default();
    let corpora: Vec<&str> = config.corpora.keys().map(String::as_str).collect();
    let pipeline = pipeline(
        Arc::new(sample_loader()),
        Arc::new(sample_embedder()),
        &corpora,
    );

    router(SharedState::new(Arc::new(pipeline), Arc::new(config.clone())))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_api_search() {
    let (status, json) = get_json(
        app(),
        "/api/search?corpus=interstellar&text=great&per_page=2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["corpus"], "interstellar");
    assert_eq!(json["total_results"], 3);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["page"], 1);
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["items"][0]["row"], 0);
    assert_eq!(json["items"][0]["text"], "A stunning journey");
}

#[tokio::test]
async fn test_api_search_defaults_to_configured_corpus() {
    let (status, json) = get_json(app(), "/api/search?text=great").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["corpus"], "interstellar");
    assert_eq!(json["per_page"], 10);
}

#[tokio::test]
async fn test_api_search_limit() {
    let (_, json) = get_json(
        app(),
        "/api/search?text=great&limit=2&per_page=1&page=2",
    )
    .await;
    assert_eq!(json["total_results"], 2);
    assert_eq!(json["items"][0]["row"], 1);

    // unusable limits are ignored
    for limit in ["", "abc", "0"] {
        let (status, json) =
            get_json(app(), &format!("/api/search?text=great&limit={limit}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_results"], 3);
    }
}

#[tokio::test]
async fn test_api_search_errors() {
    let (status, json) = get_json(app(), "/api/search?text=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));

    let (status, _) = get_json(app(), "/api/search?text=great&corpus=matrix").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // configured, but nothing was built for it
    let (status, _) = get_json(app(), "/api/search?text=great&corpus=fightclub").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(app(), "/api/search?text=great&per_page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(app(), "/api/search?text=great&per_page=51").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(app(), "/api/search?text=great&page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_corpora() {
    let app = app();
    let (_, _) = get(app.clone(), "/api/search?text=great").await;

    let (status, json) = get_json(app, "/api/corpora").await;

    assert_eq!(status, StatusCode::OK);
    let corpora = json.as_array().unwrap();
    assert_eq!(corpora.len(), 2);
    assert_eq!(corpora[0]["name"], "fightclub");
    assert_eq!(corpora[0]["title"], "Fight Club");
    assert_eq!(corpora[0]["loaded"], false);
    assert_eq!(corpora[1]["name"], "interstellar");
    assert_eq!(corpora[1]["loaded"], true);
}

#[tokio::test]
async fn test_index_page() {
    let (status, body) = get(app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Enter a critique"));

    let (status, body) = get(app(), "/?text=great&per_page=1").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("(3 critiques)"));
    assert!(html.contains("A stunning journey"));
    assert!(!html.contains("Too long for me"));
    assert!(html.contains("page=3"));
}
