use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use filedrop::middleware::allow_any_origin_on_json;
use serde_json::json;
use tower::util::ServiceExt;

fn app() -> Router {
    Router::new()
        .route("/json", get(|| async { Json(json!({ "url": "x" })) }))
        .route("/text", get(|| async { "hello" }))
        .layer(from_fn(allow_any_origin_on_json))
}

#[tokio::test]
async fn test_json_responses_allow_any_origin() {
    let response = app()
        .oneshot(Request::builder().uri("/json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_other_responses_untouched() {
    let response = app()
        .oneshot(Request::builder().uri("/text").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
