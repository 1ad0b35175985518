mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::{is_pdf, is_png, is_svg, sample_dashboard};
use plotdash::server::build_router;

async fn get(uri: &str) -> Response {
    build_router(sample_dashboard())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn test_histogram_defaults_to_png() {
    let response = get("/hist/q1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");
    assert!(is_png(&body_bytes(response).await));
}

#[tokio::test]
async fn test_histogram_with_floor() {
    let response = get("/hist/q1?floor=2&fmt=svg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/svg+xml");
    assert!(is_svg(&body_bytes(response).await));
}

#[tokio::test]
async fn test_unsupported_format_is_bad_request() {
    let response = get("/hist/q1?fmt=bmp").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_format_checked_before_lookup() {
    // The variable does not exist, but the format is rejected first
    let response = get("/hist/nope?fmt=gif").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_variable_is_not_found() {
    let response = get("/hist/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get("/comp/q1/nope/count").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_comparison_kind() {
    let response = get("/comp/q1/q2/pie").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_grouped_percentage_with_keepna() {
    let response = get("/comp/q1/q2/grppst?keepna=true&floor=0&fmt=svg").await;
    assert_eq!(response.status(), StatusCode::OK);
    let svg = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(svg.contains("No answer"));
}

#[tokio::test]
async fn test_format_alias() {
    let response = get("/comp/q1/q2/mean?format=pdf").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/pdf");
    assert!(is_pdf(&body_bytes(response).await));
}

#[tokio::test]
async fn test_map_route() {
    let response = get("/map/q2/gt/1?fmt=ps").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/postscript");

    let response = get("/map/q2/whatever/0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");
}

#[tokio::test]
async fn test_landing_page() {
    let response = get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/html"));
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("Comparison counts"));
}
