// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;

use trump_post_analyzer::metrics::Metrics;

// Local recorder only; installing the global one would leak across tests.
fn local_metrics() -> (Metrics, metrics_exporter_prometheus::PrometheusRecorder) {
    let recorder = PrometheusBuilder::new().build_recorder();
    let metrics = Metrics {
        handle: recorder.handle(),
    };
    (metrics, recorder)
}

#[tokio::test]
async fn health_endpoint_is_ok() {
    let (exporter, _recorder) = local_metrics();
    let resp = exporter
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn metrics_endpoint_renders_recorded_series() {
    let (exporter, recorder) = local_metrics();
    metrics::with_local_recorder(&recorder, || {
        metrics::counter!("posts_collected_total").increment(3);
    });

    let resp = exporter
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("posts_collected_total 3"), "{text}");
}
