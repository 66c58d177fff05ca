use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use prometheus::Encoder;

use super::collector::MetricsCollector;

/// Handler for the /metrics endpoint
pub async fn metrics_handler(
    State(metrics): State<MetricsCollector>,
) -> Result<Response<Body>, StatusCode> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
