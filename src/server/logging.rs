use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

const LOG_TARGET: &str = "server::http";

/// Logs every request and its outcome; websocket upgrades show up as 101.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(str::to_owned);

    match query.as_deref() {
        Some(query) => tracing::debug!(target = LOG_TARGET, %method, %path, %query, "incoming request"),
        None => tracing::debug!(target = LOG_TARGET, %method, %path, "incoming request"),
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::warn!(
            target = LOG_TARGET,
            %method,
            %path,
            status = status.as_u16(),
            duration_ms,
            "request failed"
        );
    } else {
        tracing::info!(
            target = LOG_TARGET,
            %method,
            %path,
            status = status.as_u16(),
            duration_ms,
            "request completed"
        );
    }
    response
}
