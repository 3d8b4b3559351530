use crate::metrics::{MetricsStore, CONTENT_TYPE as METRICS_CONTENT_TYPE};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use tokio::net::TcpStream;
use tracing::error;

pub async fn handle_connection(stream: TcpStream, metrics: MetricsStore) {
    let service = service_fn(move |req| {
        let metrics = metrics.clone();
        async move { route_request(req, metrics).await }
    });

    if let Err(e) = Http::new().serve_connection(stream, service).await {
        error!("Metrics connection error: {}", e);
    }
}

pub async fn route_request(
    req: Request<Body>,
    metrics: MetricsStore,
) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            respond(StatusCode::OK, METRICS_CONTENT_TYPE, metrics.export_text())
        }
        (&Method::GET, "/health") => {
            // Compile-time version and build hash
            let version = env!("CARGO_PKG_VERSION");
            let build = option_env!("GIT_COMMIT_HASH").unwrap_or("unknown");
            let json = serde_json::json!({ "version": version, "build": build });
            respond(StatusCode::OK, "application/json", json.to_string())
        }
        _ => respond(
            StatusCode::NOT_FOUND,
            "application/json",
            "{\"error\": \"not found\"}",
        ),
    };
    Ok(response)
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap_or_else(|e| {
            error!("Failed to build response: {}", e);
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        })
}
