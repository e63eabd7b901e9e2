//! HTTP gateway feeding fetch events to the worker.
//!
//! Each accepted connection runs on its own task, so fetch handlers for
//! different requests interleave at the worker's suspension points. Every
//! request gets exactly one response: served content, or a bare failure
//! status when the worker's error propagates. No substitute content is
//! synthesized.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::request::{InterceptedRequest, ServedResponse};
use crate::worker::OfflineWorker;

/// Gateway-reserved path answering with worker status; never forwarded and
/// never cached.
const STATUS_PATH: &str = "/_offline/status";

/// Accept loop: one task per connection.
pub async fn serve(worker: Arc<OfflineWorker>, listener: TcpListener) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let worker = Arc::clone(&worker);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(Arc::clone(&worker), req));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}

/// Turn an incoming request into a fetch event and its outcome into a
/// response. Infallible at the hyper layer: worker errors become statuses.
async fn handle(worker: Arc<OfflineWorker>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    if path_and_query == STATUS_PATH {
        return Ok(status_response(&worker).await);
    }

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::debug!(error = %err, "failed to read request body");
            return Ok(empty_response(StatusCode::BAD_REQUEST));
        }
    };

    let request = InterceptedRequest {
        method: parts.method.as_str().to_string(),
        path_and_query,
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect(),
        body: if body.is_empty() { None } else { Some(body) },
    };

    match worker.handle_fetch(request).await {
        Ok(served) => Ok(into_response(served)),
        Err(err) => {
            tracing::debug!(error = %err, "fetch event failed");
            Ok(empty_response(StatusCode::BAD_GATEWAY))
        }
    }
}

fn into_response(served: ServedResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(served.status);
    for (name, value) in &served.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(served.body))
        .unwrap_or_else(|_| empty_response(StatusCode::BAD_GATEWAY))
}

async fn status_response(worker: &OfflineWorker) -> Response<Full<Bytes>> {
    match worker.status().await {
        Ok(status) => {
            let body = serde_json::to_vec(&status).unwrap_or_default();
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from(body)))
                .unwrap_or_else(|_| empty_response(StatusCode::INTERNAL_SERVER_ERROR))
        }
        Err(err) => {
            tracing::debug!(error = %err, "status query failed");
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
