//! HTTP Server implementation

use crate::handler;
use crate::AppState;
use anyhow::Result;
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty};
use hyper::body::Incoming;
use hyper::header::AUTHORIZATION;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Run the HTTP server
pub async fn run_server(state: Arc<AppState>) -> Result<()> {
    let config = state.config.read().await;
    let addr: SocketAddr =
        format!("{}:{}", config.server.bind_address, config.server.port).parse()?;
    drop(config);

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{}", addr);

    serve(listener, state).await
}

/// Accept connections on `listener` until it fails
async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(state, req, remote_addr).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection error: {:?}", err);
            }
        });
    }
}

/// Handle incoming HTTP request
async fn handle_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path();

    state.stats.write().await.total_requests += 1;

    if state.config.read().await.server.access_log {
        info!("{} {} {}", remote_addr.ip(), parts.method, path);
    }

    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let outcome = match handler::admit(&state, &parts.method, path, authorization).await {
        Ok(limit) => match handler::read_body(body, limit).await {
            Ok(bytes) => {
                state.stats.write().await.bytes_received += bytes.len() as u64;
                handler::accept(&state, &bytes).await
            }
            Err(rejection) => Err(rejection),
        },
        Err(rejection) => Err(rejection),
    };

    let status = match outcome {
        Ok(()) => StatusCode::OK,
        Err(rejection) => {
            debug!("{} {} rejected: {:?}", parts.method, path, rejection);
            rejection.status()
        }
    };

    state.stats.write().await.record(outcome);
    Ok(empty_response(status))
}

/// Responses carry no body, whatever the status
fn empty_response(status: StatusCode) -> Response<BoxBody<Bytes, Infallible>> {
    let mut response = Response::new(Empty::<Bytes>::new().boxed());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{stream_client, UniqueObjectKeyNameProvider};
    use http_body_util::Full;
    use intake_common::{IntakeConfig, PostDistrictMapper};
    use std::path::PathBuf;

    const SUBMISSION: &str = r#"{
  "metadata": {
    "operatingSystemVersion": "29",
    "latestApplicationVersion": "3.0",
    "deviceModel": "HUAWEI LDN-L21",
    "postalDistrict": "AB10"
  },
  "analyticsWindow": { "endDate": "2020-07-28T22:59:00Z", "startDate": "2020-07-27T23:00:00Z" },
  "metrics": { "checkedIn": 1 },
  "includesMultipleApplicationVersions": false
}"#;

    async fn start(dir: &tempfile::TempDir) -> (SocketAddr, Arc<AppState>) {
        let mut config = IntakeConfig::default();
        config.submission.max_body_bytes = 1024;
        config.storage.root = dir.path().to_string_lossy().into_owned();

        let state = Arc::new(AppState::new(
            config,
            PostDistrictMapper::passthrough(),
            PathBuf::from("intake.toml"),
            Arc::new(UniqueObjectKeyNameProvider),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state.clone()));
        (addr, state)
    }

    async fn post(addr: SocketAddr, authorization: Option<&str>, body: String) -> (StatusCode, Bytes) {
        let mut request = Request::post(format!("http://{}/submission/mobile-analytics", addr));
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let request = request.body(Full::new(Bytes::from(body))).unwrap();

        let response = stream_client().request(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    #[tokio::test]
    async fn test_submissions_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let (addr, state) = start(&dir).await;

        let (status, body) = post(addr, Some("Bearer anything"), SUBMISSION.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let (status, body) = post(addr, None, SUBMISSION.to_string()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.is_empty());

        let (status, body) = post(addr, Some("Bearer anything"), "x".repeat(2048)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body.is_empty());

        let stats = state.stats.read().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.bytes_received, SUBMISSION.len() as u64);
        assert_eq!(stats.rejected.unauthorized, 1);
        assert_eq!(stats.rejected.payload_too_large, 1);
        assert_eq!(stats.status_codes.success, 1);
        assert_eq!(stats.status_codes.client_error, 2);

        let stored = std::fs::read_dir(dir.path().join(&state.config.read().await.storage.bucket))
            .unwrap()
            .count();
        assert_eq!(stored, 1);
    }
}
