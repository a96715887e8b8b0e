//! Mobile analytics submission endpoint

use crate::sink::{ObjectStoreSink, StreamSink};
use crate::AppState;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{Method, StatusCode};
use intake_common::{ClientAnalyticsSubmission, StoredAnalyticsPayload};
use tracing::{debug, error, warn};

/// Why a request was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Maintenance,
    NotFound,
    MethodNotAllowed,
    Unauthorized,
    PayloadTooLarge,
    BadRequest,
    SinkFailure,
}

impl Rejection {
    pub fn status(self) -> StatusCode {
        match self {
            Rejection::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
            Rejection::NotFound => StatusCode::NOT_FOUND,
            Rejection::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Rejection::Unauthorized => StatusCode::UNAUTHORIZED,
            Rejection::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::BadRequest => StatusCode::BAD_REQUEST,
            Rejection::SinkFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Check everything that does not need the body.
///
/// Returns the body size limit to apply.
pub async fn admit(
    state: &AppState,
    method: &Method,
    path: &str,
    authorization: Option<&str>,
) -> Result<usize, Rejection> {
    let config = state.config.read().await;
    let submission = &config.submission;

    if submission.maintenance_mode {
        return Err(Rejection::Maintenance);
    }

    if path != submission.path {
        return Err(Rejection::NotFound);
    }

    if method != Method::POST {
        return Err(Rejection::MethodNotAllowed);
    }

    let token = authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(Rejection::Unauthorized)?;

    if !submission.bearer_tokens.is_empty() && !submission.bearer_tokens.iter().any(|t| t == token) {
        return Err(Rejection::Unauthorized);
    }

    Ok(submission.max_body_bytes)
}

/// Collect a request body of at most `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, Rejection>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(Rejection::PayloadTooLarge),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            Err(Rejection::BadRequest)
        }
    }
}

/// Parse, map and persist one submission
pub async fn accept(state: &AppState, body: &[u8]) -> Result<(), Rejection> {
    let submission = ClientAnalyticsSubmission::parse(body).map_err(|e| {
        warn!("Rejected submission: {}", e);
        Rejection::BadRequest
    })?;

    let unreported = submission.metrics.unreported();
    if !unreported.is_empty() {
        debug!("Client left {} metrics unreported", unreported.len());
    }

    let location = state.mapper.read().await.map(
        &submission.metadata.postal_district,
        submission.metadata.local_authority.as_deref(),
    );

    let payload = StoredAnalyticsPayload::from_submission(submission, location);
    let record = payload.to_json().map_err(|e| {
        error!("Failed to serialize stored payload: {}", e);
        Rejection::SinkFailure
    })?;

    let (storage, forward) = {
        let config = state.config.read().await;
        (config.storage.clone(), config.forward.clone())
    };

    if storage.enabled {
        let key = state.keys.generate_object_key_name();
        ObjectStoreSink::new(&storage)
            .put(&key, record.as_bytes())
            .await
            .map_err(|e| {
                error!("Failed to store submission {}: {}", key, e);
                Rejection::SinkFailure
            })?;
    }

    if forward.enabled {
        let sink = StreamSink::new(&forward, state.stream.clone()).map_err(|e| {
            error!("Stream sink misconfigured: {}", e);
            Rejection::SinkFailure
        })?;
        sink.put_record(&record).await.map_err(|e| {
            error!("Failed to forward submission: {}", e);
            Rejection::SinkFailure
        })?;
    }

    Ok(())
}
