//! Persistence sinks for accepted submissions

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use intake_common::config::{ForwardConfig, StorageConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Header carrying the configured stream name on forwarded records
pub const STREAM_NAME_HEADER: &str = "X-Stream-Name";

/// Generates the object key each stored record is written under
pub trait ObjectKeyNameProvider: Send + Sync {
    fn generate_object_key_name(&self) -> String;
}

/// `<epoch millis>_<uuid>` keys, so keys sort by arrival time
pub struct UniqueObjectKeyNameProvider;

impl ObjectKeyNameProvider for UniqueObjectKeyNameProvider {
    fn generate_object_key_name(&self) -> String {
        format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        )
    }
}

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to build request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream returned {0}")]
    Status(StatusCode),

    #[error("Upstream request timed out")]
    Timeout,
}

/// Bucket-style store on the local filesystem
pub struct ObjectStoreSink {
    bucket_dir: PathBuf,
}

impl ObjectStoreSink {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            bucket_dir: Path::new(&config.root).join(&config.bucket),
        }
    }

    /// Write `record` as `<key>.json` and return its path.
    ///
    /// The file is written under a temporary name and renamed, so readers
    /// never see a partial record.
    pub async fn put(&self, key: &str, record: &[u8]) -> Result<PathBuf, SinkError> {
        tokio::fs::create_dir_all(&self.bucket_dir).await?;

        let path = self.bucket_dir.join(format!("{}.json", key));
        let staging = self.bucket_dir.join(format!(".{}.json.tmp", key));

        tokio::fs::write(&staging, record).await?;
        tokio::fs::rename(&staging, &path).await?;

        debug!("Stored {} bytes at {}", record.len(), path.display());
        Ok(path)
    }
}

/// Pooled HTTP client shared by every stream sink
pub type StreamClient = Client<HttpConnector, Full<Bytes>>;

pub fn stream_client() -> StreamClient {
    Client::builder(hyper_util::rt::TokioExecutor::new()).build_http()
}

/// Forwards records, one per request, to an HTTP delivery stream
pub struct StreamSink {
    client: StreamClient,
    endpoint: Uri,
    stream_name: String,
    timeout: Duration,
}

impl StreamSink {
    pub fn new(config: &ForwardConfig, client: StreamClient) -> Result<Self, SinkError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| SinkError::InvalidEndpoint("no endpoint configured".to_string()))?
            .parse::<Uri>()
            .map_err(|e| SinkError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            stream_name: config.stream_name.clone(),
            timeout: Duration::from_secs(config.timeout),
        })
    }

    /// Send one newline-terminated record
    pub async fn put_record(&self, record: &str) -> Result<(), SinkError> {
        let mut line = String::with_capacity(record.len() + 1);
        line.push_str(record);
        line.push('\n');

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(STREAM_NAME_HEADER, self.stream_name.as_str())
            .body(Full::new(Bytes::from(line)))?;

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => {
                debug!("Forwarded record to stream '{}'", self.stream_name);
                Ok(())
            }
            Ok(Ok(response)) => Err(SinkError::Status(response.status())),
            Ok(Err(e)) => Err(SinkError::Upstream(e.to_string())),
            Err(_) => Err(SinkError::Timeout),
        }
    }
}
