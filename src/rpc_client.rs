use crate::types::PeerSnapshot;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use hyper_openssl::HttpsConnector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::trace;

pub const PEERS_METHOD: &str = "admin_peers";

/// Anything that can produce the node's current peer list.
#[async_trait]
pub trait PeerSource: Send + Sync {
    async fn fetch_peers(&self) -> Result<PeerSnapshot, RemoteQueryError>;
}

/// A remote call that did not yield a usable result.
#[derive(Debug, Error)]
#[error("failed to call {method}: {source}")]
pub struct RemoteQueryError {
    pub method: &'static str,
    #[source]
    pub source: QueryFailure,
}

#[derive(Debug, Error)]
pub enum QueryFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] hyper::Error),
    #[error("request builder error: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("response carried neither result nor error")]
    MissingResult,
}

/// Failures building the client at startup.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid RPC URL: {0}")]
    InvalidUrl(#[from] hyper::http::uri::InvalidUri),
    #[error("unsupported RPC URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("failed to create HTTPS connector: {0}")]
    Tls(#[from] openssl::error::ErrorStack),
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client for the node's HTTP endpoint.
///
/// Built once at startup and reused for every poll; the underlying hyper
/// client keeps its connection pool across calls.
pub struct RpcClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    endpoint: Uri,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let endpoint: Uri = url.parse()?;
        match endpoint.scheme_str() {
            Some("http") | Some("https") => {}
            other => return Err(ClientError::UnsupportedScheme(other.unwrap_or("").to_string())),
        }

        let https = HttpsConnector::new()?;
        let client: Client<_, Body> = Client::builder().build(https);

        Ok(Self {
            client,
            endpoint,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
    ) -> Result<T, RemoteQueryError> {
        match time::timeout(self.timeout, self.exchange(method)).await {
            Ok(result) => result.map_err(|source| RemoteQueryError { method, source }),
            Err(_) => Err(RemoteQueryError {
                method,
                source: QueryFailure::Timeout(self.timeout),
            }),
        }
    }

    async fn exchange<T: DeserializeOwned>(&self, method: &str) -> Result<T, QueryFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(&RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params: Vec::new(),
        })
        .map_err(QueryFailure::Encode)?;

        let req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload))?;

        trace!("Sending {} (id {}) to {}", method, id, self.endpoint);
        let resp = self.client.request(req).await?;
        let status = resp.status();
        let body = hyper::body::to_bytes(resp.into_body()).await?;
        if !status.is_success() {
            return Err(QueryFailure::Status(status));
        }

        let reply: RpcResponse<T> = serde_json::from_slice(&body).map_err(QueryFailure::Decode)?;
        match (reply.result, reply.error) {
            (_, Some(err)) => Err(QueryFailure::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(QueryFailure::MissingResult),
        }
    }
}

#[async_trait]
impl PeerSource for RpcClient {
    async fn fetch_peers(&self) -> Result<PeerSnapshot, RemoteQueryError> {
        self.call(PEERS_METHOD).await
    }
}
