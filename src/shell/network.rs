use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::{self, HeaderMap, HeaderName};
use reqwest::Url;

use super::{ResponseKind, ShellError, ShellRequest, ShellResponse};

#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, ShellError>;
}

/// The app's static origin, reached over HTTP.
pub struct Upstream {
    client: reqwest::Client,
    origin: Url,
}

impl Upstream {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, ShellError> {
        let origin = Url::parse(origin).map_err(|e| ShellError::Network(format!("Invalid origin {}: {}", origin, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShellError::Network(e.to_string()))?;

        Ok(Self { client, origin })
    }
}

#[async_trait]
impl Network for Upstream {
    async fn fetch(&self, request: &ShellRequest) -> Result<ShellResponse, ShellError> {
        let url = self
            .origin
            .join(&request.url)
            .map_err(|e| ShellError::Network(format!("Invalid request URL {}: {}", request.url, e)))?;

        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(forwardable(&request.headers, &[header::HOST, header::ACCEPT_ENCODING]))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| ShellError::Network(e.to_string()))?;

        let kind = if response.url().origin() == self.origin.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };
        let status = response.status();
        let headers = forwardable(response.headers(), &[header::CONTENT_LENGTH]);
        let body = response
            .bytes()
            .await
            .map_err(|e| ShellError::Network(e.to_string()))?;

        Ok(ShellResponse {
            status,
            headers,
            body,
            kind,
        })
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Copies `headers` minus hop-by-hop headers and `extra`.
fn forwardable(headers: &HeaderMap, extra: &[HeaderName]) -> HeaderMap {
    let mut forwarded = HeaderMap::new();

    for (name, value) in headers {
        if is_hop_by_hop(name) || extra.contains(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }

    forwarded
}
