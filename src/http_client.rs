// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Client Factory
 * Protocol family clients with fixed timeouts and relaxed certificate checks
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{FastCgiConfig, ProbeCommand, Protocol};
use crate::errors::{CallError, ProbeError, ProbeResult};
use crate::fastcgi::FastCgiTransport;

/// Per-call timeout for every probe client
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Crawl fetch timeout
pub const CRAWL_TIMEOUT_SECS: u64 = 10;

const POOL_MAX_IDLE_PER_HOST: usize = 10;
const POOL_IDLE_TIMEOUT_SECS: u64 = 30;

/// Maximum response body kept in memory (10MB)
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// A transport able to execute probe requests.
#[derive(Debug, Clone)]
pub enum ProbeClient {
    Http(Client),
    FastCgi(FastCgiTransport),
}

impl ProbeClient {
    /// Build the HTTP-family client for `protocol`.
    pub fn for_protocol(protocol: Protocol) -> ProbeResult<Self> {
        let client = match protocol {
            Protocol::Http2 | Protocol::Http2c => build_http2_client()?,
            Protocol::Http | Protocol::Https => build_http1_client()?,
            Protocol::Ws | Protocol::Wss => {
                return Err(ProbeError::Client {
                    protocol: protocol.to_string(),
                    reason: "websocket targets use a websocket session".to_string(),
                })
            }
        };

        Ok(ProbeClient::Http(client))
    }

    /// Build a FastCGI transport client.
    pub fn fastcgi(config: &FastCgiConfig) -> Self {
        ProbeClient::FastCgi(FastCgiTransport::from_config(config))
    }

    /// Resolve the client for a command: FastCGI when configured, else by protocol.
    pub fn for_command(cmd: &ProbeCommand, protocol: Protocol) -> ProbeResult<Self> {
        match &cmd.fastcgi {
            Some(fcgi) => {
                debug!("FastCGI transport configured");
                Ok(Self::fastcgi(fcgi))
            }
            None => Self::for_protocol(protocol),
        }
    }

    pub fn is_fastcgi(&self) -> bool {
        matches!(self, ProbeClient::FastCgi(_))
    }

    /// Execute one request. HTTP status codes are not inspected.
    pub async fn execute(&self, request: &ProbeRequest) -> Result<ProbeResponse, CallError> {
        match self {
            ProbeClient::Http(client) => execute_http(client, request).await,
            ProbeClient::FastCgi(transport) => transport.round_trip(request).await,
        }
    }
}

fn build_http1_client() -> ProbeResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
        .tcp_nodelay(true)
        .build()
        .map_err(|e| ProbeError::Client {
            protocol: "http".to_string(),
            reason: e.to_string(),
        })
}

/// HTTP/2 with prior knowledge; TLS for `https` URLs, cleartext h2c for `http` URLs.
fn build_http2_client() -> ProbeResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .danger_accept_invalid_certs(true)
        .http2_prior_knowledge()
        .build()
        .map_err(|e| ProbeError::Client {
            protocol: "http2".to_string(),
            reason: e.to_string(),
        })
}

/// Client used by crawlers: 10 s timeout and a cookie store.
pub fn build_crawl_client(protocol: Protocol, user_agent: &str) -> ProbeResult<Client> {
    let timeout = Duration::from_secs(CRAWL_TIMEOUT_SECS);

    let mut builder = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .cookie_store(true)
        .user_agent(user_agent);

    if protocol.is_http2() {
        builder = builder.http2_prior_knowledge();
    }

    builder.build().map_err(|e| ProbeError::Client {
        protocol: protocol.to_string(),
        reason: e.to_string(),
    })
}

/// `scheme://host:port` for a protocol.
pub fn http_addr(protocol: Protocol, host: &str, port: &str) -> String {
    format!("{}://{}:{}", protocol.scheme(), host, port)
}

/// A fully resolved probe request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ProbeRequest {
    pub fn new(method: &str, url: &str) -> ProbeResult<Self> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|e| ProbeError::InvalidRequest {
            target: url.to_string(),
            reason: format!("invalid method '{}': {}", method, e),
        })?;

        let url = Url::parse(url).map_err(|e| ProbeError::InvalidRequest {
            target: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        })
    }

    /// Build the request for a probe command against `addr` (`scheme://host:port/resource`).
    pub fn from_command(cmd: &ProbeCommand, addr: &str, body: Option<Vec<u8>>) -> ProbeResult<Self> {
        let mut request = Self::new(&cmd.method, addr)?;

        for line in &cmd.headers {
            match line.split_once(':') {
                Some((name, value)) => request.add_header(name.trim(), value.trim()),
                None => debug!(header = %line, "Ignoring malformed header"),
            }
        }

        if cmd.has_basic_auth() {
            request.set_basic_auth(
                cmd.username.as_deref().unwrap_or_default(),
                cmd.password.as_deref().unwrap_or_default(),
            );
        }

        request.body = body;
        Ok(request)
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn set_basic_auth(&mut self, username: &str, password: &str) {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case("authorization"));
        self.add_header("Authorization", &format!("Basic {}", token));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Username from a basic `Authorization` header.
    pub fn basic_auth_user(&self) -> Option<String> {
        let value = self.header("authorization")?;
        let encoded = value.strip_prefix("Basic ")?;
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        decoded.split_once(':').map(|(user, _)| user.to_string())
    }

    /// `host:port` of the target.
    pub fn target(&self) -> String {
        match (self.url.host_str(), self.url.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => self.url.to_string(),
        }
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => debug!(header = %name, "Skipping invalid header"),
            }
        }
        map
    }
}

/// What the probe keeps from a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ProbeResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

async fn execute_http(client: &Client, request: &ProbeRequest) -> Result<ProbeResponse, CallError> {
    let target = request.url.as_str();

    let mut builder = client
        .request(request.method.clone(), request.url.clone())
        .headers(request.header_map());

    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let response = builder
        .send()
        .await
        .map_err(|e| CallError::from_reqwest(target, &e))?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let body = read_body_capped(response, MAX_BODY_SIZE, target).await;

    Ok(ProbeResponse {
        status,
        content_type,
        body,
    })
}

/// Keep at most `limit` body bytes and drain the rest. Body read failures do
/// not fail the call.
async fn read_body_capped(mut response: reqwest::Response, limit: usize, target: &str) -> Vec<u8> {
    let mut body = Vec::new();
    let mut discarded = 0usize;

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = limit.saturating_sub(body.len());
                let keep = room.min(chunk.len());
                body.extend_from_slice(&chunk[..keep]);
                discarded += chunk.len() - keep;
            }
            Ok(None) => break,
            Err(e) => {
                debug!(target = %target, error = %e, "Failed to drain response body");
                break;
            }
        }
    }

    if discarded > 0 {
        debug!(target = %target, kept = body.len(), discarded, "Response body truncated");
    }

    body
}
