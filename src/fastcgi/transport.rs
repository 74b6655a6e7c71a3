// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, enabled, Level};

use super::record::{
    begin_request_body, encode_params, read_record, write_record, write_stream, RecordType,
};
use crate::config::FastCgiConfig;
use crate::errors::CallError;
use crate::http_client::{ProbeRequest, ProbeResponse};

const SERVER_SOFTWARE: &str = concat!("lonkero-probe/", env!("CARGO_PKG_VERSION"));

/// Executes probe requests against a FastCGI responder (PHP-FPM and friends).
#[derive(Debug, Clone)]
pub struct FastCgiTransport {
    /// Document root on the target; defaults to `/`
    pub root: String,

    /// Path split markers; the first match ends SCRIPT_NAME, the rest is PATH_INFO
    pub split_path: Vec<String>,

    /// Extra CGI variables
    pub env_vars: HashMap<String, String>,

    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl FastCgiTransport {
    pub fn from_config(config: &FastCgiConfig) -> Self {
        let root = if config.root.is_empty() {
            "/".to_string()
        } else {
            config.root.clone()
        };

        Self {
            root,
            split_path: config.split_path.clone(),
            env_vars: config.env.clone(),
            dial_timeout: config.dial_timeout(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }

    /// Index where the request path splits into script and path info.
    ///
    /// Without split markers the whole path is path info (`Some(0)`); with
    /// markers that never match there is no split (`None`).
    pub fn split_pos(&self, path: &str) -> Option<usize> {
        if self.split_path.is_empty() {
            return Some(0);
        }

        let lower = path.to_lowercase();
        self.split_path.iter().find_map(|split| {
            lower
                .find(&split.to_lowercase())
                .map(|idx| idx + split.len())
        })
    }

    /// CGI/1.1 environment for a request.
    pub fn build_env(
        &self,
        request: &ProbeRequest,
        local_addr: Option<SocketAddr>,
    ) -> Result<BTreeMap<String, String>, String> {
        if !self.root.starts_with('/') {
            return Err(format!("root {:?} is not absolute", self.root));
        }

        let fpath = request.url.path().to_string();
        let mut script_name = fpath.clone();
        let mut doc_uri = fpath.clone();
        let mut path_info = String::new();

        if let Some(pos) = self.split_pos(&fpath) {
            doc_uri = fpath[..pos].to_string();
            path_info = fpath[pos..].to_string();
            if let Some(stripped) = script_name.strip_suffix(path_info.as_str()) {
                script_name = stripped.to_string();
            }
        }

        let script_filename = join_clean(&self.root, &script_name);

        if !script_name.is_empty() && !script_name.starts_with('/') {
            script_name = format!("/{}", script_name);
        }

        let (remote_ip, remote_port) = local_addr
            .map(|a| (a.ip().to_string(), a.port().to_string()))
            .unwrap_or_default();

        let server_name = request.url.host_str().unwrap_or_default().to_string();
        let server_port = request.url.port().map(|p| p.to_string());
        let http_host = match &server_port {
            Some(port) => format!("{}:{}", server_name, port),
            None => server_name.clone(),
        };

        let content_length = request
            .body
            .as_ref()
            .map(|b| b.len().to_string())
            .unwrap_or_default();

        let mut env = BTreeMap::new();
        let mut set = |k: &str, v: String| {
            env.insert(k.to_string(), v);
        };

        set("AUTH_TYPE", String::new());
        set("CONTENT_LENGTH", content_length);
        set("CONTENT_TYPE", request.header("content-type").unwrap_or_default().to_string());
        set("GATEWAY_INTERFACE", "CGI/1.1".to_string());
        set("PATH_INFO", path_info.clone());
        set("QUERY_STRING", request.url.query().unwrap_or_default().to_string());
        set("REMOTE_ADDR", remote_ip.clone());
        set("REMOTE_HOST", remote_ip);
        set("REMOTE_PORT", remote_port);
        set("REMOTE_IDENT", String::new());
        set("REMOTE_USER", request.basic_auth_user().unwrap_or_default());
        set("REQUEST_METHOD", request.method.to_string());
        set("REQUEST_SCHEME", "http".to_string());
        set("SERVER_NAME", server_name);
        set("SERVER_PROTOCOL", "HTTP/1.1".to_string());
        set("SERVER_SOFTWARE", SERVER_SOFTWARE.to_string());
        set("DOCUMENT_ROOT", self.root.clone());
        set("DOCUMENT_URI", doc_uri);
        set("HTTP_HOST", http_host);
        set("SCRIPT_FILENAME", script_filename);
        set("SCRIPT_NAME", script_name);

        // PATH_TRANSLATED only exists alongside PATH_INFO
        if !path_info.is_empty() {
            set("PATH_TRANSLATED", join_clean(&self.root, &path_info));
        }

        if let Some(port) = server_port {
            set("SERVER_PORT", port);
        }

        for (key, value) in &self.env_vars {
            set(key, value.clone());
        }

        let mut headers: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (name, value) in &request.headers {
            let key = format!("HTTP_{}", name.to_uppercase().replace(['-', ' '], "_"));
            headers.entry(key).or_default().push(value);
        }
        for (key, values) in headers {
            set(&key, values.join(", "));
        }

        Ok(env)
    }

    /// Send one request over a fresh connection and collect the CGI response.
    pub async fn round_trip(&self, request: &ProbeRequest) -> Result<ProbeResponse, CallError> {
        let target = request.target();

        let mut stream = match timeout(self.dial_timeout, TcpStream::connect(&target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(CallError::from_io(&target, &e)),
            Err(_) => {
                return Err(CallError::Web {
                    target,
                    reason: "dial timeout".to_string(),
                })
            }
        };

        let env = self
            .build_env(request, stream.local_addr().ok())
            .map_err(|e| CallError::Other(format!("building environment: {}", e)))?;

        if enabled!(Level::DEBUG) {
            debug!(
                target = %target,
                env = %serde_json::to_string(&env).unwrap_or_default(),
                "FastCGI environment"
            );
        }

        let body: &[u8] = match request.method.as_str() {
            "HEAD" | "OPTIONS" => &[],
            _ => request.body.as_deref().unwrap_or_default(),
        };

        let params = encode_params(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let write = async {
            write_record(&mut stream, RecordType::BeginRequest, &begin_request_body(false)).await?;
            write_stream(&mut stream, RecordType::Params, &params).await?;
            write_stream(&mut stream, RecordType::Stdin, body).await?;
            stream.flush().await
        };

        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(CallError::from_io(&target, &e)),
            Err(_) => {
                return Err(CallError::Web {
                    target,
                    reason: "write timeout".to_string(),
                })
            }
        }

        let (stdout, stderr) = self.read_response(&mut stream, &target).await?;

        if !stderr.is_empty() {
            debug!(
                target = %target,
                stderr = %String::from_utf8_lossy(&stderr),
                "FastCGI stderr output"
            );
        }

        parse_cgi_response(&stdout)
    }

    async fn read_response(
        &self,
        stream: &mut TcpStream,
        target: &str,
    ) -> Result<(Vec<u8>, Vec<u8>), CallError> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut records = 0usize;

        loop {
            let record = match timeout(self.read_timeout, read_record(stream)).await {
                Ok(Ok(record)) => record,
                // peer closed after sending something: take what we have
                Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof && records > 0 => break,
                Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    return Err(CallError::Other(format!("FastCGI protocol error: {}", e)))
                }
                Ok(Err(e)) => return Err(CallError::from_io(target, &e)),
                Err(_) => {
                    return Err(CallError::Web {
                        target: target.to_string(),
                        reason: "read timeout".to_string(),
                    })
                }
            };

            records += 1;

            match record.record_type() {
                Some(RecordType::Stdout) => stdout.extend_from_slice(&record.content),
                Some(RecordType::Stderr) => stderr.extend_from_slice(&record.content),
                Some(RecordType::EndRequest) => break,
                other => debug!(record_type = ?other, "Ignoring FastCGI record"),
            }
        }

        Ok((stdout, stderr))
    }
}

/// Parse CGI response output: headers, blank line, body.
pub fn parse_cgi_response(stdout: &[u8]) -> Result<ProbeResponse, CallError> {
    if stdout.is_empty() {
        return Err(CallError::Other("empty FastCGI response".to_string()));
    }

    let (head, body) = match find_header_end(stdout) {
        Some((head_end, body_start)) => (&stdout[..head_end], &stdout[body_start..]),
        None => return Err(CallError::Other("malformed CGI response headers".to_string())),
    };

    let mut status = 200u16;
    let mut content_type = None;

    for line in String::from_utf8_lossy(head).lines() {
        let Some((name, value)) = line.split_once(':') else {
            return Err(CallError::Other(format!("malformed CGI header line: {}", line)));
        };

        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("status") {
            status = value
                .split_whitespace()
                .next()
                .and_then(|code| code.parse().ok())
                .ok_or_else(|| CallError::Other(format!("invalid CGI status: {}", value)))?;
        } else if name.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    Ok(ProbeResponse {
        status,
        content_type,
        body: body.to_vec(),
    })
}

fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    data.windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2))
}

/// Join and clean an absolute path, resolving `.` and `..`.
fn join_clean(root: &str, rel: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in root.split('/').chain(rel.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}
