// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::errors::{ProbeError, ProbeResult};

pub const DEFAULT_RETRY_COUNT: u32 = 5;
pub const DEFAULT_RETRY_WAIT_SECS: u64 = 8;

pub const DEFAULT_CRAWL_MAX_DEPTH: i64 = 3;
pub const DEFAULT_CRAWL_MAX_PAGE_COUNT: i64 = 1000;
pub const DEFAULT_CRAWL_CONCURRENCY: i64 = 10;
pub const DEFAULT_MAX_CONCURRENT_CRAWLERS: i64 = 1;

pub const DEFAULT_FASTCGI_ROOT: &str = "/var/www";
pub const DEFAULT_FASTCGI_TIMEOUT_SECS: u64 = 30;

/// Methods accepted in probe commands.
pub const PROBE_METHODS: &[&str] = &["HEAD", "GET", "POST", "PUT", "DELETE", "PATCH"];

/// Probe configuration handed to the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProbeConfig {
    #[validate(nested)]
    #[serde(default)]
    pub commands: Vec<ProbeCommand>,

    /// Attempts per call (0 = default of 5)
    #[serde(default)]
    pub retry_count: u32,

    /// Web-error wait in seconds (0 = default of 8); the other tiers derive from it
    #[serde(default)]
    pub retry_wait: u64,

    /// Explicit port allow-list
    #[serde(default)]
    pub ports: Vec<u16>,

    /// Crawl flag for the default probe
    #[serde(default)]
    pub crawl: bool,

    #[serde(default)]
    pub crawl_max_depth: i64,

    #[serde(default)]
    pub crawl_max_page_count: i64,

    #[serde(default)]
    pub crawl_concurrency: i64,

    #[serde(default)]
    pub crawl_max_concurrent_crawlers: i64,

    /// Keep probing every port after the first success
    #[serde(default)]
    pub full: bool,

    #[serde(default)]
    pub exit_on_failure: bool,

    /// Live API spec endpoints (`path[:prefix]`)
    #[serde(default)]
    pub api_specs: Vec<String>,

    /// Local API spec files (`path[:prefix]`)
    #[serde(default)]
    pub api_spec_files: Vec<String>,

    /// Extra warm-up delay in seconds
    #[serde(default)]
    pub start_wait: u64,
}

impl ProbeConfig {
    /// Add the implicit `GET /` probe when probing is requested without commands.
    pub fn ensure_default_probe(&mut self) {
        if self.commands.is_empty() {
            self.commands.push(ProbeCommand {
                protocol: Some(Protocol::Http),
                crawl: self.crawl,
                ..ProbeCommand::default()
            });
        }
    }

    /// Resolved crawl limits (0 = default, negative = disabled).
    pub fn crawl_limits(&self) -> CrawlLimits {
        CrawlLimits {
            max_depth: normalize_limit(self.crawl_max_depth, DEFAULT_CRAWL_MAX_DEPTH),
            max_page_count: normalize_limit(self.crawl_max_page_count, DEFAULT_CRAWL_MAX_PAGE_COUNT),
            concurrency: normalize_limit(self.crawl_concurrency, DEFAULT_CRAWL_CONCURRENCY),
            max_concurrent_crawlers: normalize_limit(
                self.crawl_max_concurrent_crawlers,
                DEFAULT_MAX_CONCURRENT_CRAWLERS,
            ),
        }
    }

    /// Rewrite the crawl fields so that zero values carry their defaults.
    pub fn normalize(&mut self) {
        for (value, default) in [
            (&mut self.crawl_max_depth, DEFAULT_CRAWL_MAX_DEPTH),
            (&mut self.crawl_max_page_count, DEFAULT_CRAWL_MAX_PAGE_COUNT),
            (&mut self.crawl_concurrency, DEFAULT_CRAWL_CONCURRENCY),
            (&mut self.crawl_max_concurrent_crawlers, DEFAULT_MAX_CONCURRENT_CRAWLERS),
        ] {
            if *value == 0 {
                *value = default;
            }
        }
    }

    pub fn effective_retry_count(&self) -> u32 {
        if self.retry_count > 0 {
            self.retry_count
        } else {
            DEFAULT_RETRY_COUNT
        }
    }

    pub fn has_api_specs(&self) -> bool {
        !self.api_specs.is_empty() || !self.api_spec_files.is_empty()
    }
}

fn normalize_limit(value: i64, default: i64) -> Option<usize> {
    match value {
        0 => Some(default as usize),
        v if v < 0 => None,
        v => Some(v as usize),
    }
}

/// Crawl bounds; `None` means the bound is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_depth: Option<usize>,
    pub max_page_count: Option<usize>,
    pub concurrency: Option<usize>,
    pub max_concurrent_crawlers: Option<usize>,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        ProbeConfig::default().crawl_limits()
    }
}

/// One probe command: method + resource plus optional transport details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProbeCommand {
    #[validate(custom(function = "validate_method"))]
    #[serde(default = "default_method")]
    pub method: String,

    #[validate(custom(function = "validate_resource"))]
    #[serde(default = "default_resource")]
    pub resource: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    #[serde(default)]
    pub headers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub crawl: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastcgi: Option<FastCgiConfig>,
}

impl Default for ProbeCommand {
    fn default() -> Self {
        Self {
            method: default_method(),
            resource: default_resource(),
            protocol: None,
            headers: Vec::new(),
            body: None,
            body_file: None,
            username: None,
            password: None,
            crawl: false,
            fastcgi: None,
        }
    }
}

/// Where a command's request body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Empty,
    Inline(String),
    File(PathBuf),
}

impl BodySource {
    /// Load the body bytes. File bodies are read at call time.
    pub fn load(&self) -> ProbeResult<Option<Vec<u8>>> {
        match self {
            BodySource::Empty => Ok(None),
            BodySource::Inline(body) => Ok(Some(body.clone().into_bytes())),
            BodySource::File(path) => std::fs::read(path)
                .map(Some)
                .map_err(|source| ProbeError::BodyFile {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

impl ProbeCommand {
    pub fn new(method: &str, resource: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            resource: resource.to_string(),
            ..Self::default()
        }
    }

    /// Resolve the body source. Inline and file bodies are mutually exclusive.
    pub fn body_source(&self) -> ProbeResult<BodySource> {
        match (&self.body, &self.body_file) {
            (Some(_), Some(_)) => Err(ProbeError::Configuration(format!(
                "{} {}: body and body_file are mutually exclusive",
                self.method, self.resource
            ))),
            (None, Some(path)) => Ok(BodySource::File(path.clone())),
            (Some(body), None) if !body.is_empty() => Ok(BodySource::Inline(body.clone())),
            _ => Ok(BodySource::Empty),
        }
    }

    pub fn has_basic_auth(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            || self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Apply the implicit FastCGI settings used for the conventional PHP-FPM port.
    pub fn with_fastcgi_defaults(&self) -> ProbeCommand {
        let mut cmd = self.clone();

        if cmd.resource == "/" {
            cmd.resource = "/index.php".to_string();
        }

        let split_path = cmd
            .resource
            .find(".php")
            .map(|idx| vec![cmd.resource[..idx + 4].to_string()])
            .unwrap_or_default();

        cmd.fastcgi = Some(FastCgiConfig {
            root: DEFAULT_FASTCGI_ROOT.to_string(),
            split_path,
            ..FastCgiConfig::default()
        });

        cmd
    }
}

/// FastCGI transport settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FastCgiConfig {
    #[serde(default)]
    pub root: String,

    #[serde(default)]
    pub split_path: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub dial_timeout_secs: u64,

    #[serde(default)]
    pub read_timeout_secs: u64,

    #[serde(default)]
    pub write_timeout_secs: u64,
}

impl FastCgiConfig {
    pub fn dial_timeout(&self) -> Duration {
        timeout_or_default(self.dial_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        timeout_or_default(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        timeout_or_default(self.write_timeout_secs)
    }
}

fn timeout_or_default(secs: u64) -> Duration {
    if secs == 0 {
        Duration::from_secs(DEFAULT_FASTCGI_TIMEOUT_SECS)
    } else {
        Duration::from_secs(secs)
    }
}

/// Probe protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Protocol {
    Http,
    Https,
    Http2,
    Http2c,
    Ws,
    Wss,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Http2 => "http2",
            Protocol::Http2c => "http2c",
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
        }
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, Protocol::Ws | Protocol::Wss)
    }

    pub fn is_http2(&self) -> bool {
        matches!(self, Protocol::Http2 | Protocol::Http2c)
    }

    /// URL scheme used on the wire.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http | Protocol::Http2c => "http",
            Protocol::Https | Protocol::Http2 => "https",
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
        }
    }

    /// Protocols tried for a port when the command does not name one.
    pub fn defaults_for_port(port: &str) -> Vec<Protocol> {
        match port {
            "80" => vec![Protocol::Http],
            "443" => vec![Protocol::Https],
            _ => vec![Protocol::Http, Protocol::Https],
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "http2" => Ok(Protocol::Http2),
            "http2c" | "h2c" => Ok(Protocol::Http2c),
            "ws" => Ok(Protocol::Ws),
            "wss" => Ok(Protocol::Wss),
            other => Err(ProbeError::Configuration(format!(
                "Unsupported probe protocol: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

pub fn is_probe_method(method: &str) -> bool {
    PROBE_METHODS.contains(&method.to_uppercase().as_str())
}

fn validate_method(method: &str) -> Result<(), ValidationError> {
    if is_probe_method(method) {
        Ok(())
    } else {
        Err(ValidationError::new("unsupported_method"))
    }
}

fn validate_resource(resource: &str) -> Result<(), ValidationError> {
    if resource.starts_with('/') {
        Ok(())
    } else {
        Err(ValidationError::new("resource_must_start_with_slash"))
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_resource() -> String {
    "/".to_string()
}
