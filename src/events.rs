// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Events
 * Structured lifecycle and per-attempt events for the embedding caller
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// A probe event with its emission time.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeEvent {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: ProbeEventKind,
}

impl ProbeEvent {
    pub fn new(kind: ProbeEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"event\":\"{}\"}}", self.name()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum ProbeEventKind {
    #[serde(rename = "http.probe.starting")]
    Starting,

    #[serde(rename = "http.probe.start.wait")]
    StartWait { seconds: u64 },

    #[serde(rename = "http.probe.start.wait.done")]
    StartWaitDone,

    #[serde(rename = "http.probe.running")]
    Running,

    #[serde(rename = "http.probe.ports")]
    Ports { count: usize, targets: String },

    #[serde(rename = "http.probe.commands")]
    Commands { count: usize, commands: String },

    #[serde(rename = "http.probe.call")]
    Call {
        protocol: String,
        method: String,
        target: String,
        attempt: u32,
        /// Status code, or `error`
        status: String,
        error: Option<String>,
    },

    #[serde(rename = "http.probe.call.ws")]
    WebsocketCall {
        target: String,
        attempt: u32,
        status: String,
        read_count: u64,
        ping_count: u64,
        pong_count: u64,
        error: Option<String>,
    },

    #[serde(rename = "http.probe.api-spec.probe.endpoint.call")]
    ApiSpecCall {
        method: String,
        target: String,
        attempt: u32,
        status: String,
        error: Option<String>,
    },

    /// A spec source was skipped (fetch, parse or prefix failure).
    #[serde(rename = "http.probe.api-spec.error")]
    ApiSpecError { source: String, reason: String },

    /// Non-fatal notice, such as a FastCGI command skipping crawl or API-spec probing.
    #[serde(rename = "http.probe.info")]
    Diagnostic { message: String },

    #[serde(rename = "http.probe.error")]
    Error { message: String },

    #[serde(rename = "http.probe.crawler")]
    Crawler { page: usize, url: String },

    #[serde(rename = "http.probe.crawler.stop")]
    CrawlerStop { reason: String },

    #[serde(rename = "probe.crawler.done")]
    CrawlerDone {
        addr: String,
        visited: usize,
        errors: usize,
    },

    #[serde(rename = "http.probe.summary")]
    Summary {
        total: u64,
        failures: u64,
        successful: u64,
    },

    #[serde(rename = "http.probe.done")]
    Done { warning: Option<String> },
}

impl ProbeEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProbeEventKind::Starting => "http.probe.starting",
            ProbeEventKind::StartWait { .. } => "http.probe.start.wait",
            ProbeEventKind::StartWaitDone => "http.probe.start.wait.done",
            ProbeEventKind::Running => "http.probe.running",
            ProbeEventKind::Ports { .. } => "http.probe.ports",
            ProbeEventKind::Commands { .. } => "http.probe.commands",
            ProbeEventKind::Call { .. } => "http.probe.call",
            ProbeEventKind::WebsocketCall { .. } => "http.probe.call.ws",
            ProbeEventKind::ApiSpecCall { .. } => "http.probe.api-spec.probe.endpoint.call",
            ProbeEventKind::ApiSpecError { .. } => "http.probe.api-spec.error",
            ProbeEventKind::Diagnostic { .. } => "http.probe.info",
            ProbeEventKind::Error { .. } => "http.probe.error",
            ProbeEventKind::Crawler { .. } => "http.probe.crawler",
            ProbeEventKind::CrawlerStop { .. } => "http.probe.crawler.stop",
            ProbeEventKind::CrawlerDone { .. } => "probe.crawler.done",
            ProbeEventKind::Summary { .. } => "http.probe.summary",
            ProbeEventKind::Done { .. } => "http.probe.done",
        }
    }
}

/// Optional event channel. Sends never block and a dropped receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<ProbeEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<ProbeEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn emit(&self, kind: ProbeEventKind) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProbeEvent::new(kind));
        }
    }
}
