// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Custom Probe Orchestrator
 * Drives probe commands over ports and protocols, then crawls and API-spec probing
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

mod apispec;
pub mod ports;
mod runner;
pub mod stats;

pub use ports::{reorder_ports, ContainerPorts, PortMapping, FASTCGI_PORT, HTTPS_PORT, HTTP_PORT};
pub use stats::{CallCounters, CallStats, CompletionSignal, PendingWork, ProbeSummary};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::apispec::{load_spec_file, ApiSpecInfo};
use crate::config::{parse_spec_source, CrawlLimits, ProbeConfig, Protocol};
use crate::crawler::Crawler;
use crate::events::{EventSink, ProbeEventKind};
use crate::retry::RetryPolicy;

/// Fixed warm-up before the first call
pub const BASE_START_WAIT: Duration = Duration::from_secs(9);

/// Probes one target host over its candidate ports.
///
/// ```no_run
/// # use lonkero_probe::config::ProbeConfig;
/// # use lonkero_probe::probe::CustomProbe;
/// # async fn run() {
/// let mut config = ProbeConfig::default();
/// config.ensure_default_probe();
///
/// let probe = CustomProbe::for_endpoint("127.0.0.1", &[8080], config);
/// probe.start();
/// probe.wait_done().await;
/// println!("{:?}", probe.summary());
/// # }
/// ```
pub struct CustomProbe {
    inner: Arc<ProbeInner>,
}

pub(crate) struct ProbeInner {
    host: String,
    ports: Mutex<Vec<String>>,
    config: ProbeConfig,
    retry: RetryPolicy,
    crawl_limits: CrawlLimits,
    api_specs: Mutex<Vec<ApiSpecInfo>>,
    counters: CallCounters,
    completion: Arc<CompletionSignal>,
    crawl_gate: Option<Arc<Semaphore>>,
    events: EventSink,
    base_start_wait: Duration,
    started: AtomicBool,
}

impl CustomProbe {
    /// Probe `host` over already resolved `ports`.
    pub fn new(host: &str, ports: Vec<String>, mut config: ProbeConfig) -> Self {
        config.normalize();

        let retry = RetryPolicy::from_config(config.retry_count, config.retry_wait);
        let crawl_limits = config.crawl_limits();
        let crawl_gate = crawl_limits
            .max_concurrent_crawlers
            .map(|max| Arc::new(Semaphore::new(max.max(1))));

        let api_specs = load_spec_files(&config.api_spec_files);

        Self {
            inner: Arc::new(ProbeInner {
                host: host.to_string(),
                ports: Mutex::new(ports),
                config,
                retry,
                crawl_limits,
                api_specs: Mutex::new(api_specs),
                counters: CallCounters::new(),
                completion: Arc::new(CompletionSignal::new()),
                crawl_gate,
                events: EventSink::disabled(),
                base_start_wait: BASE_START_WAIT,
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Probe a plain endpoint; no ports means port 80.
    pub fn for_endpoint(host: &str, ports: &[u16], config: ProbeConfig) -> Self {
        let ports = if ports.is_empty() {
            vec![HTTP_PORT.to_string()]
        } else {
            ports.iter().map(|p| p.to_string()).collect()
        };

        Self::new(host, ports, config)
    }

    /// Probe a container, resolving candidate ports from its port layout.
    pub fn for_container(host: &str, container: &ContainerPorts, config: ProbeConfig) -> Self {
        let ports = container.resolve(&config.ports);
        Self::new(host, ports, config)
    }

    /// Override the fixed warm-up. Has no effect once the probe is started.
    pub fn with_base_start_wait(mut self, wait: Duration) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.base_start_wait = wait,
            None => warn!("Probe already started, ignoring start wait override"),
        }
        self
    }

    /// Report events on `events`. Has no effect once the probe is started.
    pub fn with_event_sink(mut self, events: EventSink) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.events = events,
            None => warn!("Probe already started, ignoring event sink"),
        }
        self
    }

    /// Spawn the probe task and return immediately. Must be called within a Tokio runtime.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            warn!(host = %self.inner.host, "Probe already started");
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(runner::run(inner));
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Candidate ports in probing order.
    pub fn ports(&self) -> Vec<String> {
        self.inner.ports.lock().clone()
    }

    pub async fn wait_done(&self) {
        self.inner.completion.wait().await
    }

    pub fn is_done(&self) -> bool {
        self.inner.completion.is_done()
    }

    pub fn counters(&self) -> CallStats {
        self.inner.counters.snapshot()
    }

    pub fn summary(&self) -> ProbeSummary {
        self.inner.counters.snapshot().into()
    }

    /// True when calls were made, none succeeded and `exit_on_failure` is set.
    pub fn is_failure(&self) -> bool {
        self.summary().is_failure(self.inner.config.exit_on_failure)
    }

    /// API documents loaded so far (files at construction, endpoints after the first success).
    pub fn api_spec_probes(&self) -> Vec<ApiSpecInfo> {
        self.inner.api_specs.lock().clone()
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.inner.config
    }

    /// Start a background crawl of `start_address`, restricted to `domain`.
    pub fn crawl(&self, protocol: Protocol, domain: &str, start_address: &str) {
        self.inner.crawl(protocol, domain, start_address);
    }
}

impl ProbeInner {
    /// Register a crawl worker and spawn it. The worker waits for a gate
    /// permit before crawling.
    pub(crate) fn crawl(&self, protocol: Protocol, domain: &str, start_address: &str) {
        let crawler = match Crawler::new(protocol, domain, &self.crawl_limits, self.events.clone()) {
            Ok(crawler) => crawler,
            Err(e) => {
                warn!("HTTP probe - construct crawl client error - {}", e);
                self.events.emit(ProbeEventKind::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        let pending = self.completion.track();
        let gate = self.crawl_gate.clone();
        let start_address = start_address.to_string();

        tokio::spawn(async move {
            let _pending = pending;

            let _permit = match gate {
                Some(gate) => match gate.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            debug!(addr = %start_address, "Crawler started");
            crawler.crawl(&start_address).await;
        });
    }
}

fn load_spec_files(sources: &[String]) -> Vec<ApiSpecInfo> {
    let mut specs = Vec::new();

    for source in sources {
        let (path, prefix) = parse_spec_source(source);
        match load_spec_file(&path) {
            Ok(spec) => {
                info!(
                    file = %path,
                    title = %spec.title,
                    operations = spec.operation_count(),
                    "Loaded API spec file"
                );
                specs.push(ApiSpecInfo::new(spec, prefix, path));
            }
            Err(e) => warn!("Error loading API spec file {}: {}", path, e),
        }
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_for_endpoint_defaults_to_port_80() {
        let probe = CustomProbe::for_endpoint("127.0.0.1", &[], ProbeConfig::default());
        assert_eq!(probe.ports(), vec!["80".to_string()]);
        assert_eq!(probe.counters(), CallStats::default());
        assert!(!probe.is_done());
    }

    #[test]
    fn test_construction_normalizes_crawl_limits() {
        let config = ProbeConfig {
            crawl_max_concurrent_crawlers: -1,
            ..ProbeConfig::default()
        };

        let probe = CustomProbe::for_endpoint("127.0.0.1", &[8080], config);
        assert_eq!(probe.config().crawl_max_depth, 3);
        assert_eq!(probe.config().crawl_max_page_count, 1000);
        assert!(probe.inner.crawl_gate.is_none());
    }

    #[test]
    fn test_spec_files_loaded_at_construction() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"openapi": "3.0.0", "info": {{"title": "t"}}, "paths": {{"/ping": {{"get": {{}}}}}}}}"#
        )
        .unwrap();

        let config = ProbeConfig {
            api_spec_files: vec![
                format!("{}:/v2", file.path().display()),
                "/does/not/exist.yaml".to_string(),
            ],
            ..ProbeConfig::default()
        };

        let probe = CustomProbe::for_endpoint("127.0.0.1", &[80], config);
        let specs = probe.api_spec_probes();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].prefix(), "/v2");
        assert_eq!(specs[0].spec.operation_count(), 1);
    }
}
