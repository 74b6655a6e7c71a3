// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Crawler
 * Same-domain link walker used after a successful probe call
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::{CrawlLimits, Protocol};
use crate::errors::{CallError, ProbeResult};
use crate::events::{EventSink, ProbeEventKind};
use crate::http_client::build_crawl_client;

pub const CRAWLER_USER_AGENT: &str = "ds.crawler";

/// `link` relations that never point at crawlable content
const SKIPPED_LINK_RELS: &[&str] = &["dns-prefetch", "preconnect", "alternate"];

/// Statistics of one finished crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub addr: String,
    /// Pages fetched successfully
    pub visited: usize,
    /// Failed fetches
    pub errors: usize,
    /// Requests issued (including failed ones)
    pub requested: usize,
    /// True when the page limit aborted at least one request
    pub stopped: bool,
}

struct CrawlState {
    seen: HashSet<String>,
    queue: VecDeque<(Url, usize)>,
    page_count: usize,
}

/// Crawls one site, staying on `domain`.
pub struct Crawler {
    client: Client,
    domain: String,
    max_depth: Option<usize>,
    max_page_count: Option<usize>,
    concurrency: usize,
    events: EventSink,
}

impl Crawler {
    /// Crawler with its own client for `protocol`.
    pub fn new(protocol: Protocol, domain: &str, limits: &CrawlLimits, events: EventSink) -> ProbeResult<Self> {
        let client = build_crawl_client(protocol, CRAWLER_USER_AGENT)?;
        Ok(Self::with_client(client, domain, limits, events))
    }

    pub fn with_client(client: Client, domain: &str, limits: &CrawlLimits, events: EventSink) -> Self {
        Self {
            client,
            domain: domain.to_string(),
            max_depth: limits.max_depth,
            max_page_count: limits.max_page_count,
            // no limit means unbounded parallel fetches
            concurrency: limits.concurrency.unwrap_or(usize::MAX).max(1),
            events,
        }
    }

    /// Crawl from `start_address` until the frontier is exhausted.
    ///
    /// The start page is depth 1. A request is aborted once more than
    /// `max_page_count` pages have been requested.
    pub async fn crawl(&self, start_address: &str) -> CrawlReport {
        let mut report = CrawlReport {
            addr: start_address.to_string(),
            ..CrawlReport::default()
        };

        info!("[Crawler] Starting crawl of {}", start_address);

        let mut state = CrawlState {
            seen: HashSet::new(),
            queue: VecDeque::new(),
            page_count: 0,
        };

        match Url::parse(start_address) {
            Ok(start) => self.visit(&mut state, start, 1),
            Err(e) => {
                warn!("Invalid crawl address {}: {}", start_address, e);
                report.errors += 1;
            }
        }

        let mut in_flight: JoinSet<(Url, usize, Result<Option<String>, CallError>)> = JoinSet::new();

        loop {
            while in_flight.len() < self.concurrency {
                let Some((url, depth)) = state.queue.pop_front() else {
                    break;
                };

                self.events.emit(ProbeEventKind::Crawler {
                    page: state.page_count,
                    url: url.to_string(),
                });

                if self.page_limit_reached(state.page_count) {
                    debug!(url = %url, max = ?self.max_page_count, "Reached max page count, aborting request");
                    self.events.emit(ProbeEventKind::CrawlerStop {
                        reason: "reached max visits".to_string(),
                    });
                    report.stopped = true;
                    continue;
                }

                state.page_count += 1;
                report.requested += 1;

                let client = self.client.clone();
                in_flight.spawn(async move {
                    let result = fetch_page(&client, &url).await;
                    (url, depth, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((url, depth, Ok(html))) => {
                    report.visited += 1;

                    let Some(html) = html else {
                        continue;
                    };

                    if self.page_limit_reached(state.page_count) {
                        trace!(url = %url, "Reached max page count, ignoring links");
                        continue;
                    }

                    let links = extract_links(&html, &url);
                    debug!(url = %url, depth = depth, links = links.len(), "Crawled page");

                    for link in links {
                        self.visit(&mut state, link, depth + 1);
                    }
                }
                Ok((url, _, Err(e))) => {
                    report.errors += 1;
                    trace!(url = %url, error = %e, "Crawl fetch failed");
                }
                Err(e) => {
                    report.errors += 1;
                    warn!("Crawl task failed: {}", e);
                }
            }
        }

        info!(
            "[SUCCESS] Crawl complete: {} pages, {} errors",
            report.visited, report.errors
        );

        self.events.emit(ProbeEventKind::CrawlerDone {
            addr: report.addr.clone(),
            visited: report.visited,
            errors: report.errors,
        });

        report
    }

    fn page_limit_reached(&self, page_count: usize) -> bool {
        matches!(self.max_page_count, Some(max) if page_count > max)
    }

    /// Queue `url` unless it is off-domain, too deep or already seen.
    fn visit(&self, state: &mut CrawlState, mut url: Url, depth: usize) {
        if !matches!(url.scheme(), "http" | "https") {
            return;
        }

        if url.host_str() != Some(self.domain.as_str()) {
            return;
        }

        if matches!(self.max_depth, Some(max) if depth > max) {
            return;
        }

        url.set_fragment(None);
        if !state.seen.insert(url.to_string()) {
            return;
        }

        state.queue.push_back((url, depth));
    }
}

/// Fetch one page; returns its body when it is HTML.
async fn fetch_page(client: &Client, url: &Url) -> Result<Option<String>, CallError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| CallError::from_reqwest(url.as_str(), &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CallError::Web {
            target: url.to_string(),
            reason: format!("status {}", status),
        });
    }

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("html"))
        .unwrap_or(false);

    if !is_html {
        let _ = response.bytes().await;
        return Ok(None);
    }

    response
        .text()
        .await
        .map(Some)
        .map_err(|e| CallError::from_reqwest(url.as_str(), &e))
}

/// Every candidate link on a page, resolved against `page_url`.
pub fn extract_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut raw: Vec<String> = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        raw.extend(
            document
                .select(&selector)
                .filter_map(|e| e.value().attr("href"))
                .map(String::from),
        );
    }

    if let Ok(selector) = Selector::parse("link[href]") {
        for element in document.select(&selector) {
            let rel = element.value().attr("rel").unwrap_or("").trim().to_lowercase();
            if SKIPPED_LINK_RELS.contains(&rel.as_str()) {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                raw.push(href.to_string());
            }
        }
    }

    if let Ok(selector) = Selector::parse("script[src], source[src], img[src]") {
        raw.extend(
            document
                .select(&selector)
                .filter_map(|e| e.value().attr("src"))
                .map(String::from),
        );
    }

    if let Ok(selector) = Selector::parse("source[srcset]") {
        for element in document.select(&selector) {
            if let Some(srcset) = element.value().attr("srcset") {
                raw.extend(srcset_candidates(srcset));
            }
        }
    }

    if let Ok(selector) = Selector::parse("[data-src]") {
        raw.extend(
            document
                .select(&selector)
                .filter_map(|e| e.value().attr("data-src"))
                .map(String::from),
        );
    }

    raw.iter()
        .map(|link| link.trim())
        .filter(|link| !link.is_empty())
        .filter_map(|link| page_url.join(link).ok())
        .collect()
}

/// URLs of a `srcset` attribute (`a.png 1x, b.png 2x`).
fn srcset_candidates(srcset: &str) -> Vec<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_depth: Option<usize>, max_page_count: Option<usize>) -> CrawlLimits {
        CrawlLimits {
            max_depth,
            max_page_count,
            concurrency: Some(1),
            max_concurrent_crawlers: Some(1),
        }
    }

    #[test]
    fn test_extract_links_sources() {
        let html = r#"
            <html><head>
                <link rel="stylesheet" href="/style.css">
                <link rel="preconnect" href="https://cdn.example.com">
                <link rel="alternate" href="/feed.xml">
                <script src="app.js"></script>
            </head><body>
                <a href="/about#team">About</a>
                <img src="/logo.png">
                <picture><source srcset="/small.webp 1x, /large.webp 2x"></picture>
                <div data-src="/lazy.jpg"></div>
                <a href="">empty</a>
            </body></html>
        "#;

        let base = Url::parse("http://127.0.0.1:8080/docs/").unwrap();
        let links: Vec<String> = extract_links(html, &base).iter().map(|u| u.to_string()).collect();

        assert!(links.contains(&"http://127.0.0.1:8080/about#team".to_string()));
        assert!(links.contains(&"http://127.0.0.1:8080/style.css".to_string()));
        assert!(links.contains(&"http://127.0.0.1:8080/docs/app.js".to_string()));
        assert!(links.contains(&"http://127.0.0.1:8080/logo.png".to_string()));
        assert!(links.contains(&"http://127.0.0.1:8080/small.webp".to_string()));
        assert!(links.contains(&"http://127.0.0.1:8080/large.webp".to_string()));
        assert!(links.contains(&"http://127.0.0.1:8080/lazy.jpg".to_string()));
        assert!(!links.iter().any(|l| l.contains("cdn.example.com")));
        assert!(!links.iter().any(|l| l.contains("feed.xml")));
    }

    #[test]
    fn test_srcset_candidates() {
        assert_eq!(srcset_candidates("a.png"), vec!["a.png"]);
        assert_eq!(srcset_candidates(" a.png 480w,  b.png 800w "), vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_visit_filters() {
        let crawler = Crawler::with_client(
            Client::new(),
            "127.0.0.1",
            &limits(Some(2), None),
            EventSink::disabled(),
        );

        let mut state = CrawlState {
            seen: HashSet::new(),
            queue: VecDeque::new(),
            page_count: 0,
        };

        crawler.visit(&mut state, Url::parse("http://127.0.0.1/a#x").unwrap(), 1);
        crawler.visit(&mut state, Url::parse("http://127.0.0.1/a#y").unwrap(), 1);
        crawler.visit(&mut state, Url::parse("http://example.com/").unwrap(), 1);
        crawler.visit(&mut state, Url::parse("ftp://127.0.0.1/file").unwrap(), 1);
        crawler.visit(&mut state, Url::parse("http://127.0.0.1/deep").unwrap(), 3);
        crawler.visit(&mut state, Url::parse("http://127.0.0.1/b").unwrap(), 2);

        let queued: Vec<String> = state.queue.iter().map(|(u, _)| u.to_string()).collect();
        assert_eq!(queued, vec!["http://127.0.0.1/a", "http://127.0.0.1/b"]);
    }

    #[tokio::test]
    async fn test_invalid_start_address_reports_error() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let crawler = Crawler::with_client(Client::new(), "127.0.0.1", &limits(None, None), EventSink::new(tx));

        let report = crawler.crawl("not a url").await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.requested, 0);
        assert_eq!(rx.try_recv().unwrap().name(), "probe.crawler.done");
    }
}
