// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Custom Probe Tests
 * End-to-end probe runs against local mock targets
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use lonkero_probe::config::{FastCgiConfig, ProbeCommand, ProbeConfig, Protocol};
use lonkero_probe::events::{EventSink, ProbeEvent, ProbeEventKind};
use lonkero_probe::fastcgi::record::{read_record, write_record, RecordType};
use lonkero_probe::probe::CustomProbe;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

fn http_config(commands: Vec<ProbeCommand>) -> ProbeConfig {
    ProbeConfig {
        commands: commands
            .into_iter()
            .map(|mut cmd| {
                cmd.protocol.get_or_insert(Protocol::Http);
                cmd
            })
            .collect(),
        retry_count: 1,
        retry_wait: 1,
        ..ProbeConfig::default()
    }
}

fn probe_with_events(
    ports: &[u16],
    config: ProbeConfig,
) -> (CustomProbe, mpsc::UnboundedReceiver<ProbeEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let probe = CustomProbe::for_endpoint("127.0.0.1", ports, config)
        .with_base_start_wait(Duration::ZERO)
        .with_event_sink(EventSink::new(tx));
    (probe, rx)
}

async fn run(probe: &CustomProbe) {
    probe.start();
    timeout(RUN_TIMEOUT, probe.wait_done())
        .await
        .expect("probe did not finish in time");
    assert!(probe.is_done());
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ProbeEvent>) -> Vec<ProbeEventKind> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event.kind);
    }
    events
}

fn done_warning(events: &[ProbeEventKind]) -> Option<String> {
    events.iter().find_map(|e| match e {
        ProbeEventKind::Done { warning } => warning.clone(),
        _ => None,
    })
}

async fn ok_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_probe_counts_successful_call() {
    let server = ok_server().await;
    let port = server.address().port();

    let (probe, mut rx) = probe_with_events(&[port], http_config(vec![ProbeCommand::new("GET", "/")]));
    run(&probe).await;

    let stats = probe.counters();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.ok, 1);
    assert_eq!(stats.errors, 0);
    assert!(!probe.is_failure());

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(ProbeEventKind::Starting)));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProbeEventKind::Call { status, .. } if status == "200")));
    assert!(events.iter().any(|e| matches!(
        e,
        ProbeEventKind::Summary { total: 1, failures: 0, successful: 1 }
    )));
    assert_eq!(done_warning(&events), None);
}

#[tokio::test]
async fn test_probe_stops_after_first_successful_port() {
    let first = ok_server().await;
    let second = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&second)
        .await;

    let ports = [first.address().port(), second.address().port()];
    let (probe, _rx) = probe_with_events(&ports, http_config(vec![ProbeCommand::new("GET", "/")]));
    run(&probe).await;

    assert_eq!(probe.counters().total, 1);
}

#[tokio::test]
async fn test_full_probe_covers_every_port() {
    let first = ok_server().await;
    let second = ok_server().await;

    let mut config = http_config(vec![ProbeCommand::new("GET", "/")]);
    config.full = true;

    let ports = [first.address().port(), second.address().port()];
    let (probe, _rx) = probe_with_events(&ports, config);
    run(&probe).await;

    assert_eq!(probe.counters().total, 2);
    assert_eq!(probe.counters().ok, 2);
}

#[tokio::test]
async fn test_unreachable_target_reports_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = http_config(vec![ProbeCommand::new("GET", "/")]);
    config.retry_count = 2;
    config.exit_on_failure = true;

    let (probe, mut rx) = probe_with_events(&[port], config);
    run(&probe).await;

    let stats = probe.counters();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.ok, 0);
    assert!(probe.is_failure());

    let events = drain(&mut rx);
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            ProbeEventKind::Call { attempt, status, .. } if status == "error" => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);
    assert_eq!(done_warning(&events).as_deref(), Some("no.successful.calls"));
}

#[tokio::test]
async fn test_missing_body_file_skips_command() {
    let server = ok_server().await;

    let mut cmd = ProbeCommand::new("POST", "/");
    cmd.body_file = Some(PathBuf::from("/does/not/exist/body.json"));

    let mut config = http_config(vec![cmd]);
    config.exit_on_failure = true;

    let (probe, mut rx) = probe_with_events(&[server.address().port()], config);
    run(&probe).await;

    assert_eq!(probe.counters().total, 0);
    // no calls at all is not a failure
    assert!(!probe.is_failure());

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, ProbeEventKind::Error { .. })));
    assert_eq!(done_warning(&events).as_deref(), Some("no.calls"));
}

#[tokio::test]
async fn test_inline_body_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/items"))
        .and(header("x-probe", "yes"))
        .and(body_json(serde_json::json!({"k": "v"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = ProbeCommand::new("PUT", "/items");
    cmd.body = Some(r#"{"k": "v"}"#.to_string());
    cmd.headers = vec!["X-Probe: yes".to_string()];

    let (probe, _rx) = probe_with_events(&[server.address().port()], http_config(vec![cmd]));
    run(&probe).await;

    assert_eq!(probe.counters().ok, 1);
}

#[tokio::test]
async fn test_api_spec_endpoints_probed_after_first_success() {
    let server = ok_server().await;

    let spec = serde_json::json!({
        "openapi": "3.0.0",
        "info": {"title": "pets", "version": "1"},
        "servers": [{"url": "/api"}],
        "paths": {
            "/pets/{id}": {
                "get": {
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                    ]
                }
            },
            "/pets": {
                "post": {
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {"name": {"type": "string"}}
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(spec))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/pets/1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/pets"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({"name": "string"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = http_config(vec![ProbeCommand::new("GET", "/")]);
    config.api_specs = vec!["/openapi.json".to_string(), "/missing.json".to_string()];

    let (probe, mut rx) = probe_with_events(&[server.address().port()], config);
    run(&probe).await;

    assert_eq!(probe.counters().total, 3);
    assert_eq!(probe.counters().ok, 3);

    let loaded = probe.api_spec_probes();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].prefix(), "/api");

    let events = drain(&mut rx);
    let spec_calls = events
        .iter()
        .filter(|e| matches!(e, ProbeEventKind::ApiSpecCall { .. }))
        .count();
    assert_eq!(spec_calls, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, ProbeEventKind::ApiSpecError { source, .. } if source.ends_with("/missing.json"))));
}

#[tokio::test]
async fn test_crawl_command_waits_for_crawler() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"<a href="/next">next</a>"#, "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>end</p>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = ProbeCommand::new("GET", "/");
    cmd.crawl = true;

    let (probe, mut rx) = probe_with_events(&[server.address().port()], http_config(vec![cmd]));
    run(&probe).await;

    // crawl fetches are not probe calls
    assert_eq!(probe.counters().total, 1);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ProbeEventKind::CrawlerDone { visited: 2, .. })));
}

/// FastCGI responder answering every request with a small HTML page.
async fn fastcgi_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                loop {
                    let Ok(record) = read_record(&mut socket).await else {
                        return;
                    };
                    if record.record_type() == Some(RecordType::Stdin) && record.content.is_empty() {
                        break;
                    }
                }

                let stdout = b"Status: 200 OK\r\nContent-Type: text/html\r\n\r\n<a href=\"/next.php\">next</a>";
                let _ = write_record(&mut socket, RecordType::Stdout, stdout).await;
                let _ = write_record(&mut socket, RecordType::Stdout, &[]).await;
                let _ = write_record(&mut socket, RecordType::EndRequest, &[0u8; 8]).await;
                let _ = socket.flush().await;
            });
        }
    });

    port
}

#[tokio::test]
async fn test_fastcgi_target_skips_crawl_and_api_specs() {
    let port = fastcgi_server().await;

    let mut spec_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    spec_file
        .write_all(br#"{"openapi": "3.0.0", "info": {"title": "php"}, "paths": {"/status": {"get": {}}}}"#)
        .unwrap();

    let mut cmd = ProbeCommand::new("GET", "/index.php");
    cmd.crawl = true;
    cmd.fastcgi = Some(FastCgiConfig {
        root: "/var/www/html".to_string(),
        ..FastCgiConfig::default()
    });

    let mut config = http_config(vec![cmd]);
    config.api_spec_files = vec![spec_file.path().display().to_string()];

    let (probe, mut rx) = probe_with_events(&[port], config);
    assert_eq!(probe.api_spec_probes().len(), 1);
    run(&probe).await;

    assert_eq!(probe.counters().total, 1);
    assert_eq!(probe.counters().ok, 1);

    let events = drain(&mut rx);
    let diagnostics: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ProbeEventKind::Diagnostic { message } => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert!(diagnostics.contains(&"API spec probing not implemented for fastcgi"));
    assert!(diagnostics.contains(&"crawling not implemented for fastcgi"));

    assert!(!events.iter().any(|e| matches!(
        e,
        ProbeEventKind::ApiSpecCall { .. }
            | ProbeEventKind::Crawler { .. }
            | ProbeEventKind::CrawlerStop { .. }
            | ProbeEventKind::CrawlerDone { .. }
    )));
}

#[tokio::test]
async fn test_second_start_is_ignored() {
    let server = ok_server().await;

    let (probe, _rx) = probe_with_events(
        &[server.address().port()],
        http_config(vec![ProbeCommand::new("GET", "/")]),
    );

    probe.start();
    probe.start();
    timeout(RUN_TIMEOUT, probe.wait_done()).await.unwrap();

    assert_eq!(probe.counters().total, 1);
}
