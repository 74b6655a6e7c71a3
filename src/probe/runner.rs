// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};

use super::ports::{reorder_ports, FASTCGI_PORT};
use super::{apispec, ProbeInner};
use crate::config::{ProbeCommand, Protocol};
use crate::events::ProbeEventKind;
use crate::http_client::{http_addr, ProbeClient, ProbeRequest};
use crate::retry::CallRecorder;
use crate::websocket::WebsocketSession;

const WS_PROBE_DATA: &str = "ws.data";
const WS_READ_QUEUE_SIZE: usize = 10;
const WS_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands listed in the `commands` event before eliding the rest
const COMMAND_PREVIEW_LEN: usize = 3;

/// The probe task: warm-up, then the port x command x protocol matrix.
pub(super) async fn run(inner: Arc<ProbeInner>) {
    let events = &inner.events;

    events.emit(ProbeEventKind::Starting);
    sleep(inner.base_start_wait).await;

    if inner.config.start_wait > 0 {
        events.emit(ProbeEventKind::StartWait {
            seconds: inner.config.start_wait,
        });
        sleep(Duration::from_secs(inner.config.start_wait)).await;
        events.emit(ProbeEventKind::StartWaitDone);
    }

    events.emit(ProbeEventKind::Running);
    info!(host = %inner.host, "HTTP probe started...");

    let ports = {
        let mut ports = inner.ports.lock();
        reorder_ports(&mut ports);
        ports.clone()
    };

    events.emit(ProbeEventKind::Ports {
        count: ports.len(),
        targets: ports.join(","),
    });
    events.emit(ProbeEventKind::Commands {
        count: inner.config.commands.len(),
        commands: command_preview(&inner.config.commands),
    });

    for port in &ports {
        if inner.counters.snapshot().ok > 0 && !inner.config.full {
            debug!(port = %port, "Probe succeeded, skipping remaining ports");
            break;
        }

        for cmd in &inner.config.commands {
            probe_command(&inner, port, cmd).await;
        }
    }

    let summary: super::ProbeSummary = inner.counters.snapshot().into();
    info!(
        total = summary.total,
        failures = summary.failures,
        successful = summary.successful,
        "HTTP probe done."
    );

    events.emit(ProbeEventKind::Summary {
        total: summary.total,
        failures: summary.failures,
        successful: summary.successful,
    });
    events.emit(ProbeEventKind::Done {
        warning: summary.warning().map(String::from),
    });

    inner.completion.release();
}

async fn probe_command(inner: &ProbeInner, port: &str, cmd: &ProbeCommand) {
    let body = match cmd.body_source().and_then(|source| source.load()) {
        Ok(body) => body,
        Err(e) => {
            error!("HTTP probe - {} {} skipped: {}", cmd.method, cmd.resource, e);
            inner.events.emit(ProbeEventKind::Error {
                message: e.to_string(),
            });
            return;
        }
    };

    let cmd = if port == FASTCGI_PORT && cmd.fastcgi.is_none() {
        debug!(port = %port, "FastCGI default port used, applying FastCGI defaults");
        cmd.with_fastcgi_defaults()
    } else {
        cmd.clone()
    };

    let protocols = match cmd.protocol {
        Some(protocol) => vec![protocol],
        None => Protocol::defaults_for_port(port),
    };

    for protocol in protocols {
        if protocol.is_websocket() {
            probe_websocket(inner, protocol, port).await;
            continue;
        }

        probe_http(inner, protocol, port, &cmd, body.clone()).await;
    }
}

async fn probe_http(inner: &ProbeInner, protocol: Protocol, port: &str, cmd: &ProbeCommand, body: Option<Vec<u8>>) {
    let client = match ProbeClient::for_command(cmd, protocol) {
        Ok(client) => client,
        Err(e) => {
            error!("HTTP probe - construct client error - {}", e);
            inner.events.emit(ProbeEventKind::Error {
                message: e.to_string(),
            });
            return;
        }
    };

    let addr = format!("{}{}", http_addr(protocol, &inner.host, port), cmd.resource);

    let request = match ProbeRequest::from_command(cmd, &addr, body) {
        Ok(request) => request,
        Err(e) => {
            error!("HTTP probe - construct request error - {}", e);
            inner.events.emit(ProbeEventKind::Error {
                message: e.to_string(),
            });
            return;
        }
    };

    let first_success_pending = inner.counters.snapshot().ok == 0;

    let outcome = inner
        .retry
        .run("http.probe.call", &inner.counters, |attempt| {
            let client = &client;
            let request = &request;
            let addr = &addr;
            async move {
                let result = client.execute(request).await;

                let (status, error) = match &result {
                    Ok(response) => (response.status.to_string(), None),
                    Err(e) => ("error".to_string(), Some(e.to_string())),
                };

                inner.events.emit(ProbeEventKind::Call {
                    protocol: protocol.to_string(),
                    method: cmd.method.clone(),
                    target: addr.clone(),
                    attempt,
                    status,
                    error,
                });

                result
            }
        })
        .await;

    if !outcome.is_success() {
        return;
    }

    if first_success_pending {
        if client.is_fastcgi() && inner.config.has_api_specs() {
            inner.events.emit(ProbeEventKind::Diagnostic {
                message: "API spec probing not implemented for fastcgi".to_string(),
            });
        } else {
            apispec::probe_api_specs(inner, protocol, port).await;
        }
    }

    if cmd.crawl {
        if client.is_fastcgi() {
            inner.events.emit(ProbeEventKind::Diagnostic {
                message: "crawling not implemented for fastcgi".to_string(),
            });
        } else {
            inner.crawl(protocol, &inner.host, &addr);
        }
    }
}

/// Connect, ping, write one frame and wait briefly for a reply.
async fn probe_websocket(inner: &ProbeInner, protocol: Protocol, port: &str) {
    let mut session = match WebsocketSession::new(protocol, &inner.host, port) {
        Ok(session) => session,
        Err(e) => {
            debug!("HTTP probe - new websocket error - {}", e);
            return;
        }
    };

    let mut read_rx = session.read_channel(WS_READ_QUEUE_SIZE);
    let max_attempts = inner.retry.max_attempts;
    let not_ready_wait = inner.retry.not_ready_wait;

    for attempt in 1..=max_attempts {
        if let Err(e) = session.connect().await {
            debug!("HTTP probe - ws target not ready yet (retry again later) [err={}]...", e);
            if attempt < max_attempts {
                sleep(not_ready_wait).await;
            }
            continue;
        }

        if let Err(e) = session.check_connection().await {
            debug!(addr = %session.addr(), error = %e, "Websocket connection check failed");
        }

        let result = session.write_string(WS_PROBE_DATA).await;
        let stats = session.stats();

        inner.events.emit(ProbeEventKind::WebsocketCall {
            target: session.addr().to_string(),
            attempt,
            status: if result.is_ok() { "ok" } else { "error" }.to_string(),
            read_count: stats.read_count,
            ping_count: stats.ping_count,
            pong_count: stats.pong_count,
            error: result.as_ref().err().map(|e| e.to_string()),
        });

        match result {
            Ok(()) => {
                inner.counters.record_success();

                match timeout(WS_READ_TIMEOUT, read_rx.recv()).await {
                    Ok(Some(message)) => debug!(
                        kind = ?message.kind,
                        data = %String::from_utf8_lossy(&message.data),
                        "HTTP probe - websocket read"
                    ),
                    _ => debug!("HTTP probe - websocket read time out"),
                }
                break;
            }
            Err(e) => {
                inner.counters.record_error();
                debug!("HTTP probe - websocket write error - {}", e);
                if attempt < max_attempts {
                    sleep(not_ready_wait).await;
                }
            }
        }
    }

    if let Err(e) = session.disconnect().await {
        debug!(error = %e, "Websocket disconnect failed");
    }
}

/// `GET /,POST /submit,PUT /x,...`
fn command_preview(commands: &[ProbeCommand]) -> String {
    let mut preview = commands
        .iter()
        .take(COMMAND_PREVIEW_LEN)
        .map(|c| format!("{} {}", c.method, c.resource))
        .collect::<Vec<_>>()
        .join(",");

    if commands.len() > COMMAND_PREVIEW_LEN {
        preview.push_str(",...");
    }

    preview
}
