// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! API-spec endpoint probing, triggered by the first successful call.

use tracing::{debug, error, info};

use super::ProbeInner;
use crate::apispec::{parse_api_spec, synthesize_requests, ApiSpec, ApiSpecInfo, SynthesizedRequest};
use crate::config::{parse_spec_source, Protocol};
use crate::errors::{ProbeError, ProbeResult};
use crate::events::ProbeEventKind;
use crate::http_client::{http_addr, ProbeClient, ProbeRequest};

/// Fetch the live API documents, then call every synthesized endpoint of
/// every loaded document.
pub(super) async fn probe_api_specs(inner: &ProbeInner, protocol: Protocol, port: &str) {
    let client = match ProbeClient::for_protocol(protocol) {
        Ok(client) => client,
        Err(e) => {
            error!("HTTP probe - construct client error - {}", e);
            return;
        }
    };

    let addr = http_addr(protocol, &inner.host, port);

    load_live_specs(inner, &client, &addr).await;

    let specs = inner.api_specs.lock().clone();
    for info in &specs {
        let prefix = info.prefix();
        probe_endpoints(inner, &client, &addr, &prefix, info).await;
    }
}

async fn load_live_specs(inner: &ProbeInner, client: &ProbeClient, addr: &str) {
    for source in &inner.config.api_specs {
        let (path, prefix) = parse_spec_source(source);
        let endpoint = format!("{}{}", addr, path);

        match fetch_spec(client, &endpoint).await {
            Ok(spec) => {
                info!(
                    endpoint = %endpoint,
                    title = %spec.title,
                    operations = spec.operation_count(),
                    "Loaded API spec"
                );
                inner.api_specs.lock().push(ApiSpecInfo::new(spec, prefix, endpoint));
            }
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Error loading API spec from endpoint");
                inner.events.emit(ProbeEventKind::ApiSpecError {
                    source: endpoint,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// One plain GET, no retries.
async fn fetch_spec(client: &ProbeClient, endpoint: &str) -> ProbeResult<ApiSpec> {
    let request = ProbeRequest::new("GET", endpoint)?;

    let response = client
        .execute(&request)
        .await
        .map_err(|e| ProbeError::SpecFetch {
            origin: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    parse_api_spec(&response.text(), endpoint)
}

async fn probe_endpoints(inner: &ProbeInner, client: &ProbeClient, addr: &str, prefix: &str, info: &ApiSpecInfo) {
    let requests = synthesize_requests(&info.spec, addr, prefix);

    debug!(
        addr = %addr,
        prefix = %prefix,
        endpoints = info.spec.paths.len(),
        requests = requests.len(),
        "Probing API spec endpoints"
    );

    for synthesized in &requests {
        endpoint_call(inner, client, synthesized).await;
    }
}

async fn endpoint_call(inner: &ProbeInner, client: &ProbeClient, synthesized: &SynthesizedRequest) {
    let request = match build_request(synthesized) {
        Ok(request) => request,
        Err(e) => {
            error!("HTTP probe - construct request error - {}", e);
            return;
        }
    };

    inner
        .retry
        .run("http.probe.api-spec.call", &inner.counters, |attempt| {
            let request = &request;
            async move {
                let result = client.execute(request).await;

                let (status, error) = match &result {
                    Ok(response) => (response.status.to_string(), None),
                    Err(e) => ("error".to_string(), Some(e.to_string())),
                };

                inner.events.emit(ProbeEventKind::ApiSpecCall {
                    method: synthesized.method.clone(),
                    target: synthesized.endpoint.clone(),
                    attempt,
                    status,
                    error,
                });

                result
            }
        })
        .await;
}

fn build_request(synthesized: &SynthesizedRequest) -> ProbeResult<ProbeRequest> {
    let mut request = ProbeRequest::new(&synthesized.method, &synthesized.endpoint)?;

    for (name, value) in &synthesized.headers {
        request.add_header(name, value);
    }

    if let Some(content_type) = &synthesized.content_type {
        request.add_header("Content-Type", content_type);
    }

    request.body = synthesized.body.clone();
    Ok(request)
}
