// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Lonkero Probe - API Spec Benchmarks
//! © 2026 Bountyy Oy
//!
//! Spec parsing, request synthesis and crawl link extraction throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lonkero_probe::apispec::{api_spec_prefix, parse_api_spec, synthesize_requests};
use lonkero_probe::crawler::extract_links;
use serde_json::json;
use std::time::Duration;

fn openapi_document(path_count: usize) -> String {
    let mut paths = serde_json::Map::new();

    for i in 0..path_count {
        paths.insert(
            format!("/resource{}/{{id}}", i),
            json!({
                "parameters": [{"name": "id", "in": "path", "schema": {"type": "integer"}}],
                "get": {
                    "parameters": [
                        {"name": "limit", "in": "query", "schema": {"type": "integer"}},
                        {"name": "X-Trace", "in": "header", "schema": {"type": "string"}}
                    ]
                },
                "put": {
                    "requestBody": {
                        "content": {
                            "application/json": {"schema": {"$ref": "#/components/schemas/Item"}}
                        }
                    }
                }
            }),
        );
    }

    json!({
        "openapi": "3.0.0",
        "info": {"title": "bench", "version": "1"},
        "servers": [{"url": "https://{region}.example.com/v2", "variables": {"region": {"default": "eu"}}}],
        "paths": paths,
        "components": {
            "schemas": {
                "Item": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "count": {"type": "integer"},
                        "tags": {"type": "array", "items": {"type": "string"}},
                        "owner": {"$ref": "#/components/schemas/Owner"}
                    }
                },
                "Owner": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer"},
                        "items": {"type": "array", "items": {"$ref": "#/components/schemas/Item"}}
                    }
                }
            }
        }
    })
    .to_string()
}

fn benchmark_parse_api_spec(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_api_spec");

    for size in [10usize, 100, 500] {
        let document = openapi_document(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &document, |b, doc| {
            b.iter(|| parse_api_spec(black_box(doc), "bench"))
        });
    }

    group.finish();
}

fn benchmark_synthesize_requests(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize_requests");

    for size in [10usize, 100, 500] {
        let Ok(spec) = parse_api_spec(&openapi_document(size), "bench") else {
            continue;
        };
        let prefix = api_spec_prefix(&spec);

        group.bench_with_input(BenchmarkId::from_parameter(size), &spec, |b, spec| {
            b.iter(|| synthesize_requests(black_box(spec), "http://127.0.0.1:8080", &prefix))
        });
    }

    group.finish();
}

fn benchmark_extract_links(c: &mut Criterion) {
    let mut html = String::from("<html><head><link rel=\"stylesheet\" href=\"/main.css\"></head><body>");
    for i in 0..200 {
        html.push_str(&format!(
            "<a href=\"/page/{i}\">p{i}</a><img src=\"/img/{i}.png\"><picture><source srcset=\"/s/{i}.webp 1x, /s/{i}@2x.webp 2x\"></picture>"
        ));
    }
    html.push_str("</body></html>");

    let Ok(page_url) = url::Url::parse("http://127.0.0.1:8080/index.html") else {
        return;
    };

    c.bench_function("extract_links", |b| {
        b.iter(|| extract_links(black_box(&html), &page_url))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets = benchmark_parse_api_spec, benchmark_synthesize_requests, benchmark_extract_links
}

criterion_main!(benches);
