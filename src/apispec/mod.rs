// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - API Spec Request Synthesizer
 * OpenAPI 3 / Swagger 2 loading and endpoint request synthesis
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod loader;
pub mod model;
pub mod synth;

pub use loader::{is_openapi, is_swagger, load_spec_file, parse_api_spec};
pub use model::{
    ApiSpec, BodySpec, OperationSpec, ParamSpec, PathEntry, SchemaSpec, ServerInfo,
    ServerVariable, SpecVersion,
};
pub use synth::{
    api_spec_prefix, build_query_and_headers, collect_parameters, dummy_request_body,
    json_sample_for_schema, param_string_for_schema, substitute_path_params,
    synthesize_requests, SynthesizedRequest,
};

/// A loaded API document and the prefix to probe it under.
#[derive(Debug, Clone)]
pub struct ApiSpecInfo {
    pub spec: ApiSpec,
    pub prefix_override: Option<String>,
    /// File path or endpoint the document came from
    pub origin: String,
}

impl ApiSpecInfo {
    pub fn new(spec: ApiSpec, prefix_override: Option<String>, origin: impl Into<String>) -> Self {
        Self {
            spec,
            prefix_override: prefix_override.filter(|p| !p.is_empty()),
            origin: origin.into(),
        }
    }

    /// The override when present, otherwise the prefix derived from the servers.
    pub fn prefix(&self) -> String {
        match &self.prefix_override {
            Some(prefix) => prefix.clone(),
            None => api_spec_prefix(&self.spec),
        }
    }
}
