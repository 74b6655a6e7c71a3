// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request synthesis from API documents: prefixes, parameter samples and
//! JSON request bodies.

use serde_json::{Map, Value};
use url::Url;

use super::model::{ApiSpec, OperationSpec, ParamSpec, PathEntry, SchemaSpec};

/// Methods that carry a synthesized request body
pub const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

const JSON_CONTENT_TYPE: &str = "application/json";

/// A request derived from one path/operation pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedRequest {
    /// Upper-case HTTP method
    pub method: String,
    /// `addr + prefix + path[?query]`
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

/// URL path of the first server entry, with server variables substituted.
/// Returns an empty string when there is no usable path.
pub fn api_spec_prefix(spec: &ApiSpec) -> String {
    let Some(server) = spec.servers.first() else {
        return String::new();
    };

    let mut url = server.url.clone();
    if url.contains('{') {
        for (name, var) in &server.variables {
            let placeholder = format!("{{{}}}", name);
            if !url.contains(&placeholder) {
                continue;
            }

            let value = var
                .default
                .as_deref()
                .or_else(|| var.enum_values.first().map(String::as_str))
                .unwrap_or("var");
            url = url.replace(&placeholder, value);
        }

        url = url.replace(['{', '}'], "");
    }

    let parsed = match Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            match Url::parse("http://localhost").and_then(|base| base.join(&url)) {
                Ok(parsed) => parsed,
                Err(_) => return String::new(),
            }
        }
        Err(_) => return String::new(),
    };

    let path = urlencoding::decode(parsed.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| parsed.path().to_string());

    if path.is_empty() || path == "/" {
        String::new()
    } else {
        path
    }
}

/// Path-level parameters overlaid with operation-level ones; an operation
/// parameter replaces a path parameter with the same location and name.
pub fn collect_parameters(entry: &PathEntry, op: &OperationSpec) -> Vec<ParamSpec> {
    let mut params: Vec<ParamSpec> = Vec::with_capacity(entry.parameters.len() + op.parameters.len());

    for param in entry.parameters.iter().chain(op.parameters.iter()) {
        match params.iter_mut().find(|p| p.key() == param.key()) {
            Some(existing) => *existing = param.clone(),
            None => params.push(param.clone()),
        }
    }

    params
}

pub fn substitute_path_params(api_path: &str, params: &[ParamSpec]) -> String {
    if !api_path.contains('{') {
        return api_path.to_string();
    }

    let mut path = api_path.to_string();
    for param in params.iter().filter(|p| p.location == "path") {
        let placeholder = format!("{{{}}}", param.name);
        if path.contains(&placeholder) {
            let value = param_string_for_schema(param.schema.as_ref());
            path = path.replace(&placeholder, &urlencoding::encode(&value));
        }
    }

    // unknown placeholders keep their name
    path.replace(['{', '}'], "")
}

/// Query string (without `?`) and headers for the `query` and `header` parameters.
pub fn build_query_and_headers(params: &[ParamSpec]) -> (String, Vec<(String, String)>) {
    let mut parts = Vec::new();
    let mut headers: Vec<(String, String)> = Vec::new();

    for param in params {
        match param.location.as_str() {
            "query" => {
                let value = param_value(param.schema.as_ref());
                parts.push(format!("{}={}", query_escape(&param.name), query_escape(&value)));
            }
            "header" => {
                let value = param_value(param.schema.as_ref());
                match headers.iter_mut().find(|(name, _)| name == &param.name) {
                    Some(header) => header.1 = value,
                    None => headers.push((param.name.clone(), value)),
                }
            }
            _ => {}
        }
    }

    (parts.join("&"), headers)
}

fn param_value(schema: Option<&SchemaSpec>) -> String {
    match schema {
        Some(s) if s.is_type("object") => {
            serde_json::to_string(&json_sample_for_schema(schema)).unwrap_or_else(|_| "{}".to_string())
        }
        _ => param_string_for_schema(schema),
    }
}

fn query_escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Sample JSON body and its content type. Only JSON media types produce a body.
pub fn dummy_request_body(op: &OperationSpec) -> Option<(Vec<u8>, String)> {
    let body = op.request_body.as_ref()?;

    let (content_type, schema) = match body.media_type(JSON_CONTENT_TYPE) {
        Some(schema) => (JSON_CONTENT_TYPE, schema),
        None => {
            let (ct, schema) = body.content.first()?;
            (ct.as_str(), schema)
        }
    };

    let schema = schema.as_ref()?;
    if !content_type.contains("json") {
        return None;
    }

    let data = serde_json::to_vec(&json_sample_for_schema(Some(schema))).ok()?;
    Some((data, content_type.to_string()))
}

/// String value for a path, query or header parameter.
pub fn param_string_for_schema(schema: Option<&SchemaSpec>) -> String {
    let Some(schema) = schema else {
        return "x".to_string();
    };

    if let Some(first) = schema.enum_values.first() {
        return match first {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => "1".to_string(),
        };
    }

    match schema.schema_type.as_deref() {
        Some("integer") | Some("number") => "1".to_string(),
        Some("boolean") => "true".to_string(),
        Some("array") => param_string_for_schema(schema.items.as_deref()),
        _ => "x".to_string(),
    }
}

/// Recursive JSON sample for a schema; a missing schema samples as `{}`.
pub fn json_sample_for_schema(schema: Option<&SchemaSpec>) -> Value {
    let Some(schema) = schema else {
        return Value::Object(Map::new());
    };

    if let Some(first) = schema.enum_values.first() {
        return first.clone();
    }

    match schema.schema_type.as_deref() {
        Some("integer") | Some("number") => Value::from(1),
        Some("boolean") => Value::Bool(true),
        Some("array") => Value::Array(vec![json_sample_for_schema(schema.items.as_deref())]),
        Some("object") => Value::Object(
            schema
                .properties
                .iter()
                .map(|(name, prop)| (name.clone(), json_sample_for_schema(prop.as_ref())))
                .collect(),
        ),
        _ => Value::String("string".to_string()),
    }
}

/// Every path/operation pair of `spec` as a concrete request against `addr`.
pub fn synthesize_requests(spec: &ApiSpec, addr: &str, prefix: &str) -> Vec<SynthesizedRequest> {
    let mut requests = Vec::with_capacity(spec.operation_count());

    for entry in &spec.paths {
        for op in &entry.operations {
            let params = collect_parameters(entry, op);
            let path = substitute_path_params(&entry.path, &params);
            let (query, headers) = build_query_and_headers(&params);

            let mut endpoint = format!("{}{}{}", addr, prefix, path);
            if !query.is_empty() {
                endpoint.push(if endpoint.contains('?') { '&' } else { '?' });
                endpoint.push_str(&query);
            }

            let method = op.method.to_uppercase();
            let (body, content_type) = match dummy_request_body(op) {
                Some((data, ct)) if BODY_METHODS.contains(&method.as_str()) => (Some(data), Some(ct)),
                Some((_, ct)) => (None, Some(ct)),
                None => (None, None),
            };

            requests.push(SynthesizedRequest {
                method,
                endpoint,
                headers,
                body,
                content_type,
            });
        }
    }

    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apispec::model::{BodySpec, ServerInfo, ServerVariable, SpecVersion};

    fn spec_with_server(url: &str, variables: Vec<(String, ServerVariable)>) -> ApiSpec {
        ApiSpec {
            version: SpecVersion::OpenApi3,
            title: "test".to_string(),
            servers: vec![ServerInfo {
                url: url.to_string(),
                variables,
            }],
            paths: Vec::new(),
        }
    }

    #[test]
    fn test_prefix_from_server_variables() {
        let spec = spec_with_server(
            "https://{env}.example.com/{base}/v1",
            vec![
                (
                    "env".to_string(),
                    ServerVariable {
                        default: Some("prod".to_string()),
                        enum_values: vec![],
                    },
                ),
                (
                    "base".to_string(),
                    ServerVariable {
                        default: None,
                        enum_values: vec!["api".to_string()],
                    },
                ),
            ],
        );
        assert_eq!(api_spec_prefix(&spec), "/api/v1");
    }

    #[test]
    fn test_prefix_unknown_variable_and_relative_url() {
        let spec = spec_with_server(
            "/{tenant}/api",
            vec![("tenant".to_string(), ServerVariable::default())],
        );
        assert_eq!(api_spec_prefix(&spec), "/var/api");

        let spec = spec_with_server("/{missing}/api", vec![]);
        assert_eq!(api_spec_prefix(&spec), "/missing/api");

        let spec = spec_with_server("https://example.com/", vec![]);
        assert_eq!(api_spec_prefix(&spec), "");
    }

    #[test]
    fn test_substitute_path_params() {
        let params = vec![ParamSpec::new("id", "path", Some(SchemaSpec::of_type("integer")))];
        assert_eq!(
            substitute_path_params("/pets/{id}/owners/{ownerId}", &params),
            "/pets/1/owners/ownerId"
        );

        let params = vec![
            ParamSpec::new("id", "path", Some(SchemaSpec::of_type("integer"))),
            ParamSpec::new("ownerId", "path", Some(SchemaSpec::of_type("string"))),
        ];
        assert_eq!(
            substitute_path_params("/pets/{id}/owners/{ownerId}", &params),
            "/pets/1/owners/x"
        );
    }

    #[test]
    fn test_path_value_is_escaped() {
        let schema = SchemaSpec {
            enum_values: vec![Value::String("a b/c".to_string())],
            ..SchemaSpec::default()
        };
        let params = vec![ParamSpec::new("name", "path", Some(schema))];
        assert_eq!(substitute_path_params("/files/{name}", &params), "/files/a%20b%2Fc");
    }

    #[test]
    fn test_build_query_and_headers() {
        let params = vec![
            ParamSpec::new("q", "query", Some(SchemaSpec::of_type("string"))),
            ParamSpec::new("count", "query", Some(SchemaSpec::of_type("integer"))),
            ParamSpec::new("X-Token", "header", None),
            ParamSpec::new(
                "meta",
                "query",
                Some(SchemaSpec::object_with(vec![("a", SchemaSpec::of_type("boolean"))])),
            ),
            ParamSpec::new("session", "cookie", None),
        ];

        let (query, headers) = build_query_and_headers(&params);
        assert!(query.starts_with("q=x&count=1&meta="));
        assert!(query.contains("meta=%7B"));
        assert_eq!(headers, vec![("X-Token".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_collect_parameters_operation_wins() {
        let entry = PathEntry {
            path: "/items/{id}".to_string(),
            parameters: vec![
                ParamSpec::new("id", "path", Some(SchemaSpec::of_type("string"))),
                ParamSpec::new("limit", "query", None),
            ],
            operations: vec![],
        };
        let op = OperationSpec {
            method: "get".to_string(),
            operation_id: None,
            parameters: vec![
                ParamSpec::new("id", "path", Some(SchemaSpec::of_type("integer"))),
                ParamSpec::new("id", "query", None),
            ],
            request_body: None,
        };

        let params = collect_parameters(&entry, &op);
        assert_eq!(params.len(), 3);
        assert!(params[0].schema.as_ref().unwrap().is_type("integer"));
        assert_eq!(params[2].key(), ("query", "id"));
    }

    #[test]
    fn test_dummy_request_body_prefers_json() {
        let pet = SchemaSpec::object_with(vec![
            ("name", SchemaSpec::of_type("string")),
            ("age", SchemaSpec::of_type("integer")),
            ("tags", SchemaSpec::array_of(SchemaSpec::of_type("string"))),
        ]);
        let op = OperationSpec {
            method: "post".to_string(),
            operation_id: None,
            parameters: vec![],
            request_body: Some(BodySpec {
                content: vec![
                    ("application/xml".to_string(), Some(pet.clone())),
                    ("application/json".to_string(), Some(pet)),
                ],
            }),
        };

        let (data, ct) = dummy_request_body(&op).unwrap();
        assert_eq!(ct, "application/json");
        let body: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(body["name"], "string");
        assert_eq!(body["age"], 1);
        assert_eq!(body["tags"], serde_json::json!(["string"]));
    }

    #[test]
    fn test_non_json_body_is_not_sampled() {
        let op = OperationSpec {
            method: "post".to_string(),
            operation_id: None,
            parameters: vec![],
            request_body: Some(BodySpec {
                content: vec![(
                    "application/x-www-form-urlencoded".to_string(),
                    Some(SchemaSpec::of_type("object")),
                )],
            }),
        };
        assert!(dummy_request_body(&op).is_none());
    }

    #[test]
    fn test_samplers() {
        assert_eq!(param_string_for_schema(None), "x");
        assert_eq!(param_string_for_schema(Some(&SchemaSpec::of_type("number"))), "1");
        assert_eq!(param_string_for_schema(Some(&SchemaSpec::of_type("boolean"))), "true");
        assert_eq!(
            param_string_for_schema(Some(&SchemaSpec::array_of(SchemaSpec::of_type("integer")))),
            "1"
        );

        let numeric_enum = SchemaSpec {
            schema_type: Some("integer".to_string()),
            enum_values: vec![Value::from(42)],
            ..SchemaSpec::default()
        };
        assert_eq!(param_string_for_schema(Some(&numeric_enum)), "42");
        assert_eq!(json_sample_for_schema(Some(&numeric_enum)), Value::from(42));

        assert_eq!(json_sample_for_schema(None), serde_json::json!({}));
        assert_eq!(json_sample_for_schema(Some(&SchemaSpec::default())), Value::from("string"));
    }

    #[test]
    fn test_synthesize_requests() {
        let spec = ApiSpec {
            version: SpecVersion::OpenApi3,
            title: "pets".to_string(),
            servers: vec![],
            paths: vec![PathEntry {
                path: "/pets/{id}".to_string(),
                parameters: vec![ParamSpec::new("id", "path", Some(SchemaSpec::of_type("integer")))],
                operations: vec![
                    OperationSpec {
                        method: "get".to_string(),
                        operation_id: None,
                        parameters: vec![ParamSpec::new("verbose", "query", Some(SchemaSpec::of_type("boolean")))],
                        request_body: Some(BodySpec {
                            content: vec![("application/json".to_string(), Some(SchemaSpec::of_type("object")))],
                        }),
                    },
                    OperationSpec {
                        method: "put".to_string(),
                        operation_id: None,
                        parameters: vec![],
                        request_body: Some(BodySpec {
                            content: vec![("application/json".to_string(), Some(SchemaSpec::of_type("object")))],
                        }),
                    },
                ],
            }],
        };

        let requests = synthesize_requests(&spec, "http://127.0.0.1:8080", "/api");
        assert_eq!(requests.len(), 2);

        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].endpoint, "http://127.0.0.1:8080/api/pets/1?verbose=true");
        assert!(requests[0].body.is_none());

        assert_eq!(requests[1].method, "PUT");
        assert_eq!(requests[1].endpoint, "http://127.0.0.1:8080/api/pets/1");
        assert_eq!(requests[1].body.as_deref(), Some(&b"{}"[..]));
        assert_eq!(requests[1].content_type.as_deref(), Some("application/json"));
    }
}
