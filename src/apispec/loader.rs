// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! API document sniffing and parsing into the OpenAPI 3 shape.

use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::model::{
    ApiSpec, BodySpec, OperationSpec, ParamSpec, PathEntry, SchemaSpec, ServerInfo,
    ServerVariable, SpecVersion, PATH_OPERATIONS,
};
use crate::errors::{ProbeError, ProbeResult};

/// `$ref` hops followed before a reference chain is treated as broken
const MAX_REF_HOPS: usize = 32;

/// Schema nesting depth; deeper schemas are cut
const MAX_SCHEMA_DEPTH: usize = 12;

const FORM_CONTENT_TYPES: &[&str] = &["application/x-www-form-urlencoded", "multipart/form-data"];

pub fn is_openapi(data: &str) -> bool {
    (data.contains("\"openapi\":") || data.contains("openapi:")) && data.contains("paths")
}

pub fn is_swagger(data: &str) -> bool {
    (data.contains("\"swagger\":") || data.contains("swagger:")) && data.contains("paths")
}

/// Parse an API document. Payloads that are neither OpenAPI 3 nor Swagger 2
/// yield `ProbeError::UnsupportedSpec`.
pub fn parse_api_spec(data: &str, origin: &str) -> ProbeResult<ApiSpec> {
    if is_openapi(data) {
        debug!(origin = %origin, "API spec is openapi");
        let doc = parse_document(data, origin)?;
        return parse_openapi3(&doc, origin);
    }

    if is_swagger(data) {
        debug!(origin = %origin, "API spec is swagger");
        let doc = parse_document(data, origin)?;
        return parse_swagger2(&doc, origin);
    }

    debug!(origin = %origin, len = data.len(), "Unsupported API spec type");
    Err(ProbeError::UnsupportedSpec(origin.to_string()))
}

/// Read and parse a local API document.
pub fn load_spec_file<P: AsRef<Path>>(path: P) -> ProbeResult<ApiSpec> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)?;
    parse_api_spec(&data, &path.display().to_string())
}

fn parse_document(data: &str, origin: &str) -> ProbeResult<Value> {
    let parse_error = |reason: String| ProbeError::SpecParse {
        origin: origin.to_string(),
        reason,
    };

    let doc: Value = if data.trim_start().starts_with('{') {
        serde_json::from_str(data).map_err(|e| parse_error(e.to_string()))?
    } else {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(data).map_err(|e| parse_error(e.to_string()))?;
        serde_json::to_value(yaml).map_err(|e| parse_error(e.to_string()))?
    };

    if !doc.is_object() {
        return Err(parse_error("document root is not an object".to_string()));
    }

    Ok(doc)
}

fn parse_openapi3(doc: &Value, origin: &str) -> ProbeResult<ApiSpec> {
    let resolver = Resolver::new(doc);

    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| ProbeError::SpecParse {
            origin: origin.to_string(),
            reason: "missing paths object".to_string(),
        })?;

    let mut entries = Vec::new();
    for (path, item) in paths {
        let Some(item) = resolver.deref(item) else {
            debug!(path = %path, "Skipping unresolvable path item");
            continue;
        };

        let parameters = resolver.parameters(item.get("parameters"));

        let operations = PATH_OPERATIONS
            .iter()
            .filter_map(|method| {
                let op = item.get(*method)?.as_object()?;
                Some(OperationSpec {
                    method: method.to_string(),
                    operation_id: op.get("operationId").and_then(Value::as_str).map(String::from),
                    parameters: resolver.parameters(op.get("parameters")),
                    request_body: resolver.request_body(op.get("requestBody")),
                })
            })
            .collect();

        entries.push(PathEntry {
            path: path.clone(),
            parameters,
            operations,
        });
    }

    Ok(ApiSpec {
        version: SpecVersion::OpenApi3,
        title: title(doc),
        servers: parse_servers(doc),
        paths: entries,
    })
}

fn parse_swagger2(doc: &Value, origin: &str) -> ProbeResult<ApiSpec> {
    let resolver = Resolver::new(doc);

    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| ProbeError::SpecParse {
            origin: origin.to_string(),
            reason: "missing paths object".to_string(),
        })?;

    let global_consumes = string_list(doc.get("consumes"));

    let mut entries = Vec::new();
    for (path, item) in paths {
        let Some(item) = resolver.deref(item) else {
            continue;
        };

        let (parameters, path_body) = resolver.swagger_parameters(item.get("parameters"), &global_consumes);

        let operations = PATH_OPERATIONS
            .iter()
            .filter_map(|method| {
                let op = item.get(*method)?;
                op.as_object()?;

                let consumes = match string_list(op.get("consumes")) {
                    c if c.is_empty() => global_consumes.clone(),
                    c => c,
                };

                let (op_params, op_body) = resolver.swagger_parameters(op.get("parameters"), &consumes);

                Some(OperationSpec {
                    method: method.to_string(),
                    operation_id: op.get("operationId").and_then(Value::as_str).map(String::from),
                    parameters: op_params,
                    request_body: op_body.or_else(|| path_body.clone()),
                })
            })
            .collect();

        entries.push(PathEntry {
            path: path.clone(),
            parameters,
            operations,
        });
    }

    Ok(ApiSpec {
        version: SpecVersion::Swagger2,
        title: title(doc),
        servers: swagger_servers(doc),
        paths: entries,
    })
}

fn title(doc: &Value) -> String {
    doc.get("info")
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown API")
        .to_string()
}

fn parse_servers(doc: &Value) -> Vec<ServerInfo> {
    let Some(servers) = doc.get("servers").and_then(Value::as_array) else {
        return Vec::new();
    };

    servers
        .iter()
        .filter_map(|server| {
            let url = server.get("url").and_then(Value::as_str)?.to_string();

            let variables = server
                .get("variables")
                .and_then(Value::as_object)
                .map(|vars| {
                    vars.iter()
                        .map(|(name, var)| {
                            let default = var
                                .get("default")
                                .map(value_to_string)
                                .filter(|d| !d.is_empty());
                            let enum_values = var
                                .get("enum")
                                .and_then(Value::as_array)
                                .map(|values| values.iter().map(value_to_string).collect())
                                .unwrap_or_default();
                            (name.clone(), ServerVariable { default, enum_values })
                        })
                        .collect()
                })
                .unwrap_or_default();

            Some(ServerInfo { url, variables })
        })
        .collect()
}

/// Servers derived from `schemes`, `host` and `basePath`.
fn swagger_servers(doc: &Value) -> Vec<ServerInfo> {
    let host = doc.get("host").and_then(Value::as_str).unwrap_or("");
    let base_path = doc.get("basePath").and_then(Value::as_str).unwrap_or("");

    let server = |url: String| ServerInfo {
        url,
        variables: Vec::new(),
    };

    if host.is_empty() {
        if base_path.is_empty() {
            return Vec::new();
        }
        return vec![server(base_path.to_string())];
    }

    let mut schemes = string_list(doc.get("schemes"));
    if schemes.is_empty() {
        schemes.push("https".to_string());
    }

    schemes
        .iter()
        .map(|scheme| server(format!("{}://{}{}", scheme, host, base_path)))
        .collect()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Follows local `$ref`s within one document.
struct Resolver<'a> {
    root: &'a Value,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Resolve `value` through any chain of local references.
    fn deref(&self, value: &'a Value) -> Option<&'a Value> {
        let mut current = value;

        for _ in 0..MAX_REF_HOPS {
            match current.get("$ref").and_then(Value::as_str) {
                Some(reference) => {
                    let Some(pointer) = reference.strip_prefix('#') else {
                        debug!(reference = %reference, "External reference not supported");
                        return None;
                    };
                    current = self.root.pointer(pointer)?;
                }
                None => return Some(current),
            }
        }

        debug!("Reference chain too long");
        None
    }

    fn parameters(&self, list: Option<&'a Value>) -> Vec<ParamSpec> {
        let Some(list) = list.and_then(Value::as_array) else {
            return Vec::new();
        };

        list.iter()
            .filter_map(|p| self.deref(p))
            .filter_map(|p| {
                let name = p.get("name").and_then(Value::as_str)?;
                let location = p.get("in").and_then(Value::as_str)?;

                // parameters may carry their schema under `content` instead
                let schema_value = p.get("schema").or_else(|| {
                    p.get("content")
                        .and_then(Value::as_object)
                        .and_then(|c| c.values().next())
                        .and_then(|m| m.get("schema"))
                });

                Some(ParamSpec {
                    name: name.to_string(),
                    location: location.to_string(),
                    required: p.get("required").and_then(Value::as_bool).unwrap_or(location == "path"),
                    schema: self.schema(schema_value),
                })
            })
            .collect()
    }

    /// Swagger 2 parameters: `body`/`formData` entries become a request body.
    fn swagger_parameters(
        &self,
        list: Option<&'a Value>,
        consumes: &[String],
    ) -> (Vec<ParamSpec>, Option<BodySpec>) {
        let mut params = Vec::new();
        let mut body = None;
        let mut form_fields = Vec::new();

        let Some(list) = list.and_then(Value::as_array) else {
            return (params, body);
        };

        for p in list.iter().filter_map(|p| self.deref(p)) {
            let (Some(name), Some(location)) = (
                p.get("name").and_then(Value::as_str),
                p.get("in").and_then(Value::as_str),
            ) else {
                continue;
            };

            match location {
                "body" => {
                    let schema = self.schema(p.get("schema"));
                    let content_types = if consumes.is_empty() {
                        vec!["application/json".to_string()]
                    } else {
                        consumes.to_vec()
                    };
                    body = Some(BodySpec {
                        content: content_types
                            .into_iter()
                            .map(|ct| (ct, schema.clone()))
                            .collect(),
                    });
                }
                "formData" => {
                    form_fields.push((name.to_string(), self.schema(Some(p))));
                }
                _ => params.push(ParamSpec {
                    name: name.to_string(),
                    location: location.to_string(),
                    required: p.get("required").and_then(Value::as_bool).unwrap_or(location == "path"),
                    // Swagger 2 keeps the type on the parameter itself
                    schema: self.schema(Some(p)),
                }),
            }
        }

        if body.is_none() && !form_fields.is_empty() {
            let mut content_types: Vec<String> = consumes
                .iter()
                .filter(|ct| FORM_CONTENT_TYPES.contains(&ct.as_str()))
                .cloned()
                .collect();
            if content_types.is_empty() {
                content_types.push(FORM_CONTENT_TYPES[0].to_string());
            }

            let schema = SchemaSpec {
                schema_type: Some("object".to_string()),
                properties: form_fields,
                ..SchemaSpec::default()
            };

            body = Some(BodySpec {
                content: content_types
                    .into_iter()
                    .map(|ct| (ct, Some(schema.clone())))
                    .collect(),
            });
        }

        (params, body)
    }

    fn request_body(&self, value: Option<&'a Value>) -> Option<BodySpec> {
        let body = self.deref(value?)?;
        let content = body.get("content").and_then(Value::as_object)?;

        Some(BodySpec {
            content: content
                .iter()
                .map(|(ct, media)| (ct.clone(), self.schema(media.get("schema"))))
                .collect(),
        })
    }

    fn schema(&self, value: Option<&'a Value>) -> Option<SchemaSpec> {
        self.schema_at(value, 0, &mut Vec::new())
    }

    /// `refs` holds the references expanded on the current path. A reference
    /// that is already on the path is a cycle and resolves to `None`.
    fn schema_at(
        &self,
        value: Option<&'a Value>,
        depth: usize,
        refs: &mut Vec<&'a str>,
    ) -> Option<SchemaSpec> {
        if depth > MAX_SCHEMA_DEPTH {
            return None;
        }

        let mark = refs.len();
        let schema = self
            .deref_on_path(value?, refs)
            .filter(|v| v.is_object())
            .map(|v| self.expand_schema(v, depth, refs));
        refs.truncate(mark);

        schema
    }

    /// Like `deref`, recording each reference on `refs`.
    fn deref_on_path(&self, value: &'a Value, refs: &mut Vec<&'a str>) -> Option<&'a Value> {
        let mut current = value;

        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return Some(current);
            };

            if refs.contains(&reference) {
                debug!(reference = %reference, "Cyclic schema reference cut");
                return None;
            }
            refs.push(reference);

            let Some(pointer) = reference.strip_prefix('#') else {
                debug!(reference = %reference, "External reference not supported");
                return None;
            };
            current = self.root.pointer(pointer)?;
        }

        debug!("Reference chain too long");
        None
    }

    fn expand_schema(
        &self,
        value: &'a Value,
        depth: usize,
        refs: &mut Vec<&'a str>,
    ) -> SchemaSpec {
        let mut schema = SchemaSpec {
            schema_type: schema_type(value),
            enum_values: value
                .get("enum")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            items: self.schema_at(value.get("items"), depth + 1, refs).map(Box::new),
            properties: value
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| {
                    props
                        .iter()
                        .map(|(name, prop)| {
                            (name.clone(), self.schema_at(Some(prop), depth + 1, refs))
                        })
                        .collect()
                })
                .unwrap_or_default(),
        };

        // allOf members contribute their properties; oneOf/anyOf use the first member
        if let Some(members) = value.get("allOf").and_then(Value::as_array) {
            for member in members {
                if let Some(member) = self.schema_at(Some(member), depth + 1, refs) {
                    if schema.schema_type.is_none() {
                        schema.schema_type = member.schema_type.clone();
                    }
                    schema.properties.extend(member.properties);
                }
            }
        } else if schema.schema_type.is_none() {
            let first = value
                .get("oneOf")
                .or_else(|| value.get("anyOf"))
                .and_then(Value::as_array)
                .and_then(|members| members.first());
            if let Some(member) = self.schema_at(first, depth + 1, refs) {
                return member;
            }
        }

        if schema.schema_type.is_none() {
            if !schema.properties.is_empty() {
                schema.schema_type = Some("object".to_string());
            } else if schema.items.is_some() {
                schema.schema_type = Some("array".to_string());
            }
        }

        schema
    }
}

/// `type` as a string; for type lists the first non-null entry.
fn schema_type(value: &Value) -> Option<String> {
    match value.get("type")? {
        Value::String(t) => Some(t.clone()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(String::from),
        _ => None,
    }
}
