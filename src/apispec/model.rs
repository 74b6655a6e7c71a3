// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde_json::Value;

/// Operation keys of a path item, in enumeration order.
pub const PATH_OPERATIONS: &[&str] = &[
    "connect", "delete", "get", "head", "options", "patch", "post", "put", "trace",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    OpenApi3,
    /// Swagger 2.0, converted into the OpenAPI 3 shape at load time
    Swagger2,
}

/// API document in the OpenAPI 3 shape
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSpec {
    pub version: SpecVersion,
    pub title: String,
    pub servers: Vec<ServerInfo>,
    pub paths: Vec<PathEntry>,
}

impl ApiSpec {
    pub fn operation_count(&self) -> usize {
        self.paths.iter().map(|p| p.operations.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub url: String,
    pub variables: Vec<(String, ServerVariable)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerVariable {
    pub default: Option<String>,
    pub enum_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    pub path: String,
    /// Parameters shared by every operation of the path
    pub parameters: Vec<ParamSpec>,
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    /// Lower-case operation key (`get`, `post`, ...)
    pub method: String,
    pub operation_id: Option<String>,
    pub parameters: Vec<ParamSpec>,
    pub request_body: Option<BodySpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    /// `path`, `query`, `header` or `cookie`
    pub location: String,
    pub required: bool,
    pub schema: Option<SchemaSpec>,
}

impl ParamSpec {
    pub fn new(name: &str, location: &str, schema: Option<SchemaSpec>) -> Self {
        Self {
            name: name.to_string(),
            location: location.to_string(),
            required: location == "path",
            schema,
        }
    }

    pub fn key(&self) -> (&str, &str) {
        (self.location.as_str(), self.name.as_str())
    }
}

/// Request body media types in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodySpec {
    pub content: Vec<(String, Option<SchemaSpec>)>,
}

impl BodySpec {
    pub fn media_type(&self, content_type: &str) -> Option<&Option<SchemaSpec>> {
        self.content
            .iter()
            .find(|(ct, _)| ct == content_type)
            .map(|(_, schema)| schema)
    }
}

/// The subset of a JSON schema needed to synthesize sample values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSpec {
    pub schema_type: Option<String>,
    pub enum_values: Vec<Value>,
    pub items: Option<Box<SchemaSpec>>,
    /// Declared order; `None` marks a property whose schema could not be resolved
    pub properties: Vec<(String, Option<SchemaSpec>)>,
}

impl SchemaSpec {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    pub fn array_of(items: SchemaSpec) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    pub fn object_with(properties: Vec<(&str, SchemaSpec)>) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.to_string(), Some(schema)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn is_type(&self, schema_type: &str) -> bool {
        self.schema_type.as_deref() == Some(schema_type)
    }
}
