// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Parsers for the compact command-line forms of probe settings.

use super::core::{is_probe_method, ProbeCommand, Protocol};
use crate::errors::{ProbeError, ProbeResult};

/// Parse probe command strings of the form `[crawl:][[proto:]method:]resource`.
///
/// Omitted parts default to `http`, `GET` and `/`. An explicitly empty
/// protocol (`:GET:/x`) leaves the protocol unset so it follows the port.
pub fn parse_probe_commands<S: AsRef<str>>(values: &[S]) -> ProbeResult<Vec<ProbeCommand>> {
    values.iter().map(|v| parse_probe_command(v.as_ref())).collect()
}

pub fn parse_probe_command(raw: &str) -> ProbeResult<ProbeCommand> {
    let mut parts: Vec<&str> = raw.split(':').collect();

    let crawl = parts.first() == Some(&"crawl");
    if crawl {
        parts.remove(0);
    }

    let invalid = |what: &str| {
        ProbeError::Configuration(format!("invalid probe command {}: {}", what, raw))
    };

    let (proto, method, resource) = match parts.as_slice() {
        [] => (Some("http"), "", "/"),
        [resource] => (Some("http"), "", *resource),
        [method, resource] => (Some("http"), *method, *resource),
        [proto, method, resource] => (Some(*proto).filter(|p| !p.is_empty()), *method, *resource),
        _ => return Err(invalid("format")),
    };

    let protocol = proto
        .map(|p| p.parse::<Protocol>().map_err(|_| invalid("protocol")))
        .transpose()?;

    if !method.is_empty() && !is_probe_method(method) {
        return Err(invalid("method"));
    }

    if !resource.starts_with('/') {
        return Err(invalid("resource"));
    }

    let method = if method.is_empty() { "GET" } else { method };

    Ok(ProbeCommand {
        protocol,
        crawl,
        ..ProbeCommand::new(method, resource)
    })
}

/// Parse a comma separated port list (`80,8080`).
pub fn parse_port_list(list: &str) -> ProbeResult<Vec<u16>> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    list.split(',')
        .map(|part| {
            part.trim().parse::<u16>().map_err(|e| {
                ProbeError::Configuration(format!("invalid port '{}': {}", part, e))
            })
        })
        .collect()
}

/// Split an API spec source of the form `path[:prefixOverride]`.
pub fn parse_spec_source(source: &str) -> (String, Option<String>) {
    match source.split_once(':') {
        Some((path, prefix)) if !prefix.is_empty() => (path.to_string(), Some(prefix.to_string())),
        Some((path, _)) => (path.to_string(), None),
        None => (source.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_only() {
        let cmd = parse_probe_command("/health").unwrap();
        assert_eq!(cmd.method, "GET");
        assert_eq!(cmd.resource, "/health");
        assert_eq!(cmd.protocol, Some(Protocol::Http));
        assert!(!cmd.crawl);
    }

    #[test]
    fn test_parse_full_form_with_crawl() {
        let cmd = parse_probe_command("crawl:https:post:/login").unwrap();
        assert_eq!(cmd.method, "POST");
        assert_eq!(cmd.resource, "/login");
        assert_eq!(cmd.protocol, Some(Protocol::Https));
        assert!(cmd.crawl);
    }

    #[test]
    fn test_parse_empty_protocol_is_left_unset() {
        let cmd = parse_probe_command("::/x").unwrap();
        assert_eq!(cmd.protocol, None);
        assert_eq!(cmd.method, "GET");
        assert_eq!(cmd.resource, "/x");

        let cmd = parse_probe_command("crawl::put:/upload").unwrap();
        assert_eq!(cmd.protocol, None);
        assert_eq!(cmd.method, "PUT");
        assert!(cmd.crawl);

        assert_eq!(parse_probe_command("GET:/x").unwrap().protocol, Some(Protocol::Http));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse_probe_command("FETCH:/").is_err());
        assert!(parse_probe_command("GET:health").is_err());
        assert!(parse_probe_command("gopher:GET:/").is_err());
        assert!(parse_probe_command("a:b:c:d").is_err());
    }

    #[test]
    fn test_parse_port_list() {
        assert_eq!(parse_port_list("80, 8080").unwrap(), vec![80, 8080]);
        assert!(parse_port_list("").unwrap().is_empty());
        assert!(parse_port_list("80,http").is_err());
    }

    #[test]
    fn test_parse_spec_source() {
        assert_eq!(parse_spec_source("/openapi.json"), ("/openapi.json".to_string(), None));
        assert_eq!(
            parse_spec_source("/swagger.yaml:/api/v2"),
            ("/swagger.yaml".to_string(), Some("/api/v2".to_string()))
        );
    }
}
