// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Candidate port resolution for container targets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const HTTP_PORT: &str = "80";
pub const HTTPS_PORT: &str = "443";
pub const FASTCGI_PORT: &str = "9000";

/// One published container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: String,
    #[serde(default = "default_port_protocol")]
    pub protocol: String,
    /// Host side of the mapping; `None` when the port is not published
    #[serde(default)]
    pub host_port: Option<String>,
}

fn default_port_protocol() -> String {
    "tcp".to_string()
}

impl PortMapping {
    pub fn tcp(container_port: &str, host_port: &str) -> Self {
        Self {
            container_port: container_port.to_string(),
            protocol: default_port_protocol(),
            host_port: Some(host_port.to_string()),
        }
    }

    /// `port/proto`, the form used by `EXPOSE` entries.
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }

    fn published_host_port(&self) -> Option<&str> {
        self.host_port.as_deref().filter(|p| !p.is_empty())
    }
}

/// Port layout of an inspected container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPorts {
    #[serde(default)]
    pub mappings: Vec<PortMapping>,
    /// `EXPOSE` entries in image order (`80` or `80/tcp`)
    #[serde(default)]
    pub exposed: Vec<String>,
    /// The prober shares the container's network namespace and uses container ports
    #[serde(default)]
    pub direct: bool,
}

impl ContainerPorts {
    /// Resolve the ordered candidate ports.
    ///
    /// With an explicit list only listed, available ports are kept. Otherwise
    /// exposed ports come first (last `EXPOSE` first), followed by every other
    /// published TCP port in ascending order.
    pub fn resolve(&self, explicit: &[u16]) -> Vec<String> {
        let by_key: HashMap<String, &PortMapping> =
            self.mappings.iter().map(|m| (m.key(), m)).collect();

        if !explicit.is_empty() {
            let mut ports = Vec::new();
            for port in explicit {
                let key = format!("{}/tcp", port);
                match by_key.get(&key) {
                    Some(_) if self.direct => ports.push(port.to_string()),
                    Some(mapping) => match mapping.published_host_port() {
                        Some(host_port) => ports.push(host_port.to_string()),
                        None => debug!(port = %key, "Ignoring unpublished port"),
                    },
                    None => debug!(port = %key, "Ignoring port"),
                }
            }
            debug!(ports = ?ports, "Filtered probe ports");
            return ports;
        }

        // host port -> container port for published TCP ports
        let mut available: Vec<(String, String)> = self
            .mappings
            .iter()
            .filter(|m| {
                if m.protocol != "tcp" {
                    debug!(port = %m.key(), "Skipping non-tcp port");
                    return false;
                }
                true
            })
            .filter_map(|m| {
                let host_port = m.published_host_port()?;
                Some((host_port.to_string(), m.container_port.clone()))
            })
            .collect();

        let mut ports = Vec::new();

        for exposed in self.exposed.iter().rev() {
            let key = if exposed.contains('/') {
                exposed.clone()
            } else {
                format!("{}/tcp", exposed)
            };

            let Some(mapping) = by_key.get(&key) else {
                debug!(port = %key, "Unknown exposed port");
                continue;
            };

            let host_port = mapping.published_host_port().unwrap_or_default();
            let position = available.iter().position(|(h, _)| h == host_port);

            if self.direct {
                match position {
                    Some(idx) => ports.push(available[idx].1.clone()),
                    None => debug!(host_port = %host_port, "No container port for host port"),
                }
            } else if !host_port.is_empty() {
                ports.push(host_port.to_string());
            }

            if let Some(idx) = position {
                available.remove(idx);
            }
        }

        available.sort_by_key(|(host_port, _)| (host_port.parse::<u32>().unwrap_or(u32::MAX), host_port.clone()));
        for (host_port, container_port) in available {
            ports.push(if self.direct { container_port } else { host_port });
        }

        debug!(ports = ?ports, "Resolved probe ports");
        ports
    }
}

/// Move `80` ahead of `443` when `443` comes first. Returns true on a swap.
pub fn reorder_ports(ports: &mut [String]) -> bool {
    let http = ports.iter().position(|p| p == HTTP_PORT);
    let https = ports.iter().position(|p| p == HTTPS_PORT);

    match (http, https) {
        (Some(http), Some(https)) if https < http => {
            debug!(http = http, https = https, "Swapping http and https ports");
            ports.swap(http, https);
            true
        }
        _ => false,
    }
}
