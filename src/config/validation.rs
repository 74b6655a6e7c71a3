// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use validator::Validate;

use super::core::{ProbeCommand, ProbeConfig};

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_probe_config(config: &ProbeConfig) -> Result<()> {
        config.validate()
            .context("Configuration validation failed")?;

        for cmd in &config.commands {
            Self::validate_command(cmd)?;
        }

        Self::validate_ports(config)?;
        Self::validate_api_specs(config)?;

        Ok(())
    }

    pub fn validate_command(cmd: &ProbeCommand) -> Result<()> {
        cmd.validate()
            .with_context(|| format!("Invalid probe command: {} {}", cmd.method, cmd.resource))?;

        if cmd.body.is_some() && cmd.body_file.is_some() {
            return Err(anyhow::anyhow!(
                "Probe command {} {} sets both body and body_file",
                cmd.method,
                cmd.resource
            ));
        }

        if let Some(fcgi) = &cmd.fastcgi {
            if fcgi.split_path.iter().any(|s| s.is_empty()) {
                return Err(anyhow::anyhow!("FastCGI split_path entries cannot be empty"));
            }

            if cmd.protocol.is_some_and(|p| p.is_websocket()) {
                return Err(anyhow::anyhow!(
                    "FastCGI settings cannot be combined with a websocket protocol"
                ));
            }
        }

        Ok(())
    }

    fn validate_ports(config: &ProbeConfig) -> Result<()> {
        if config.ports.contains(&0) {
            return Err(anyhow::anyhow!("Port 0 is not a valid probe port"));
        }

        Ok(())
    }

    fn validate_api_specs(config: &ProbeConfig) -> Result<()> {
        for spec in &config.api_specs {
            if !spec.starts_with('/') {
                return Err(anyhow::anyhow!(
                    "API spec endpoint must be an absolute path: {}",
                    spec
                ));
            }
        }

        for spec in &config.api_spec_files {
            if spec.trim().is_empty() {
                return Err(anyhow::anyhow!("API spec file path cannot be empty"));
            }
        }

        Ok(())
    }
}
