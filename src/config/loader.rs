// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::core::{ProbeCommand, ProbeConfig};
use super::validation::ConfigValidator;

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

/// On-disk shape of a probe command file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeCommandFile {
    #[serde(default)]
    pub commands: Vec<ProbeCommand>,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    pub fn with_format<P: AsRef<Path>>(config_path: P, format: ConfigFormat) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            format,
        }
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file format"))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported config file format: {}", extension)),
        }
    }

    fn read<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        let value = match self.format {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .context("Failed to parse YAML config")?,
            ConfigFormat::Toml => toml::from_str(&content)
                .context("Failed to parse TOML config")?,
            ConfigFormat::Json => serde_json::from_str(&content)
                .context("Failed to parse JSON config")?,
        };

        Ok(value)
    }

    /// Load a complete probe configuration, apply environment overrides and validate it.
    pub fn load_config(&self) -> Result<ProbeConfig> {
        let mut config: ProbeConfig = self.read()?;

        self.apply_env_overrides(&mut config)?;

        for cmd in &mut config.commands {
            normalize_command(cmd, self.base_dir())?;
        }

        ConfigValidator::validate_probe_config(&config)?;

        Ok(config)
    }

    /// Load a probe command file (`{"commands": [...]}`).
    pub fn load_commands(&self) -> Result<Vec<ProbeCommand>> {
        let file: ProbeCommandFile = self.read()?;

        let mut commands = file.commands;
        for cmd in &mut commands {
            normalize_command(cmd, self.base_dir())?;
            ConfigValidator::validate_command(cmd)?;
        }

        Ok(commands)
    }

    fn base_dir(&self) -> Option<&Path> {
        self.config_path.parent()
    }

    fn apply_env_overrides(&self, config: &mut ProbeConfig) -> Result<()> {
        if let Ok(count) = std::env::var("PROBE_RETRY_COUNT") {
            config.retry_count = count.parse()
                .context("Invalid PROBE_RETRY_COUNT")?;
        }

        if let Ok(wait) = std::env::var("PROBE_RETRY_WAIT") {
            config.retry_wait = wait.parse()
                .context("Invalid PROBE_RETRY_WAIT")?;
        }

        if let Ok(wait) = std::env::var("PROBE_START_WAIT") {
            config.start_wait = wait.parse()
                .context("Invalid PROBE_START_WAIT")?;
        }

        Ok(())
    }
}

/// Upper-case the method and make body file paths absolute.
fn normalize_command(cmd: &mut ProbeCommand, base_dir: Option<&Path>) -> Result<()> {
    cmd.method = if cmd.method.is_empty() {
        "GET".to_string()
    } else {
        cmd.method.to_uppercase()
    };

    if let Some(body_file) = cmd.body_file.as_mut() {
        if body_file.is_relative() {
            let base = match base_dir {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => std::env::current_dir().context("Failed to resolve working directory")?,
            };
            *body_file = base.join(&*body_file);
        }

        std::fs::metadata(&*body_file)
            .with_context(|| format!("Body file not accessible: {:?}", body_file))?;
    }

    Ok(())
}

/// Load a probe configuration file picking the format from its extension.
pub fn load_probe_config<P: AsRef<Path>>(path: P) -> Result<ProbeConfig> {
    ConfigLoader::new(path)?.load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_commands() {
        let dir = TempDir::new().unwrap();
        let body_path = dir.path().join("body.json");
        std::fs::write(&body_path, r#"{"name":"probe"}"#).unwrap();

        let path = dir.path().join("probes.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"commands":[{{"method":"post","resource":"/items","protocol":"http","body_file":"body.json","crawl":true}}]}}"#
        )
        .unwrap();

        let commands = ConfigLoader::new(&path).unwrap().load_commands().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].method, "POST");
        assert_eq!(commands[0].protocol, Some(Protocol::Http));
        assert_eq!(commands[0].body_file.as_deref(), Some(body_path.as_path()));
        assert!(commands[0].crawl);
    }

    #[test]
    fn test_load_yaml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.yaml");
        std::fs::write(
            &path,
            "retry_count: 2\nports: [80, 8080]\nfull: true\ncommands:\n  - resource: /health\n",
        )
        .unwrap();

        let config = ConfigLoader::new(&path).unwrap().load_config().unwrap();
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.ports, vec![80, 8080]);
        assert!(config.full);
        assert_eq!(config.commands[0].resource, "/health");
    }

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probe.toml");
        std::fs::write(
            &path,
            "crawl = true\n\n[[commands]]\nmethod = \"head\"\nresource = \"/\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new(&path).unwrap().load_config().unwrap();
        assert!(config.crawl);
        assert_eq!(config.commands[0].method, "HEAD");
    }

    #[test]
    fn test_rejects_invalid_resource() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probes.json");
        std::fs::write(&path, r#"{"commands":[{"resource":"health"}]}"#).unwrap();

        assert!(ConfigLoader::new(&path).unwrap().load_commands().is_err());
    }

    #[test]
    fn test_rejects_missing_body_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("probes.json");
        std::fs::write(&path, r#"{"commands":[{"body_file":"missing.bin"}]}"#).unwrap();

        assert!(ConfigLoader::new(&path).unwrap().load_commands().is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(ConfigLoader::new("probes.ini").is_err());
    }
}
