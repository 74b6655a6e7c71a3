// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Lonkero Probe CLI
 * Probe an endpoint with custom commands, crawl it and exercise its API spec
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lonkero_probe::config::{parse_probe_commands, ConfigLoader, ConfigValidator, ProbeConfig};
use lonkero_probe::events::EventSink;
use lonkero_probe::probe::CustomProbe;

/// Lonkero Probe - multi-protocol endpoint prober
#[derive(Parser, Debug)]
#[command(name = "lonkero-probe")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Probe an endpoint over HTTP, HTTP/2, FastCGI and websockets", long_about = None)]
struct Cli {
    /// Target host
    host: String,

    /// Comma separated target ports (default: 80)
    #[arg(short, long, value_delimiter = ',', value_parser = parse_port)]
    ports: Option<Vec<u16>>,

    /// Probe command: [crawl:][[proto:]method:]resource (repeatable)
    #[arg(long = "cmd")]
    commands: Vec<String>,

    /// Probe command file (JSON, YAML or TOML)
    #[arg(long)]
    cmd_file: Option<PathBuf>,

    /// Complete probe configuration file (JSON, YAML or TOML)
    #[arg(short, long, env = "LONKERO_PROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Attempts per call
    #[arg(long)]
    retry_count: Option<u32>,

    /// Base retry wait in seconds
    #[arg(long)]
    retry_wait: Option<u64>,

    /// Extra warm-up in seconds
    #[arg(long)]
    start_wait: Option<u64>,

    /// Fixed warm-up in seconds
    #[arg(long, default_value_t = 9)]
    base_wait: u64,

    /// Crawl from the default probe
    #[arg(long)]
    crawl: bool,

    #[arg(long, allow_negative_numbers = true)]
    crawl_max_depth: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    crawl_max_page_count: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    crawl_concurrency: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    crawl_concurrency_max: Option<i64>,

    /// Probe every port even after a success
    #[arg(long)]
    full: bool,

    /// Exit with an error when no call succeeded
    #[arg(long)]
    exit_on_failure: bool,

    /// Live API spec path, optionally suffixed with :prefix (repeatable)
    #[arg(long = "api-spec")]
    api_specs: Vec<String>,

    /// Local API spec file, optionally suffixed with :prefix (repeatable)
    #[arg(long = "api-spec-file")]
    api_spec_files: Vec<String>,

    /// Print probe events as JSON lines
    #[arg(long)]
    events: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - errors only
    #[arg(short, long)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn parse_port(value: &str) -> Result<u16, String> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid port '{}': {}", value, e))
}

impl Cli {
    fn probe_config(&self) -> Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::new(path)?.load_config()?,
            None => ProbeConfig::default(),
        };

        if let Some(path) = &self.cmd_file {
            let commands = ConfigLoader::new(path)?
                .load_commands()
                .with_context(|| format!("Failed to load probe commands from {:?}", path))?;
            config.commands.extend(commands);
        }

        config
            .commands
            .extend(parse_probe_commands(&self.commands).context("Invalid probe command")?);

        if let Some(ports) = &self.ports {
            config.ports = ports.clone();
        }
        if let Some(count) = self.retry_count {
            config.retry_count = count;
        }
        if let Some(wait) = self.retry_wait {
            config.retry_wait = wait;
        }
        if let Some(wait) = self.start_wait {
            config.start_wait = wait;
        }
        if let Some(depth) = self.crawl_max_depth {
            config.crawl_max_depth = depth;
        }
        if let Some(count) = self.crawl_max_page_count {
            config.crawl_max_page_count = count;
        }
        if let Some(concurrency) = self.crawl_concurrency {
            config.crawl_concurrency = concurrency;
        }
        if let Some(max) = self.crawl_concurrency_max {
            config.crawl_max_concurrent_crawlers = max;
        }

        config.crawl |= self.crawl;
        config.full |= self.full;
        config.exit_on_failure |= self.exit_on_failure;
        config.api_specs.extend(self.api_specs.iter().cloned());
        config.api_spec_files.extend(self.api_spec_files.iter().cloned());

        config.ensure_default_probe();
        ConfigValidator::validate_probe_config(&config)?;

        Ok(config)
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = cli.probe_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("lonkero-probe")
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let summary = runtime.block_on(async {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = if cli.events {
            EventSink::new(tx)
        } else {
            drop(tx);
            EventSink::disabled()
        };

        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                println!("{}", event.to_json());
            }
        });

        let ports = config.ports.clone();
        let probe = CustomProbe::for_endpoint(&cli.host, &ports, config)
            .with_base_start_wait(Duration::from_secs(cli.base_wait))
            .with_event_sink(sink);

        info!(host = %cli.host, ports = ?probe.ports(), "Starting probe");
        probe.start();
        probe.wait_done().await;

        let failed = probe.is_failure();
        let summary = probe.summary();

        // the probe holds the last sender
        drop(probe);
        let _ = printer.await;

        (summary, failed)
    });

    let (summary, failed) = summary;
    info!(
        total = summary.total,
        failures = summary.failures,
        successful = summary.successful,
        "Probe finished"
    );

    if failed {
        warn!("No successful calls");
        std::process::exit(1);
    }

    Ok(())
}
