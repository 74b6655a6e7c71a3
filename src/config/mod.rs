// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod loader;
pub mod parse;
pub mod validation;

pub use core::{
    is_probe_method, BodySource, CrawlLimits, FastCgiConfig, ProbeCommand, ProbeConfig, Protocol,
    DEFAULT_CRAWL_CONCURRENCY, DEFAULT_CRAWL_MAX_DEPTH, DEFAULT_CRAWL_MAX_PAGE_COUNT,
    DEFAULT_FASTCGI_ROOT, DEFAULT_MAX_CONCURRENT_CRAWLERS, DEFAULT_RETRY_COUNT,
    DEFAULT_RETRY_WAIT_SECS, PROBE_METHODS,
};

pub use loader::{load_probe_config, ConfigFormat, ConfigLoader, ProbeCommandFile};

pub use parse::{parse_port_list, parse_probe_command, parse_probe_commands, parse_spec_source};

pub use validation::ConfigValidator;
