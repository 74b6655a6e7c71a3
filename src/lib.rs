// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Library
 * Multi-protocol endpoint probing, crawling and API-spec driven calls
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod config;
pub mod errors;
pub mod events;

// Retry and transport
pub mod fastcgi;
pub mod http_client;
pub mod retry;
pub mod websocket;

// Discovery
pub mod apispec;
pub mod crawler;

// Orchestration
pub mod probe;

pub use config::{ProbeCommand, ProbeConfig, Protocol};
pub use errors::{CallError, ProbeError, ProbeResult};
pub use events::{EventSink, ProbeEvent, ProbeEventKind};
pub use probe::{CallStats, ContainerPorts, CustomProbe, ProbeSummary};
