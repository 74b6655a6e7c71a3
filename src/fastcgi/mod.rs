// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - FastCGI Probe Transport
 * Record codec and CGI environment round-tripper
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod record;
pub mod transport;

pub use transport::{parse_cgi_response, FastCgiTransport};
