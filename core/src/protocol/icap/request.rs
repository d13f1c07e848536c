/*
 * request.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Vaglio, an ICAP content adaptation client.
 *
 * Vaglio is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Vaglio is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Vaglio.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Per-call request parameters: the remote service identity, tunable request
//! information (timeouts, allow-204, custom headers), the resource to adapt,
//! and short per-request correlation identifiers for logs and temp files.

use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::protocol::icap::headers::RESERVED_CUSTOM_HEADERS;

/// Identity of the remote ICAP service: host, port, service name (the path
/// segment of the ICAP URL), and whether to connect over TLS.
#[derive(Debug, Clone)]
pub struct ServiceInformation {
    pub host: String,
    pub port: u16,
    pub service: String,
    pub secure: bool,
}

impl ServiceInformation {
    pub fn new(host: impl Into<String>, port: u16, service: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            service: service.into(),
            secure,
        }
    }

    /// The ICAP URL used on request lines: `icap://host:port/service`.
    pub fn url(&self) -> String {
        format!("icap://{}:{}/{}", self.host, self.port, self.service)
    }
}

/// Tunable per-call parameters. The defaults match a typical anti-malware
/// deployment; most callers only ever set `allow_204` or a custom header.
#[derive(Debug, Clone)]
pub struct RequestInformation {
    /// ICAP protocol version on the request line.
    pub api_version: String,
    pub user_agent: String,
    /// Applies to transport acquisition.
    pub connect_timeout: Duration,
    /// Applies to every receive.
    pub read_timeout: Duration,
    /// `Some(true)` request 204 support, `Some(false)` opt out, `None` follow
    /// whatever the server advertised.
    pub allow_204: Option<bool>,
    /// Custom ICAP headers in insertion order. Names matching a reserved
    /// header are dropped at emission time.
    pub custom_headers: Vec<(String, String)>,
    /// Used as the `Host` of the inner (encapsulated) HTTP request.
    pub request_source: String,
}

impl Default for RequestInformation {
    fn default() -> Self {
        Self {
            api_version: "1.0".to_string(),
            user_agent: "Vaglio ICAP-Client/1.1".to_string(),
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(15),
            allow_204: None,
            custom_headers: Vec::new(),
            request_source: "localhost".to_string(),
        }
    }
}

impl RequestInformation {
    pub fn add_custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Render sanitized custom headers as wire lines. Reserved names are
    /// dropped with a warning, whitespace is trimmed, empty values are
    /// skipped. Insertion order is kept.
    pub fn render_custom_headers(&self) -> String {
        let mut headers = String::new();
        for (name, value) in &self.custom_headers {
            let name = name.trim();
            let value = value.trim();
            if RESERVED_CUSTOM_HEADERS
                .iter()
                .any(|r| r.eq_ignore_ascii_case(name))
            {
                warn!("Invalid custom header [{}], it's not allowed, ignore!", name);
            } else if !value.is_empty() {
                headers.push_str(name);
                headers.push_str(": ");
                headers.push_str(value);
                headers.push_str("\r\n");
            }
        }
        headers
    }

    /// Display string identifying the source of this request in logs:
    /// resource name and size.
    pub fn prepare_source_request(&self, name: &str, length: u64) -> String {
        format!("{} ({} bytes)", name.trim(), length)
    }
}

/// The payload to adapt: a logical name, its length in bytes, and a
/// single-pass byte source the engine reads exactly once, in order.
#[derive(Debug)]
pub struct Resource<R> {
    pub name: String,
    pub length: u64,
    pub body: R,
}

impl<R> Resource<R> {
    pub fn new(name: impl Into<String>, length: u64, body: R) -> Self {
        Self {
            name: name.into(),
            length,
            body,
        }
    }
}

/// Short correlation tag prefixing log lines and temp-file names for one
/// request: uppercase hex over a hash of time, mode, and source. Uniqueness
/// is best-effort; collisions only affect diagnostics.
pub fn create_request_identifier(mode: &str, source_request: &str) -> String {
    let input = format!("{}|{}|{}", Utc::now().to_rfc3339(), mode, source_request);
    let digest = Sha256::digest(input.as_bytes());
    let mut id = String::with_capacity(11);
    for b in &digest[..4] {
        id.push_str(&format!("{:02X}", b));
    }
    id.push_str(" - ");
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_custom_headers_are_dropped() {
        let info = RequestInformation::default()
            .add_custom_header("Host", "evil")
            .add_custom_header("connection", "keep-alive")
            .add_custom_header("ALLOW", "204")
            .add_custom_header("X-Scan-Profile", "strict");
        assert_eq!(info.render_custom_headers(), "X-Scan-Profile: strict\r\n");
    }

    #[test]
    fn empty_values_are_dropped_and_whitespace_trimmed() {
        let info = RequestInformation::default()
            .add_custom_header(" X-A ", "  1  ")
            .add_custom_header("X-B", "   ");
        assert_eq!(info.render_custom_headers(), "X-A: 1\r\n");
    }

    #[test]
    fn custom_headers_keep_insertion_order() {
        let info = RequestInformation::default()
            .add_custom_header("X-Second", "2")
            .add_custom_header("X-First", "1");
        assert_eq!(
            info.render_custom_headers(),
            "X-Second: 2\r\nX-First: 1\r\n"
        );
    }

    #[test]
    fn request_identifier_shape() {
        let id = create_request_identifier("REQMOD", "eicar.com (68 bytes)");
        assert_eq!(id.len(), 11);
        assert!(id.ends_with(" - "));
        assert!(id[..8].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id[..8].to_uppercase(), id[..8]);
    }

    #[test]
    fn service_url() {
        let s = ServiceInformation::new("icap.example.org", 1344, "avscan", false);
        assert_eq!(s.url(), "icap://icap.example.org:1344/avscan");
    }
}
