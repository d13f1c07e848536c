/*
 * response.rs
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

//! ICAP response-head parsing and the negotiated service configuration
//! obtained from OPTIONS.

use std::io;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::protocol::icap::headers::{
    HeaderInformation, HEADER_ALLOW, HEADER_METHODS, HEADER_PREVIEW, HEADER_X_ICAP_STATUSLINE,
};
use crate::protocol::icap::mode::Mode;

/// Preview size assumed when the server does not advertise one, or
/// advertises one we cannot parse.
pub const DEFAULT_PREVIEW_SIZE: usize = 1024;

/// Parse an ICAP response head (status line plus headers, already read up to
/// and including the blank line) into a `HeaderInformation`.
///
/// The raw status line is recorded under the synthetic `X-ICAP-Statusline`
/// header. Header values are split on commas so entries of `Methods` and
/// `Encapsulated` are individually addressable.
pub fn parse_response_head(raw: &[u8]) -> io::Result<HeaderInformation> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid response head UTF-8"))?;
    let mut lines = text.split("\r\n");

    let status_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty ICAP response"))?;

    // ICAP/1.0 200 OK (reason phrase optional)
    let mut parts = status_line.splitn(3, ' ');
    let protocol = parts.next().unwrap_or("");
    if !protocol.starts_with("ICAP/") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("not an ICAP status line: [{}]", status_line),
        ));
    }
    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("missing status code in [{}]", status_line),
            )
        })?;
    let message = parts.next().unwrap_or("").trim().to_string();

    let mut head = HeaderInformation::with_status(status, message);
    head.append(HEADER_X_ICAP_STATUSLINE, status_line);

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some(colon) = line.find(':') else {
            continue;
        };
        let name = line[..colon].trim();
        let value = line[colon + 1..].trim();
        if name.is_empty() {
            continue;
        }
        if value.is_empty() {
            head.append(name, "");
            continue;
        }
        for piece in value.split(',') {
            let piece = piece.trim();
            if !piece.is_empty() {
                head.append(name, piece);
            }
        }
    }
    Ok(head)
}

/// Result of an OPTIONS negotiation, cached on the client: the methods the
/// service supports, its preview size, whether it honours `Allow: 204`, and
/// the raw header map it sent.
#[derive(Debug, Clone)]
pub struct RemoteServiceConfiguration {
    pub negotiated_at: DateTime<Utc>,
    pub methods: Vec<Mode>,
    pub preview_size: usize,
    pub allow_204: bool,
    pub headers: HeaderInformation,
}

impl RemoteServiceConfiguration {
    /// Extract the configuration from a 200 OPTIONS response head. Preview
    /// and Allow tolerate absence or garbage by defaulting; an unknown
    /// `Methods` token aborts negotiation.
    pub fn from_options_response(head: HeaderInformation) -> io::Result<Self> {
        let mut preview_size = DEFAULT_PREVIEW_SIZE;
        if let Some(value) = head.first(HEADER_PREVIEW) {
            match value.parse::<usize>() {
                Ok(n) => preview_size = n,
                Err(e) => {
                    warn!("Could not parse server preview size [{}]: {}", value, e);
                }
            }
        }

        let allow_204 = head
            .first(HEADER_ALLOW)
            .map(|v| v.eq_ignore_ascii_case("204"))
            .unwrap_or(false);

        let mut methods = Vec::new();
        for token in head.values(HEADER_METHODS) {
            for token in token.split_whitespace() {
                let mode = token
                    .parse::<Mode>()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                methods.push(mode);
            }
        }

        Ok(Self {
            negotiated_at: Utc::now(),
            methods,
            preview_size,
            allow_204,
            headers: head,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS_HEAD: &[u8] = b"ICAP/1.0 200 OK\r\n\
        Methods: RESPMOD, REQMOD\r\n\
        Service: C-ICAP/0.5.10 server - Antivirus service\r\n\
        ISTag: \"CI0001-XXXXXXXXX\"\r\n\
        Preview: 1024\r\n\
        Allow: 204\r\n\
        Max-Connections: 100\r\n\r\n";

    #[test]
    fn parse_status_line_and_headers() {
        let head = parse_response_head(OPTIONS_HEAD).unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.message, "OK");
        assert_eq!(
            head.first("X-ICAP-Statusline"),
            Some("ICAP/1.0 200 OK")
        );
        assert_eq!(head.values("Methods"), ["RESPMOD", "REQMOD"]);
        assert_eq!(head.first("Preview"), Some("1024"));
    }

    #[test]
    fn parse_reason_phrase_optional() {
        let head = parse_response_head(b"ICAP/1.0 100\r\n\r\n").unwrap();
        assert_eq!(head.status, 100);
        assert_eq!(head.message, "");
    }

    #[test]
    fn parse_rejects_non_icap() {
        assert!(parse_response_head(b"HTTP/1.1 200 OK\r\n\r\n").is_err());
        assert!(parse_response_head(b"\r\n\r\n").is_err());
    }

    #[test]
    fn reserialize_preserves_order_and_multiplicity() {
        let mut head = parse_response_head(OPTIONS_HEAD).unwrap();
        head.remove("X-ICAP-Statusline");
        assert_eq!(
            head.serialize_headers(),
            "Methods: RESPMOD, REQMOD\r\n\
             Service: C-ICAP/0.5.10 server - Antivirus service\r\n\
             ISTag: \"CI0001-XXXXXXXXX\"\r\n\
             Preview: 1024\r\n\
             Allow: 204\r\n\
             Max-Connections: 100\r\n"
        );
    }

    #[test]
    fn options_configuration_extracted() {
        let head = parse_response_head(OPTIONS_HEAD).unwrap();
        let config = RemoteServiceConfiguration::from_options_response(head).unwrap();
        assert_eq!(config.methods, vec![Mode::Respmod, Mode::Reqmod]);
        assert_eq!(config.preview_size, 1024);
        assert!(config.allow_204);
    }

    #[test]
    fn options_defaults_on_missing_or_bad_preview() {
        let head =
            parse_response_head(b"ICAP/1.0 200 OK\r\nMethods: REQMOD\r\n\r\n").unwrap();
        let config = RemoteServiceConfiguration::from_options_response(head).unwrap();
        assert_eq!(config.preview_size, DEFAULT_PREVIEW_SIZE);
        assert!(!config.allow_204);

        let head = parse_response_head(
            b"ICAP/1.0 200 OK\r\nMethods: REQMOD\r\nPreview: many\r\n\r\n",
        )
        .unwrap();
        let config = RemoteServiceConfiguration::from_options_response(head).unwrap();
        assert_eq!(config.preview_size, DEFAULT_PREVIEW_SIZE);
    }

    #[test]
    fn options_unknown_method_aborts() {
        let head =
            parse_response_head(b"ICAP/1.0 200 OK\r\nMethods: REQMOD, LOGVIEW\r\n\r\n").unwrap();
        assert!(RemoteServiceConfiguration::from_options_response(head).is_err());
    }
}
