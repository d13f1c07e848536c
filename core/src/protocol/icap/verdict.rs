/*
 * verdict.rs
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

//! Verdict interpretation across vendor dialects. Anti-malware engines do not
//! agree on how to report a detection; the union of their headers is checked.

use crate::protocol::icap::headers::{
    HeaderInformation, HEADER_ENCAPSULATED, HEADER_X_BLOCKED, HEADER_X_BLOCK_REASON,
    HEADER_X_BLOCK_RESULT, HEADER_X_IDENTICAL_CONTENT, HEADER_X_INFECTION_FOUND,
    HEADER_X_VIOLATIONS_FOUND, HEADER_X_VIRUS_ID, HEADER_X_VIRUS_NAME,
};
use crate::protocol::icap::mode::Mode;

/// Outcome of an adaptation exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    /// A threat was reported; carries the engine's explanation.
    ThreatFound(String),
    /// Content comparison is enabled and the returned body differs from the
    /// input.
    NotIdentical,
    /// The status was not one the interpreter understands.
    Unknown,
}

/// True if any vendor dialect signalled a detection.
pub fn has_threat_headers(headers: &HeaderInformation) -> bool {
    headers.contains(HEADER_X_INFECTION_FOUND)
        || headers.contains(HEADER_X_VIOLATIONS_FOUND)
        || headers.contains(HEADER_X_BLOCKED) // Sophos
        || headers.contains(HEADER_X_VIRUS_ID) // Sophos, Kaspersky, Trend Micro, ESET, McAfee, C-ICAP
        || headers.contains(HEADER_X_VIRUS_NAME) // McAfee
        || headers.contains(HEADER_X_BLOCK_REASON) // McAfee
        || headers.contains(HEADER_X_BLOCK_RESULT) // McAfee
}

/// Explanation for a detection, in priority order: the encapsulated body (if
/// the response names a `<tag>-body` section and body bytes were captured),
/// then the Sophos/McAfee explanation headers, then `"n/a"`.
pub fn threat_explanation(mode: Mode, headers: &HeaderInformation, body: &[u8]) -> String {
    if !body.is_empty() {
        let section = format!("{}-body", mode.tag());
        let named = headers.values(HEADER_ENCAPSULATED).iter().any(|entry| {
            let mut split = entry.split('=');
            let key = split.next().unwrap_or("").trim();
            split.next().is_some() && key.eq_ignore_ascii_case(&section)
        });
        if named {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }

    for name in [HEADER_X_BLOCKED, HEADER_X_VIRUS_ID, HEADER_X_VIRUS_NAME] {
        let values = headers.values(name);
        if !values.is_empty() {
            let joined = values.join(", ");
            if !joined.trim().is_empty() {
                return joined;
            }
        }
    }

    "n/a".to_string()
}

/// Derive the verdict from a response envelope. `body` is the captured
/// encapsulated body (empty when none was read); `compare_identical` is the
/// client's content-comparison switch.
pub fn interpret(
    mode: Mode,
    headers: &HeaderInformation,
    body: &[u8],
    compare_identical: bool,
) -> Verdict {
    match headers.status {
        204 => Verdict::Clean,
        200 => {
            if has_threat_headers(headers) {
                return Verdict::ThreatFound(threat_explanation(mode, headers, body));
            }
            if compare_identical {
                if let Some(value) = headers.first(HEADER_X_IDENTICAL_CONTENT) {
                    if value.eq_ignore_ascii_case("false") {
                        return Verdict::NotIdentical;
                    }
                }
            }
            Verdict::Clean
        }
        _ => Verdict::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_200(pairs: &[(&str, &str)]) -> HeaderInformation {
        let mut h = HeaderInformation::with_status(200, "OK");
        for (name, value) in pairs {
            h.append(name, *value);
        }
        h
    }

    #[test]
    fn clean_on_204() {
        let h = HeaderInformation::with_status(204, "No Content");
        assert_eq!(interpret(Mode::Reqmod, &h, &[], false), Verdict::Clean);
    }

    #[test]
    fn threat_detected_for_each_vendor_header() {
        for name in [
            "X-Infection-Found",
            "X-Violations-Found",
            "X-Blocked",
            "X-Virus-ID",
            "X-Virus-Name",
            "X-Block-Reason",
            "X-Block-Result",
        ] {
            let h = headers_200(&[(name, "something")]);
            assert!(
                matches!(interpret(Mode::Reqmod, &h, &[], false), Verdict::ThreatFound(_)),
                "{} should signal a threat",
                name
            );
        }
    }

    #[test]
    fn body_explanation_takes_priority() {
        // Encapsulated entries arrive comma-split from the parser
        let h = headers_200(&[
            ("X-Virus-ID", "EICAR-Test-File"),
            ("Encapsulated", "res-hdr=0"),
            ("Encapsulated", "res-body=83"),
        ]);
        let verdict = interpret(Mode::Respmod, &h, b"  EICAR found\n", false);
        assert_eq!(verdict, Verdict::ThreatFound("EICAR found".to_string()));
    }

    #[test]
    fn body_ignored_when_section_not_named() {
        // REQMOD looks for req-body; a res-body section does not match.
        let h = headers_200(&[
            ("X-Virus-ID", "EICAR-Test-File"),
            ("Encapsulated", "res-hdr=0"),
            ("Encapsulated", "res-body=83"),
        ]);
        let verdict = interpret(Mode::Reqmod, &h, b"EICAR found", false);
        assert_eq!(verdict, Verdict::ThreatFound("EICAR-Test-File".to_string()));
    }

    #[test]
    fn header_fallback_order() {
        let h = headers_200(&[("X-Blocked", "Policy Violation"), ("X-Virus-ID", "worm")]);
        let verdict = interpret(Mode::Reqmod, &h, &[], false);
        assert_eq!(verdict, Verdict::ThreatFound("Policy Violation".to_string()));

        let h = headers_200(&[("X-Block-Result", "denied")]);
        let verdict = interpret(Mode::Reqmod, &h, &[], false);
        assert_eq!(verdict, Verdict::ThreatFound("n/a".to_string()));
    }

    #[test]
    fn not_identical_requires_comparison_enabled() {
        let h = headers_200(&[("X-Identical-Content", "false")]);
        assert_eq!(interpret(Mode::Respmod, &h, &[], true), Verdict::NotIdentical);
        assert_eq!(interpret(Mode::Respmod, &h, &[], false), Verdict::Clean);

        let h = headers_200(&[("X-Identical-Content", "true")]);
        assert_eq!(interpret(Mode::Respmod, &h, &[], true), Verdict::Clean);
    }

    #[test]
    fn unknown_on_unexpected_status() {
        let h = HeaderInformation::with_status(500, "Internal Server Error");
        assert_eq!(interpret(Mode::Reqmod, &h, &[], false), Verdict::Unknown);
    }
}
