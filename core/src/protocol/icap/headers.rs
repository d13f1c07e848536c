/*
 * headers.rs
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

//! ICAP response envelope: status, reason phrase, and an ordered multi-map of
//! headers with case-insensitive lookup and case-preserving storage.

pub const HEADER_HOST: &str = "Host";
pub const HEADER_CONNECTION: &str = "Connection";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_PREVIEW: &str = "Preview";
pub const HEADER_ENCAPSULATED: &str = "Encapsulated";
pub const HEADER_ALLOW: &str = "Allow";
pub const HEADER_METHODS: &str = "Methods";
pub const HEADER_TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";

/// Synthetic header holding the raw ICAP status line for diagnostics.
/// Stripped from the map before the caller or the verdict interpreter sees it.
pub const HEADER_X_ICAP_STATUSLINE: &str = "X-ICAP-Statusline";

pub const HEADER_X_INFECTION_FOUND: &str = "X-Infection-Found";
pub const HEADER_X_VIOLATIONS_FOUND: &str = "X-Violations-Found";
pub const HEADER_X_BLOCKED: &str = "X-Blocked";
pub const HEADER_X_VIRUS_ID: &str = "X-Virus-ID";
pub const HEADER_X_VIRUS_NAME: &str = "X-Virus-Name";
pub const HEADER_X_BLOCK_REASON: &str = "X-Block-Reason";
pub const HEADER_X_BLOCK_RESULT: &str = "X-Block-Result";

/// Synthetic headers set by the client on success.
pub const HEADER_X_REQUEST_MESSAGE_DIGEST: &str = "X-Request-Message-Digest";
pub const HEADER_X_RESPONSE_MESSAGE_DIGEST: &str = "X-Response-Message-Digest";
pub const HEADER_X_IDENTICAL_CONTENT: &str = "X-Identical-Content";

/// Custom-header names the client reserves for itself. Matching is
/// case-insensitive; supplied headers with these names are dropped.
pub const RESERVED_CUSTOM_HEADERS: [&str; 6] = [
    HEADER_HOST,
    HEADER_CONNECTION,
    HEADER_USER_AGENT,
    HEADER_PREVIEW,
    HEADER_ENCAPSULATED,
    HEADER_ALLOW,
];

/// Parsed ICAP response envelope: status code, reason phrase, and headers.
///
/// Headers are an ordered multi-map: one entry per name in first-seen order,
/// each holding the list of values in arrival order. Lookup is
/// case-insensitive, storage preserves the case the server sent.
#[derive(Debug, Clone, Default)]
pub struct HeaderInformation {
    pub status: u16,
    pub message: String,
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderInformation {
    /// Empty envelope (status 0, no headers). Returned for zero-length
    /// resources, which are never sent to the service.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            entries: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// All values recorded for `name`, or an empty slice.
    pub fn values(&self, name: &str) -> &[String] {
        self.entry(name).map(|(_, v)| v.as_slice()).unwrap_or(&[])
    }

    /// First value recorded for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(|s| s.as_str())
    }

    /// Append a value, merging into the existing entry for `name` if one
    /// exists (case-insensitively), otherwise adding a new entry at the end.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(name) {
            Some(pos) => self.entries[pos].1.push(value),
            None => self.entries.push((name.to_string(), vec![value])),
        }
    }

    /// Replace the values for `name`, keeping the entry's position and
    /// original casing if it exists.
    pub fn set(&mut self, name: &str, values: Vec<String>) {
        match self.position(name) {
            Some(pos) => self.entries[pos].1 = values,
            None => self.entries.push((name.to_string(), values)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the header block: one line per entry, multi-values joined
    /// with ", ". Name order and value multiplicity survive a parse/serialize
    /// round trip.
    pub fn serialize_headers(&self) -> String {
        let mut out = String::new();
        for (name, values) in self.iter() {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&values.join(", "));
            out.push_str("\r\n");
        }
        out
    }

    fn entry(&self, name: &str) -> Option<&(String, Vec<String>)> {
        self.entries.iter().find(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut h = HeaderInformation::with_status(200, "OK");
        h.append("X-Virus-ID", "EICAR");
        assert!(h.contains("x-virus-id"));
        assert_eq!(h.first("X-VIRUS-ID"), Some("EICAR"));
        assert_eq!(h.first("X-Virus-Name"), None);
    }

    #[test]
    fn storage_preserves_case_and_order() {
        let mut h = HeaderInformation::new();
        h.append("ISTag", "\"a\"");
        h.append("Methods", "REQMOD");
        h.append("methods", "RESPMOD");
        let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["ISTag", "Methods"]);
        assert_eq!(h.values("Methods"), ["REQMOD", "RESPMOD"]);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut h = HeaderInformation::new();
        h.append("A", "1");
        h.append("B", "2");
        h.set("a", vec!["3".to_string()]);
        assert_eq!(h.values("A"), ["3"]);
        let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn remove_drops_entry() {
        let mut h = HeaderInformation::new();
        h.append("X-ICAP-Statusline", "ICAP/1.0 200 OK");
        h.remove("x-icap-statusline");
        assert!(h.is_empty());
    }

    #[test]
    fn serialize_joins_multi_values() {
        let mut h = HeaderInformation::new();
        h.append("Methods", "REQMOD");
        h.append("Methods", "RESPMOD");
        h.append("Preview", "1024");
        assert_eq!(
            h.serialize_headers(),
            "Methods: REQMOD, RESPMOD\r\nPreview: 1024\r\n"
        );
    }
}
