/*
 * uri.rs
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

//! Resource-name encoding for the inner HTTP request line. Resource names are
//! percent-encoded (UTF-8) as a single path segment.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Path segment safe set: encode everything except unreserved and sub-delims used in paths.
/// So we encode / ? # [ ] @ and space, %, etc.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b'[')
    .add(b']')
    .add(b'@')
    .add(b'%')
    .add(b' ');

/// Percent-encode a resource name for use as the path segment of the inner
/// HTTP request line. The name is trimmed first.
pub fn encode_resource_name(name: &str) -> String {
    utf8_percent_encode(name.trim(), PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_unchanged() {
        assert_eq!(encode_resource_name("report.pdf"), "report.pdf");
    }

    #[test]
    fn spaces_and_reserved_encoded() {
        assert_eq!(
            encode_resource_name("my report #1.pdf"),
            "my%20report%20%231.pdf"
        );
        assert_eq!(encode_resource_name("a/b"), "a%2Fb");
        assert_eq!(encode_resource_name("50%.txt"), "50%25.txt");
    }

    #[test]
    fn utf8_encoded() {
        assert_eq!(encode_resource_name("résumé"), "r%C3%A9sum%C3%A9");
    }

    #[test]
    fn surrounding_whitespace_trimmed() {
        assert_eq!(encode_resource_name("  eicar.com  "), "eicar.com");
    }
}
