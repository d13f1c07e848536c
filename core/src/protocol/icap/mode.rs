/*
 * mode.rs
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

//! ICAP adaptation modes: REQMOD, RESPMOD, and the RESPMOD-shaped FILEMOD
//! used by some anti-malware engines for opaque file objects.

use std::fmt;
use std::str::FromStr;

/// Adaptation mode. Each mode has a wire name (the ICAP method) and a tag
/// used for section names in the `Encapsulated` header (`req-body`,
/// `res-body`, `file-body`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reqmod,
    Respmod,
    Filemod,
}

impl Mode {
    /// ICAP method name as it appears on the request line.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Mode::Reqmod => "REQMOD",
            Mode::Respmod => "RESPMOD",
            Mode::Filemod => "FILEMOD",
        }
    }

    /// Section tag for the `Encapsulated` header.
    pub fn tag(&self) -> &'static str {
        match self {
            Mode::Reqmod => "req",
            Mode::Respmod => "res",
            Mode::Filemod => "file",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl FromStr for Mode {
    type Err = String;

    /// Parse a `Methods` token from an OPTIONS response. Unknown tokens are
    /// an error; the negotiator aborts on them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "REQMOD" => Ok(Mode::Reqmod),
            "RESPMOD" => Ok(Mode::Respmod),
            "FILEMOD" => Ok(Mode::Filemod),
            other => Err(format!("unknown ICAP method [{}]", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_and_tags() {
        assert_eq!(Mode::Reqmod.wire_name(), "REQMOD");
        assert_eq!(Mode::Respmod.tag(), "res");
        assert_eq!(Mode::Filemod.tag(), "file");
    }

    #[test]
    fn parse_methods_tokens() {
        assert_eq!("REQMOD".parse::<Mode>(), Ok(Mode::Reqmod));
        assert_eq!(" RESPMOD ".parse::<Mode>(), Ok(Mode::Respmod));
        assert_eq!("FILEMOD".parse::<Mode>(), Ok(Mode::Filemod));
        assert!("OPTIONS".parse::<Mode>().is_err());
        assert!("reqmod".parse::<Mode>().is_err());
    }
}
