/*
 * error.rs
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

//! ICAP client errors. Blocked content is an ordinary variant carrying the
//! full response envelope, not an exceptional control path.

use std::fmt;
use std::io;

use crate::protocol::icap::headers::HeaderInformation;

pub type Result<T> = std::result::Result<T, IcapError>;

/// Errors from ICAP operations (network, protocol, verdict).
#[derive(Debug)]
pub enum IcapError {
    /// Caller supplied an unusable resource or request (empty name, bad
    /// parameters). Not recoverable by retry.
    InvalidInput(String),
    /// Transport failure: connect, read, write, timeout, or a failed OPTIONS
    /// negotiation.
    Io(io::Error),
    /// The server answered with a status outside {100, 200, 204, 404}.
    UnknownResponse {
        status: u16,
        headers: HeaderInformation,
    },
    /// The adaptation service blocked the content: a threat was found, or
    /// content comparison showed the returned body differs from the input.
    ContentBlocked {
        message: String,
        headers: HeaderInformation,
        explanation: String,
    },
}

impl fmt::Display for IcapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcapError::InvalidInput(msg) => write!(f, "{}", msg),
            IcapError::Io(e) => write!(f, "{}", e),
            IcapError::UnknownResponse { status, .. } => {
                write!(f, "unrecognized status code in response header: {}", status)
            }
            IcapError::ContentBlocked { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for IcapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IcapError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for IcapError {
    fn from(e: io::Error) -> Self {
        IcapError::Io(e)
    }
}
