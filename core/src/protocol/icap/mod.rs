/*
 * mod.rs
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

//! ICAP (RFC 3507) client.
//!
//! Design:
//! - One transport per `validate` call, supplied by an `IcapConnectionManager`
//!   (direct dial by default; a pool owner can inject its own).
//! - Preview protocol: preview chunk first, `0; ieof` when it covers the whole
//!   body, otherwise `100 Continue` then the remainder as 8 KiB chunks.
//! - Verdicts are interpreted across vendor dialects (Sophos, Kaspersky,
//!   McAfee, Trend Micro, ESET, C-ICAP); blocked content is an error variant
//!   carrying the full response envelope and an explanation.
//! - SHA-256 digests over both directions, recorded as synthetic
//!   `X-Request-Message-Digest` / `X-Response-Message-Digest` headers, with
//!   optional bit-identical content verification.

pub mod client;
pub mod connection;
pub mod error;
pub mod headers;
pub mod mode;
pub mod request;
pub mod response;
pub mod verdict;

pub use client::IcapClient;
pub use connection::{DirectConnectionManager, IcapConnection, IcapConnectionManager, IcapStream};
pub use error::{IcapError, Result};
pub use headers::HeaderInformation;
pub use mode::Mode;
pub use request::{RequestInformation, Resource, ServiceInformation};
pub use response::RemoteServiceConfiguration;
pub use verdict::Verdict;
