/*
 * lib.rs
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

//! Vaglio: an ICAP (RFC 3507) client for content adaptation services.
//!
//! Submit a resource to an anti-malware or content-policy engine (ClamAV via
//! c-icap, Sophos, Kaspersky, McAfee, Trend Micro, ESET, ...) and interpret
//! its verdict:
//!
//! ```no_run
//! use vaglio_core::protocol::icap::{IcapClient, Mode, Resource, ServiceInformation};
//!
//! # async fn scan() -> vaglio_core::protocol::icap::Result<()> {
//! let service = ServiceInformation::new("localhost", 1344, "avscan", false);
//! let client = IcapClient::new(service);
//!
//! let data = b"hello\nwrld";
//! let resource = Resource::new("greeting.txt", data.len() as u64, &data[..]);
//! match client.validate(Mode::Reqmod, resource).await {
//!     Ok(headers) => println!("clean ({})", headers.status),
//!     Err(e) => eprintln!("blocked or failed: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod net;
pub mod protocol;
pub mod uri;
