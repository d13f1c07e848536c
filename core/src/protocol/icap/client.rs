/*
 * client.rs
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

//! ICAP client: negotiate service capabilities with OPTIONS, then run
//! REQMOD/RESPMOD/FILEMOD adaptations. The engine sends the body under the
//! preview protocol (preview chunk, then `100 Continue` and the remainder,
//! or `ieof` when the preview covers everything), interprets the verdict,
//! and computes SHA-256 digests over both directions in a single pass.

use std::io;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::protocol::icap::connection::{
    DirectConnectionManager, IcapConnection, IcapConnectionManager,
};
use crate::protocol::icap::error::{IcapError, Result};
use crate::protocol::icap::headers::{
    HeaderInformation, HEADER_CONTENT_LENGTH, HEADER_ENCAPSULATED, HEADER_TRANSFER_ENCODING,
    HEADER_X_ICAP_STATUSLINE, HEADER_X_IDENTICAL_CONTENT, HEADER_X_REQUEST_MESSAGE_DIGEST,
    HEADER_X_RESPONSE_MESSAGE_DIGEST,
};
use crate::protocol::icap::mode::Mode;
use crate::protocol::icap::request::{
    create_request_identifier, RequestInformation, Resource, ServiceInformation,
};
use crate::protocol::icap::response::{parse_response_head, RemoteServiceConfiguration};
use crate::protocol::icap::verdict::{self, Verdict};
use crate::uri;

/// ICAP client bound to one remote service. Cheap to keep around: the OPTIONS
/// result is negotiated once and cached; each `validate` call owns exactly
/// one transport for its duration, so a single client can serve concurrent
/// callers.
pub struct IcapClient<M = DirectConnectionManager> {
    service: ServiceInformation,
    manager: M,
    remote_configuration: Mutex<Option<RemoteServiceConfiguration>>,
    buffer_size: usize,
    compare_verify_identical_content: bool,
}

impl IcapClient<DirectConnectionManager> {
    /// Client dialing the service directly (plain or TLS per its secure flag).
    pub fn new(service: ServiceInformation) -> Self {
        Self::with_connection_manager(service, DirectConnectionManager)
    }
}

impl<M: IcapConnectionManager> IcapClient<M> {
    /// Client with an injected connection manager (e.g. a pool owner).
    pub fn with_connection_manager(service: ServiceInformation, manager: M) -> Self {
        Self {
            service,
            manager,
            remote_configuration: Mutex::new(None),
            buffer_size: 8192,
            compare_verify_identical_content: false,
        }
    }

    /// Enable comparing input and output digests to confirm the service
    /// returned bit-identical content. Off by default.
    pub fn set_compare_verify_identical_content(mut self, enabled: bool) -> Self {
        self.compare_verify_identical_content = enabled;
        self
    }

    /// Buffer size for streaming the body remainder, and the bound on
    /// response heads. Default 8192.
    pub fn set_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn service(&self) -> &ServiceInformation {
        &self.service
    }

    /// Negotiate service capabilities with default request information.
    pub async fn options(&self) -> Result<RemoteServiceConfiguration> {
        self.options_with(&RequestInformation::default()).await
    }

    /// Negotiate service capabilities. The result is cached; subsequent
    /// calls (and `validate`) reuse it without re-probing. A failed
    /// negotiation clears the cache.
    pub async fn options_with(
        &self,
        request: &RequestInformation,
    ) -> Result<RemoteServiceConfiguration> {
        if let Some(config) = self.lock_configuration().clone() {
            return Ok(config);
        }

        let identifier = create_request_identifier("options", "");
        match self.probe_options(request, &identifier).await {
            Ok(config) => {
                *self.lock_configuration() = Some(config.clone());
                Ok(config)
            }
            Err(e) => {
                *self.lock_configuration() = None;
                warn!("{}Could not negotiate service options: {}", identifier, e);
                Err(e)
            }
        }
    }

    /// Validate a resource with default request information.
    pub async fn validate<R>(&self, mode: Mode, resource: Resource<R>) -> Result<HeaderInformation>
    where
        R: AsyncRead + Unpin,
    {
        self.validate_with(mode, &RequestInformation::default(), resource)
            .await
    }

    /// Submit a resource for adaptation and interpret the verdict.
    ///
    /// Returns the response envelope when the content is acceptable. A
    /// detected threat, or (with comparison enabled) non-identical returned
    /// content, surfaces as `IcapError::ContentBlocked`. Zero-length
    /// resources return an empty envelope without touching the network.
    pub async fn validate_with<R>(
        &self,
        mode: Mode,
        request: &RequestInformation,
        mut resource: Resource<R>,
    ) -> Result<HeaderInformation>
    where
        R: AsyncRead + Unpin,
    {
        if resource.length == 0 {
            return Ok(HeaderInformation::new());
        }
        if resource.name.trim().is_empty() {
            return Err(IcapError::InvalidInput("Invalid input resource!".to_string()));
        }

        let source_request = request.prepare_source_request(&resource.name, resource.length);
        let identifier = create_request_identifier(mode.wire_name(), &source_request);
        info!("{}Validate resource ({})", identifier, source_request);

        let config = self.options_with(request).await?;

        // scoped response-body sink; removed on drop on every exit path
        let mut body_file = tempfile::Builder::new()
            .prefix(&identifier)
            .suffix(".tmp")
            .tempfile()
            .map_err(IcapError::Io)?;

        let stream = self
            .manager
            .connect(&self.service, request.connect_timeout)
            .await?;
        let mut conn = IcapConnection::new(stream, request.read_timeout);

        let result = self
            .process_resource(
                &identifier,
                &mut conn,
                mode,
                request,
                &mut resource,
                &config,
                &mut body_file,
            )
            .await;
        let _ = conn.shutdown().await;

        let mut head = match result {
            Ok(head) => head,
            Err(IcapError::Io(e)) => {
                warn!("{}Could not access the ICAP server: {}", identifier, e);
                return Err(IcapError::Io(e));
            }
            Err(e) => return Err(e),
        };

        head.remove(HEADER_X_ICAP_STATUSLINE);

        if head.status == 200 {
            let body = if verdict::has_threat_headers(&head) {
                match std::fs::read(body_file.path()) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("{}Could not read resource response: {}", identifier, e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            match verdict::interpret(mode, &head, &body, self.compare_verify_identical_content) {
                Verdict::ThreatFound(explanation) => {
                    let message = format!(
                        "Threat found in resource ({}, http-status: {}):\n{}",
                        source_request,
                        head.status,
                        extended_headers(&head).trim_end()
                    );
                    info!("{}{}", identifier, message);
                    return Err(IcapError::ContentBlocked {
                        message,
                        headers: head,
                        explanation,
                    });
                }
                Verdict::NotIdentical => {
                    let message = format!(
                        "Not identical resource ({}, http-status: {}):\n{}",
                        source_request,
                        head.status,
                        extended_headers(&head).trim_end()
                    );
                    info!("{}{}", identifier, message);
                    return Err(IcapError::ContentBlocked {
                        message,
                        headers: head,
                        explanation: String::new(),
                    });
                }
                Verdict::Clean | Verdict::Unknown => {}
            }
        }

        info!(
            "{}Valid resource ({}, http-status: {})",
            identifier, source_request, head.status
        );
        Ok(head)
    }

    async fn probe_options(
        &self,
        request: &RequestInformation,
        identifier: &str,
    ) -> Result<RemoteServiceConfiguration> {
        let stream = self
            .manager
            .connect(&self.service, request.connect_timeout)
            .await?;
        let mut conn = IcapConnection::new(stream, request.read_timeout);

        let envelope = format!(
            "OPTIONS {} ICAP/{}\r\n\
             Host: {}\r\n\
             User-Agent: {}\r\n\
             {}\
             Encapsulated: null-body=0\r\n\r\n",
            self.service.url(),
            request.api_version,
            self.service.host,
            request.user_agent,
            request.render_custom_headers(),
        );
        conn.write_str(&envelope).await?;
        conn.flush().await?;

        let head = self.read_response(&mut conn).await?;
        let _ = conn.shutdown().await;
        if head.status != 200 {
            return Err(IcapError::Io(io::Error::other("Could not resolve options!")));
        }

        let config = RemoteServiceConfiguration::from_options_response(head)?;
        info!(
            "{}Valid service [{}/{}], allow 204: {}, available methods: {:?}",
            identifier,
            config.headers.status,
            config.headers.message,
            config.allow_204,
            config.methods
        );
        Ok(config)
    }

    /// Run one adaptation exchange over an open connection: envelope and
    /// preview out, `100 Continue` handshake, remainder out, final envelope
    /// in, encapsulated body (if any) into `body_file`.
    #[allow(clippy::too_many_arguments)]
    async fn process_resource<R>(
        &self,
        identifier: &str,
        conn: &mut IcapConnection,
        mode: Mode,
        request: &RequestInformation,
        resource: &mut Resource<R>,
        config: &RemoteServiceConfiguration,
        body_file: &mut NamedTempFile,
    ) -> Result<HeaderInformation>
    where
        R: AsyncRead + Unpin,
    {
        let preview = (config.preview_size as u64).min(resource.length) as usize;

        // encapsulated HTTP head; blank lines are part of the offsets
        let req_head = format!(
            "GET /{} HTTP/1.1\r\nHost: {}\r\n\r\n",
            uri::encode_resource_name(&resource.name),
            request.request_source
        );
        let (encapsulated, payload) = match mode {
            Mode::Reqmod => (format!("req-hdr=0, req-body={}", req_head.len()), req_head),
            Mode::Respmod | Mode::Filemod => {
                let res_head = format!(
                    "HTTP/1.1 200 OK\r\n{}: chunked\r\n{}: {}\r\n\r\n",
                    HEADER_TRANSFER_ENCODING, HEADER_CONTENT_LENGTH, resource.length
                );
                let enc = format!(
                    "req-hdr=0, {tag}-hdr={}, {tag}-body={}",
                    req_head.len(),
                    req_head.len() + res_head.len(),
                    tag = mode.tag()
                );
                (enc, format!("{}{}", req_head, res_head))
            }
        };

        let envelope = format!(
            "{} {} ICAP/{}\r\n\
             Host: {}\r\n\
             Connection: close\r\n\
             User-Agent: {}\r\n\
             {}\
             {}\
             Preview: {}\r\n\
             Encapsulated: {}\r\n\r\n\
             {}",
            mode.wire_name(),
            self.service.url(),
            request.api_version,
            self.service.host,
            request.user_agent,
            request.render_custom_headers(),
            allow_204_line(identifier, request, config),
            preview,
            encapsulated,
            payload
        );
        conn.write_str(&envelope).await?;

        // preview chunk; with preview == 0 the emitted "0\r\n\r\n" doubles
        // as the terminator of an empty preview
        let mut input_digest = Sha256::new();
        let mut chunk = vec![0u8; preview];
        resource.body.read_exact(&mut chunk).await.map_err(IcapError::Io)?;
        input_digest.update(&chunk);
        conn.write_str(&format!("{:x}\r\n", preview)).await?;
        conn.write(&chunk).await?;
        conn.write_str("\r\n").await?;
        if resource.length <= preview as u64 {
            conn.write_str("0; ieof\r\n\r\n").await?;
        } else if preview != 0 {
            conn.write_str("0\r\n\r\n").await?;
        }
        conn.flush().await?;

        // with body remaining, the server decides: continue, short-circuit,
        // or reject
        let mut early: Option<HeaderInformation> = None;
        if resource.length > preview as u64 {
            let head = self.read_response(conn).await?;
            match head.status {
                100 => {
                    let mut buffer = vec![0u8; self.buffer_size];
                    let mut total = preview as u64;
                    loop {
                        let n = resource.body.read(&mut buffer).await.map_err(IcapError::Io)?;
                        if n == 0 {
                            break;
                        }
                        total += n as u64;
                        debug!(
                            "{}Send next block of {} bytes (total sent: {} bytes)...",
                            identifier, n, total
                        );
                        input_digest.update(&buffer[..n]);
                        conn.write_str(&format!("{:x}\r\n", n)).await?;
                        conn.write(&buffer[..n]).await?;
                        conn.write_str("\r\n").await?;
                    }
                    conn.write_str("0\r\n\r\n").await?;
                    conn.flush().await?;
                }
                200 | 204 => early = Some(head),
                404 => {
                    return Err(IcapError::Io(io::Error::new(
                        io::ErrorKind::NotFound,
                        "404: ICAP Service not found",
                    )))
                }
                status => return Err(IcapError::UnknownResponse { status, headers: head }),
            }
        }

        let mut head = match early {
            Some(head) => head,
            None => self.read_response(conn).await?,
        };

        if head.status == 204 {
            // unmodified
            return Ok(head);
        }
        if head.status != 200 {
            return Err(IcapError::UnknownResponse {
                status: head.status,
                headers: head,
            });
        }

        // 200 OK: the ICAP status is fine, the encapsulated HTTP message may
        // still carry a block page or a modified body
        if request.allow_204 == Some(false) && mode == Mode::Reqmod {
            // caller opted out of 204; hand back the envelope untouched
            return Ok(head);
        }
        if !head.contains(HEADER_ENCAPSULATED) {
            warn!("{}Missing {} information!", identifier, HEADER_ENCAPSULATED);
            return Ok(head);
        }

        let entries = head.values(HEADER_ENCAPSULATED);
        let has_header_section = entries
            .iter()
            .any(|e| section_name(e).to_ascii_lowercase().ends_with("-hdr"));
        let has_body_section = entries.iter().any(|e| {
            let key = section_name(e).to_ascii_lowercase();
            key.ends_with("-body") && key != "null-body"
        });
        if !has_body_section {
            debug!("{}No encapsulated body section in response", identifier);
            return Ok(head);
        }
        if has_header_section {
            // encapsulated HTTP head precedes the chunked body; not needed
            let _ = conn.read_until(b"\r\n\r\n", self.buffer_size).await?;
        }

        let mut output_digest = Sha256::new();
        let mut sink = DigestWriter {
            inner: body_file.as_file_mut(),
            digest: &mut output_digest,
            written: 0,
        };
        let transferred = conn.read_body(&mut sink).await?;
        sink.flush().map_err(IcapError::Io)?;
        let response_length = sink.written;

        let input_hex = bytes_to_hex(&input_digest.finalize());
        let output_hex = bytes_to_hex(&output_digest.finalize());
        head.set(HEADER_X_REQUEST_MESSAGE_DIGEST, vec![input_hex.clone()]);
        head.set(HEADER_X_RESPONSE_MESSAGE_DIGEST, vec![output_hex.clone()]);

        debug!(
            "{}Resource length: {}, response length: {}",
            identifier, resource.length, response_length
        );

        if self.compare_verify_identical_content {
            let identical = transferred.is_some()
                && resource.length == response_length
                && input_hex == output_hex;
            head.set(HEADER_X_IDENTICAL_CONTENT, vec![identical.to_string()]);
            if identical {
                debug!(
                    "{}Input and output are equal -> allow, it's a valid response!",
                    identifier
                );
            }
        }

        Ok(head)
    }

    async fn read_response(&self, conn: &mut IcapConnection) -> Result<HeaderInformation> {
        let raw = conn.read_until(b"\r\n\r\n", self.buffer_size).await?;
        let head = parse_response_head(&raw)?;
        Ok(head)
    }

    fn lock_configuration(&self) -> MutexGuard<'_, Option<RemoteServiceConfiguration>> {
        self.remote_configuration
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// `Allow: 204` request line, emitted iff the server supports 204 and the
/// caller did not opt out. Logs the decision with both reasons.
fn allow_204_line(
    identifier: &str,
    request: &RequestInformation,
    config: &RemoteServiceConfiguration,
) -> &'static str {
    let server_reason = if config.allow_204 {
        "supported by the icap-server"
    } else {
        "not supported by the icap-server"
    };
    let request_reason = match request.allow_204 {
        None => "auto select",
        Some(true) => "requested",
        Some(false) => "not requested",
    };
    let use_allow_204 = config.allow_204 && request.allow_204 != Some(false);
    let decision = if use_allow_204 {
        "Use allow 204"
    } else {
        "Not use allow 204"
    };
    debug!("{}{}: {} ({})", identifier, decision, request_reason, server_reason);
    if use_allow_204 {
        "Allow: 204\r\n"
    } else {
        ""
    }
}

/// All `X-*` response headers, one `- Name: values` line each, for the
/// blocked-content message.
fn extended_headers(head: &HeaderInformation) -> String {
    let mut out = String::new();
    for (name, values) in head.iter() {
        if name.to_ascii_lowercase().starts_with("x-") {
            out.push_str("- ");
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&values.join(", "));
            out.push('\n');
        }
    }
    out
}

fn section_name(entry: &str) -> &str {
    entry.split('=').next().unwrap_or("").trim()
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX[(b >> 4) as usize] as char);
        s.push(HEX[(b & 0x0f) as usize] as char);
    }
    s
}

/// Tees body bytes into the sink file while updating the output digest.
struct DigestWriter<'a> {
    inner: &'a mut std::fs::File,
    digest: &'a mut Sha256,
    written: u64,
}

impl Write for DigestWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config(allow_204: bool) -> RemoteServiceConfiguration {
        RemoteServiceConfiguration {
            negotiated_at: Utc::now(),
            methods: vec![Mode::Reqmod, Mode::Respmod],
            preview_size: 1024,
            allow_204,
            headers: HeaderInformation::with_status(200, "OK"),
        }
    }

    #[test]
    fn allow_204_emitted_only_when_server_supports_and_caller_agrees() {
        let mut request = RequestInformation::default();
        assert_eq!(allow_204_line("", &request, &config(true)), "Allow: 204\r\n");
        assert_eq!(allow_204_line("", &request, &config(false)), "");

        request.allow_204 = Some(false);
        assert_eq!(allow_204_line("", &request, &config(true)), "");

        request.allow_204 = Some(true);
        assert_eq!(allow_204_line("", &request, &config(true)), "Allow: 204\r\n");
    }

    #[test]
    fn extended_headers_lists_x_headers_only() {
        let mut head = HeaderInformation::with_status(200, "OK");
        head.append("ISTag", "\"a\"");
        head.append("X-Virus-ID", "EICAR-Test-File");
        head.append("x-blocked", "policy");
        assert_eq!(
            extended_headers(&head),
            "- X-Virus-ID: EICAR-Test-File\n- x-blocked: policy\n"
        );
    }

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(bytes_to_hex(&[0x00, 0x9f, 0xff]), "009fff");
    }
}
