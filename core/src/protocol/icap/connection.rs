/*
 * connection.rs
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

//! ICAP transport adapter: one plain or TLS stream per request, with
//! delimiter-bounded header reads, a chunked-body reader, and a per-receive
//! read timeout. Bytes read past a delimiter stay buffered for the next read.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tracing::warn;

use crate::net;
use crate::protocol::icap::request::ServiceInformation;

/// Chunk-size lines longer than this are treated as malformed framing.
const MAX_CHUNK_LINE: usize = 1024;

/// Stream to an ICAP service: plain TCP or TLS.
pub enum IcapStream {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
}

impl AsyncRead for IcapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            IcapStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            IcapStream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for IcapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            IcapStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            IcapStream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            IcapStream::Plain(s) => Pin::new(s).poll_flush(cx),
            IcapStream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            IcapStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            IcapStream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Supplies an open transport for one request. The engine never caches
/// transports; a pooling implementation owns any reuse behind this seam.
#[allow(async_fn_in_trait)]
pub trait IcapConnectionManager {
    async fn connect(
        &self,
        service: &ServiceInformation,
        connect_timeout: Duration,
    ) -> io::Result<IcapStream>;
}

/// Default connection manager: dial the service directly, plain or TLS per
/// its secure flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectConnectionManager;

impl IcapConnectionManager for DirectConnectionManager {
    async fn connect(
        &self,
        service: &ServiceInformation,
        connect_timeout: Duration,
    ) -> io::Result<IcapStream> {
        if service.secure {
            let tls = net::connect_tls(&service.host, service.port, connect_timeout).await?;
            Ok(IcapStream::Tls(tls))
        } else {
            let tcp = net::connect_plain(&service.host, service.port, connect_timeout).await?;
            Ok(IcapStream::Plain(tcp))
        }
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// One ICAP exchange's transport. Owns the stream for the duration of the
/// request and a read buffer retained across header and body reads.
pub struct IcapConnection {
    stream: IcapStream,
    read_buf: BytesMut,
    read_timeout: Duration,
}

impl IcapConnection {
    pub fn new(stream: IcapStream, read_timeout: Duration) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(8192),
            read_timeout,
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    pub async fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.stream.write_all(s.as_bytes()).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    /// Read until `delimiter` appears (inclusive), bounded by `max_len`
    /// bytes. Bytes past the delimiter stay buffered.
    pub async fn read_until(&mut self, delimiter: &[u8], max_len: usize) -> io::Result<Vec<u8>> {
        loop {
            if let Some(pos) = find_subsequence(&self.read_buf, delimiter) {
                let end = pos + delimiter.len();
                return Ok(self.read_buf.split_to(end).to_vec());
            }
            if self.read_buf.len() > max_len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("ICAP response head exceeds {} bytes", max_len),
                ));
            }
            if self.fill().await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before response was complete",
                ));
            }
        }
    }

    /// Decode an HTTP/1.1 chunked body into `sink`. Returns the number of
    /// body bytes written, or `None` if the framing was malformed or the
    /// stream ended before the terminating chunk (whatever was decodable has
    /// been written). Transport failures (timeout, socket error) are `Err`.
    pub async fn read_body(&mut self, sink: &mut dyn io::Write) -> io::Result<Option<u64>> {
        let mut total: u64 = 0;
        loop {
            let line = match self.body_line().await? {
                Some(line) => line,
                None => {
                    warn!("Unexpected end of stream in chunked body");
                    return Ok(None);
                }
            };
            let hex = line.split(';').next().unwrap_or("").trim();
            let size = match u64::from_str_radix(hex, 16) {
                Ok(n) => n,
                Err(_) => {
                    warn!("Malformed chunk length [{}]", line);
                    return Ok(None);
                }
            };
            if size == 0 {
                // blank line after the last-chunk marker; tolerate its absence
                let _ = self.body_line().await;
                return Ok(Some(total));
            }
            if !self.copy_chunk(size, sink).await? {
                warn!("Unexpected end of stream inside a chunk");
                return Ok(None);
            }
            match self.body_line().await? {
                Some(line) if line.is_empty() => {}
                _ => {
                    warn!("Missing CRLF after chunk data");
                    return Ok(None);
                }
            }
            total += size;
        }
    }

    /// One timeout-bounded read appended to the buffer. Returns 0 on EOF.
    async fn fill(&mut self) -> io::Result<usize> {
        let mut tmp = [0u8; 8192];
        let n = timeout(self.read_timeout, self.stream.read(&mut tmp))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "ICAP read timed out"))??;
        self.read_buf.extend_from_slice(&tmp[..n]);
        Ok(n)
    }

    /// Next CRLF-terminated line, without the CRLF. `None` on EOF or an
    /// implausibly long line.
    async fn body_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(pos) = find_subsequence(&self.read_buf, b"\r\n") {
                let line = self.read_buf.split_to(pos + 2);
                return Ok(Some(String::from_utf8_lossy(&line[..pos]).into_owned()));
            }
            if self.read_buf.len() > MAX_CHUNK_LINE {
                return Ok(None);
            }
            if self.fill().await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Stream exactly `remaining` chunk-data bytes into `sink`. Returns
    /// false if the stream ended first.
    async fn copy_chunk(&mut self, mut remaining: u64, sink: &mut dyn io::Write) -> io::Result<bool> {
        while remaining > 0 {
            if self.read_buf.is_empty() && self.fill().await? == 0 {
                return Ok(false);
            }
            let take = (self.read_buf.len() as u64).min(remaining) as usize;
            let bytes = self.read_buf.split_to(take);
            sink.write_all(&bytes)?;
            remaining -= take as u64;
        }
        Ok(true)
    }
}
