/*
 * net.rs
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

//! TCP/TLS connection helpers: dial an ICAP service with a connect timeout,
//! plain or with implicit TLS. ICAP has no STARTTLS; a secure service is TLS
//! from the first byte.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(_) => {}
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Default TLS client config (native + Mozilla roots, no client auth).
fn default_client_config() -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .with_root_certificates(build_root_store())
        .with_no_client_auth();
    Arc::new(config)
}

static DEFAULT_CONNECTOR: std::sync::OnceLock<TlsConnector> = std::sync::OnceLock::new();

fn default_connector() -> &'static TlsConnector {
    DEFAULT_CONNECTOR.get_or_init(|| TlsConnector::from(default_client_config()))
}

/// Connect without TLS, bounded by `connect_timeout`.
pub async fn connect_plain(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> io::Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    timeout(connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))?
}

/// Connect with implicit TLS: TCP connect (bounded by `connect_timeout`) then
/// an immediate TLS handshake.
pub async fn connect_tls(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> io::Result<TlsStream<TcpStream>> {
    let tcp = connect_plain(host, port, connect_timeout).await?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
    default_connector()
        .connect(server_name, tcp)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))
}
