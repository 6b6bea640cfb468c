//! QUIC transport for the presence service.
//!
//! Production transport using the Quinn library: encrypted, multiplexed
//! streams over UDP with TLS 1.3 and ALPN set to the roster protocol.
//! Presence updates flow over one server-to-client unidirectional stream
//! per connection; the connection close is the only client signal the
//! server reacts to, so no inbound streams are accepted.
//!
//! # Security
//!
//! TLS certificates can be loaded from PEM files or generated self-signed
//! for local development. Self-signed certificates log a warning and are
//! not suitable for production.

use std::{net::SocketAddr, sync::Arc};

use quinn::{Endpoint, SendStream, ServerConfig};
use roster_proto::ALPN_PROTOCOL;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::ServerError;

/// QUIC listener for the presence service.
pub struct QuicTransport {
    /// Quinn endpoint
    endpoint: Endpoint,
}

impl QuicTransport {
    /// Create and bind a new QUIC transport.
    ///
    /// With `cert_path` and `key_path` both present they are loaded as
    /// PEM; otherwise a self-signed certificate is generated for local
    /// development.
    pub fn bind(
        address: &str,
        cert_path: Option<&str>,
        key_path: Option<&str>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let server_config = match (cert_path, key_path) {
            (Some(cert), Some(key)) => tls_config_from_pem(cert, key)?,
            _ => {
                tracing::warn!("no TLS material supplied, generating self-signed certificate");
                self_signed_tls_config()?
            },
        };

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("QUIC transport bound to {}", addr);

        Ok(Self { endpoint })
    }

    /// Accept the next connection, completing its handshake.
    pub async fn accept(&self) -> Result<QuicConnection, ServerError> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| ServerError::Transport("endpoint closed".to_string()))?;

        let connection = incoming
            .await
            .map_err(|e| ServerError::Transport(format!("connection failed: {e}")))?;

        Ok(QuicConnection { connection })
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }
}

/// One client connection.
///
/// Clones are cheap and share the underlying QUIC connection.
#[derive(Clone)]
pub struct QuicConnection {
    connection: quinn::Connection,
}

impl QuicConnection {
    /// Open the server-to-client stream that carries presence updates.
    pub async fn open_uni(&self) -> Result<SendStream, ServerError> {
        self.connection
            .open_uni()
            .await
            .map_err(|e| ServerError::Transport(format!("open_uni failed: {e}")))
    }

    /// Resolves once the connection is closed, whether by the peer, a
    /// transport error, or an idle timeout.
    pub async fn closed(&self) -> quinn::ConnectionError {
        self.connection.closed().await
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection with an error code and reason.
    pub fn close(&self, error_code: quinn::VarInt, reason: &[u8]) {
        self.connection.close(error_code, reason);
    }
}

/// Load TLS configuration from PEM certificate and key files.
fn tls_config_from_pem(cert_path: &str, key_path: &str) -> Result<ServerConfig, ServerError> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| ServerError::Config(format!("failed to read cert '{cert_path}': {e}")))?;
    let key_pem = std::fs::read(key_path)
        .map_err(|e| ServerError::Config(format!("failed to read key '{key_path}': {e}")))?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Config(format!("no private key found in '{key_path}'")))?;

    quic_server_config(certs, key)
}

/// Generate a self-signed certificate for local development.
fn self_signed_tls_config() -> Result<ServerConfig, ServerError> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let cert_der = cert.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    quic_server_config(vec![cert_der], key.into())
}

/// Assemble the Quinn server config with ALPN from the TLS material.
fn quic_server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig, ServerError> {
    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
        .map_err(|e| ServerError::Config(format!("QUIC config error: {e}")))?;

    Ok(ServerConfig::with_crypto(Arc::new(crypto)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_with_self_signed_certificate() {
        let transport = QuicTransport::bind("127.0.0.1:0", None, None).expect("bind failed");

        let addr = transport.local_addr().expect("no local address");
        assert_ne!(addr.port(), 0, "should have an assigned port");
    }

    #[tokio::test]
    async fn rejects_invalid_bind_address() {
        let result = QuicTransport::bind("not:an:address", None, None);
        assert!(matches!(result, Err(ServerError::Config(_))));
    }
}
