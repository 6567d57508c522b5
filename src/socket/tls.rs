use crate::base::neterror::NetError;
use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_boring::SslStream;

/// TLS client configuration.
///
/// Defaults follow Chrome's cipher preferences so the handshake looks like a
/// browser's. Only `http/1.1` is offered over ALPN: both the HTTP
/// transaction and the WebSocket upgrade speak HTTP/1.1.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    pub cipher_list: String,
    pub alpn_protos: Vec<String>,
    pub verify_peer: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::default_chrome()
    }
}

impl TlsConfig {
    /// Create a TLS configuration matching Chrome's defaults.
    pub fn default_chrome() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            // TLS 1.3 suites are fixed by BoringSSL; this list covers TLS 1.2.
            cipher_list: "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
                ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
                ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
                ECDHE-RSA-AES128-SHA:ECDHE-RSA-AES256-SHA:\
                AES128-GCM-SHA256:AES256-GCM-SHA384:AES128-SHA:AES256-SHA"
                .to_string(),
            alpn_protos: vec!["http/1.1".to_string()],
            verify_peer: true,
        }
    }

    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(min) = self.min_version {
            builder
                .set_min_proto_version(Some(min))
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = self.max_version {
            builder
                .set_max_proto_version(Some(max))
                .map_err(|_| NetError::SslProtocolError)?;
        }

        builder
            .set_cipher_list(&self.cipher_list)
            .map_err(|_| NetError::SslProtocolError)?;

        if !self.alpn_protos.is_empty() {
            builder
                .set_alpn_protos(&Self::alpn_wire(&self.alpn_protos)?)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        builder.set_verify(if self.verify_peer {
            SslVerifyMode::PEER
        } else {
            SslVerifyMode::NONE
        });

        Ok(())
    }

    /// Length-prefixed ALPN wire format, e.g. `\x08http/1.1`.
    fn alpn_wire(protos: &[String]) -> Result<Vec<u8>, NetError> {
        let mut wire = Vec::new();
        for proto in protos {
            let len = u8::try_from(proto.len()).map_err(|_| NetError::SslProtocolError)?;
            wire.push(len);
            wire.extend_from_slice(proto.as_bytes());
        }
        Ok(wire)
    }

    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.parse::<std::net::IpAddr>().is_err()
    }

    /// Run a client handshake for `host` over an established stream.
    pub async fn connect<S>(&self, host: &str, stream: S) -> Result<SslStream<S>, NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin + std::fmt::Debug,
    {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
        self.apply_to_builder(&mut builder)?;

        let mut config = builder
            .build()
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        if !Self::should_set_sni(host) {
            config.set_use_server_name_indication(false);
        }

        tokio_boring::connect(config, host, stream)
            .await
            .map_err(|e| {
                tracing::warn!(host = %host, error = ?e, "TLS handshake failed");
                NetError::SslProtocolError
            })
    }
}
