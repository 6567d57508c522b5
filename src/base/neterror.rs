use thiserror::Error;

/// Transport-level error codes.
///
/// Codes follow Chromium's `net_error_list.h` numbering where a matching
/// entry exists; codes specific to this crate start at -900.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {reason}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Name {domain} not resolved: {reason}")]
    NameNotResolvedFor { domain: String, reason: String },
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Tunnel connection failed")]
    TunnelConnectionFailed,
    #[error("WebSocket protocol error")]
    WsProtocolError,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,

    // Custom codes (-900 and below)
    #[error("Request timed out after {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },
    #[error("Invalid request body: {reason}")]
    InvalidRequestBody { reason: String },
    #[error("Invalid header: {name}")]
    InvalidHeader { name: String },
    #[error("Failed to read HTTP body")]
    HttpBodyError,
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionFailed | NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::TunnelConnectionFailed => -111,
            NetError::WsProtocolError => -145,

            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidRedirect => -303,
            NetError::TooManyRedirects => -310,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,

            NetError::TimedOut { .. } => -910,
            NetError::InvalidRequestBody { .. } => -911,
            NetError::InvalidHeader { .. } => -912,
            NetError::HttpBodyError => -913,
        }
    }

    /// The request was aborted because its deadline passed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::TimedOut { .. })
    }

    /// The failure happened below HTTP: DNS, TCP, proxy or TLS.
    pub fn is_transport(&self) -> bool {
        matches!(self.as_i32(), -199..=-100)
    }

    pub fn connection_failed_to(host: &str, port: u16, err: impl std::fmt::Display) -> Self {
        NetError::ConnectionFailedTo {
            host: host.to_string(),
            port,
            reason: err.to_string(),
        }
    }

    pub fn dns_failed(domain: &str, err: impl std::fmt::Display) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn invalid_body(reason: impl Into<String>) -> Self {
        NetError::InvalidRequestBody {
            reason: reason.into(),
        }
    }
}
