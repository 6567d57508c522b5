//! Socket layer.
//!
//! - [`ConnectJob`](connectjob::ConnectJob): DNS, TCP, proxy tunnel, TLS
//! - [`ProxySettings`](proxy::ProxySettings): outbound proxy configuration
//! - [`TlsConfig`](tls::TlsConfig): BoringSSL client settings
//! - [`BoxedSocket`](stream::BoxedSocket): type-erased stream

pub mod connectjob;
pub mod proxy;
pub mod stream;
pub mod tls;
