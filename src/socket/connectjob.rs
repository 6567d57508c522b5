use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::proxy::{ProxySettings, ProxyType};
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::TlsConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

/// Upper bound for a proxy's CONNECT response head.
const MAX_TUNNEL_RESPONSE: usize = 8 * 1024;

/// Manages the connection process: DNS -> TCP -> (proxy tunnel) -> TLS.
/// Roughly equivalent to net::ConnectJob.
pub struct ConnectJob;

impl ConnectJob {
    /// Open a socket to `url`'s origin. `https` and `wss` get TLS.
    pub async fn connect(
        url: &Url,
        proxy: Option<&ProxySettings>,
    ) -> Result<BoxedSocket, NetError> {
        let target_host = Self::host_of(url)?;
        let target_port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            _ => return Err(NetError::UnknownUrlScheme),
        };

        let socket = match proxy {
            Some(p) => {
                let (phost, pport) = p.host_port().ok_or(NetError::InvalidUrl)?;
                let tcp = Self::tcp_connect(phost, pport).await?;

                let mut to_proxy = match p.proxy_type() {
                    ProxyType::Https => {
                        BoxedSocket::new(TlsConfig::default().connect(phost, tcp).await?)
                    }
                    ProxyType::Http => BoxedSocket::new(tcp),
                };

                Self::establish_tunnel(&mut to_proxy, &target_host, target_port, p).await?;
                tracing::debug!(proxy = %phost, target = %target_host, "proxy tunnel established");
                to_proxy
            }
            None => BoxedSocket::new(Self::tcp_connect(&target_host, target_port).await?),
        };

        // TLS always happens after any tunnel is established.
        if secure {
            let tls = TlsConfig::default().connect(&target_host, socket).await?;
            Ok(BoxedSocket::new(tls))
        } else {
            Ok(socket)
        }
    }

    /// Host without IPv6 brackets.
    fn host_of(url: &Url) -> Result<String, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
    }

    async fn tcp_connect(host: &str, port: u16) -> Result<TcpStream, NetError> {
        let addrs: Vec<_> = tokio::net::lookup_host((host, port))
            .await
            .dns_context(host)?
            .collect();

        if addrs.is_empty() {
            return Err(NetError::NameNotResolved);
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!(addr = %addr, error = %e, "TCP connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err::<TcpStream, _>(e).connection_context(host, port),
            None => Err(NetError::ConnectionFailed),
        }
    }

    /// Send `CONNECT host:port` and wait for a 2xx answer.
    async fn establish_tunnel<S>(
        stream: &mut S,
        host: &str,
        port: u16,
        proxy: &ProxySettings,
    ) -> Result<(), NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let authority = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };

        let mut connect_req = format!(
            "CONNECT {0} HTTP/1.1\r\nHost: {0}\r\nProxy-Connection: keep-alive\r\n",
            authority
        );
        if let Some(auth) = proxy.auth_header() {
            connect_req.push_str(&format!("Proxy-Authorization: {}\r\n", auth));
        }
        connect_req.push_str("\r\n");

        stream.write_all(connect_req.as_bytes()).await.tunnel_context()?;

        // Read byte-wise up to the end of the head so no tunnel payload is
        // consumed here.
        let mut head = Vec::with_capacity(256);
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            if head.len() >= MAX_TUNNEL_RESPONSE {
                return Err(NetError::TunnelConnectionFailed);
            }
            let n = stream.read(&mut byte).await.tunnel_context()?;
            if n == 0 {
                return Err(NetError::TunnelConnectionFailed);
            }
            head.push(byte[0]);
        }

        let status = Self::tunnel_status(&head).ok_or(NetError::TunnelConnectionFailed)?;
        if !(200..300).contains(&status) {
            tracing::warn!(status, target = %authority, "proxy refused tunnel");
            return Err(NetError::TunnelConnectionFailed);
        }

        Ok(())
    }

    /// Status code of an `HTTP/1.x NNN reason` line.
    fn tunnel_status(head: &[u8]) -> Option<u16> {
        let text = std::str::from_utf8(head).ok()?;
        let line = text.lines().next()?;
        let mut parts = line.split_whitespace();
        if !parts.next()?.starts_with("HTTP/1.") {
            return None;
        }
        parts.next()?.parse().ok()
    }
}
