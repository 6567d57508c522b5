//! WebSocket connection over the crate's own socket stack.
//!
//! The TCP/proxy/TLS leg is made by [`ConnectJob`], then tungstenite runs the
//! upgrade on top of it, so proxies and BoringSSL apply to WebSockets the
//! same way they do to plain requests.

use crate::base::neterror::NetError;
use crate::socket::connectjob::ConnectJob;
use crate::socket::proxy::ProxySettings;
use crate::socket::stream::BoxedSocket;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{tungstenite, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<BoxedSocket>;

/// WebSocket connection carrying binary frames.
///
/// Send and receive halves are locked independently, so one task can wait
/// in [`recv`](Self::recv) while another sends.
pub struct WebSocket {
    sink: Arc<Mutex<SplitSink<WsStream, tungstenite::Message>>>,
    stream: Arc<Mutex<SplitStream<WsStream>>>,
    url: Url,
}

impl WebSocket {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), NetError> {
        let msg = tungstenite::Message::Binary(data.into().to_vec());
        let mut sink = self.sink.lock().await;
        sink.send(msg).await.map_err(|e| {
            tracing::debug!(error = %e, "WebSocket send error");
            NetError::ConnectionClosed
        })
    }

    /// Next data frame. Text frames are returned as their UTF-8 bytes;
    /// control frames are handled internally. `None` once the peer closed.
    pub async fn recv(&self) -> Result<Option<Bytes>, NetError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(tungstenite::Message::Binary(b))) => return Ok(Some(Bytes::from(b))),
                Some(Ok(tungstenite::Message::Text(s))) => return Ok(Some(Bytes::from(s))),
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    tracing::debug!(frame = ?frame, "WebSocket closed by peer");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket recv error");
                    return Err(NetError::ConnectionClosed);
                }
                None => return Ok(None),
            }
        }
    }

    /// Send a close frame. Errors are ignored; the connection is going away
    /// either way.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "WebSocket close error");
        }
    }
}

/// WebSocket connection builder.
#[derive(Debug, Clone, Default)]
pub struct WebSocketBuilder {
    url: Option<Url>,
    headers: Vec<(String, String)>,
    proxy: Option<ProxySettings>,
}

impl WebSocketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the URL to connect to. Only `ws` and `wss` are accepted.
    pub fn url(mut self, url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(NetError::UnknownUrlScheme);
        }
        self.url = Some(url);
        Ok(self)
    }

    /// Add a handshake header. Replaces a header of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn proxy(mut self, proxy: Option<ProxySettings>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn get_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn is_secure(&self) -> bool {
        self.url.as_ref().is_some_and(|u| u.scheme() == "wss")
    }

    fn handshake_request(&self, url: &Url) -> Result<http::Request<()>, NetError> {
        let mut request = url.as_str().into_client_request().map_err(|e| {
            tracing::debug!(error = %e, "invalid WebSocket request");
            NetError::InvalidUrl
        })?;
        for (name, value) in &self.headers {
            let header_name = http::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| NetError::InvalidHeader { name: name.clone() })?;
            let header_value = http::header::HeaderValue::from_str(value)
                .map_err(|_| NetError::InvalidHeader { name: name.clone() })?;
            request.headers_mut().insert(header_name, header_value);
        }
        Ok(request)
    }

    /// Open the socket and run the upgrade handshake.
    pub async fn connect(self) -> Result<WebSocket, NetError> {
        let url = self.url.clone().ok_or(NetError::InvalidUrl)?;
        let request = self.handshake_request(&url)?;

        let socket = ConnectJob::connect(&url, self.proxy.as_ref()).await?;
        let (ws_stream, response) = tokio_tungstenite::client_async(request, socket)
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "WebSocket handshake failed");
                NetError::WsProtocolError
            })?;
        tracing::debug!(url = %url, status = response.status().as_u16(), "WebSocket connected");

        let (sink, stream) = ws_stream.split();
        Ok(WebSocket {
            sink: Arc::new(Mutex::new(sink)),
            stream: Arc::new(Mutex::new(stream)),
            url,
        })
    }
}
