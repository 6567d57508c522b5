use crate::base::neterror::NetError;
use crate::socket::connectjob::ConnectJob;
use crate::socket::proxy::ProxySettings;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::spawn;
use url::Url;

/// An HTTP/1.1 client connection ready to carry one request.
/// Equivalent to net::HttpStream.
pub struct HttpStream {
    sender: http1::SendRequest<Full<Bytes>>,
}

impl HttpStream {
    pub async fn send_request(
        &mut self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, NetError> {
        self.sender.send_request(req).await.map_err(|e| {
            tracing::debug!(error = %e, "request failed on connection");
            if e.is_incomplete_message() || e.is_closed() {
                NetError::ConnectionClosed
            } else if e.is_parse() {
                NetError::InvalidResponse
            } else {
                NetError::ConnectionReset
            }
        })
    }
}

/// Opens fresh connections: socket via [`ConnectJob`], then the HTTP/1.1
/// handshake with its connection driver spawned onto the runtime.
pub struct HttpStreamFactory;

impl HttpStreamFactory {
    pub async fn create_stream(
        url: &Url,
        proxy: Option<&ProxySettings>,
    ) -> Result<HttpStream, NetError> {
        let socket = ConnectJob::connect(url, proxy).await?;
        let io = TokioIo::new(socket);

        let (sender, conn) = http1::handshake(io).await.map_err(|e| {
            tracing::debug!(error = %e, "HTTP/1.1 handshake failed");
            NetError::ConnectionFailed
        })?;

        spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "HTTP connection closed with error");
            }
        });

        Ok(HttpStream { sender })
    }
}
