use crate::base::neterror::NetError;
use crate::http::streamfactory::{HttpStream, HttpStreamFactory};
use crate::socket::proxy::ProxySettings;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use url::Url;

/// Internal state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    CreateStream,
    SendRequest,
    ReadBody,
    Done,
}

/// Status, headers and the fully read body of one exchange.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A single request/response exchange over a fresh connection.
/// Redirects, cookies and deadlines are handled by the caller.
pub struct HttpNetworkTransaction {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    proxy: Option<ProxySettings>,
    state: State,
    stream: Option<HttpStream>,
    response: Option<Response<Incoming>>,
    result: Option<RawResponse>,
}

impl HttpNetworkTransaction {
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            method,
            url,
            headers,
            body,
            proxy: None,
            state: State::Idle,
            stream: None,
            response: None,
            result: None,
        }
    }

    pub fn set_proxy(&mut self, proxy: Option<ProxySettings>) {
        self.proxy = proxy;
    }

    /// Run the exchange to completion.
    pub async fn start(mut self) -> Result<RawResponse, NetError> {
        self.state = State::CreateStream;
        self.do_loop().await?;
        self.result.ok_or(NetError::EmptyResponse)
    }

    async fn do_loop(&mut self) -> Result<(), NetError> {
        loop {
            match self.state {
                State::Idle | State::Done => return Ok(()),
                State::CreateStream => {
                    self.stream =
                        Some(HttpStreamFactory::create_stream(&self.url, self.proxy.as_ref()).await?);
                    self.state = State::SendRequest;
                }
                State::SendRequest => {
                    let req = self.build_request()?;
                    let stream = self.stream.as_mut().ok_or(NetError::ConnectionClosed)?;
                    self.response = Some(stream.send_request(req).await?);
                    self.state = State::ReadBody;
                }
                State::ReadBody => {
                    let resp = self.response.take().ok_or(NetError::EmptyResponse)?;
                    let (parts, body) = resp.into_parts();
                    let collected = body.collect().await.map_err(|e| {
                        tracing::debug!(error = %e, "failed reading response body");
                        NetError::HttpBodyError
                    })?;
                    self.result = Some(RawResponse {
                        status: parts.status,
                        headers: parts.headers,
                        body: collected.to_bytes(),
                    });
                    self.stream = None;
                    self.state = State::Done;
                }
            }
        }
    }

    fn build_request(&mut self) -> Result<Request<Full<Bytes>>, NetError> {
        let mut headers = std::mem::take(&mut self.headers);

        if !headers.contains_key(http::header::HOST) {
            let host = self.url.host_str().ok_or(NetError::InvalidUrl)?;
            let value = match self.url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            headers.insert(
                http::header::HOST,
                HeaderValue::from_str(&value).map_err(|_| NetError::InvalidUrl)?,
            );
        }

        let body = self.body.take().unwrap_or_default();
        if !body.is_empty() {
            headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        // Origin-form target: connections go straight to the origin or
        // through a CONNECT tunnel.
        let target = match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        };

        let mut req = Request::builder()
            .method(self.method.clone())
            .uri(target)
            .body(Full::new(body))
            .map_err(|_| NetError::InvalidUrl)?;
        *req.headers_mut() = headers;
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_adds_host_and_length() {
        let url = Url::parse("http://example.com:8080/a/b?x=1").unwrap();
        let mut tx = HttpNetworkTransaction::new(
            Method::POST,
            url,
            HeaderMap::new(),
            Some(Bytes::from_static(b"hello")),
        );
        let req = tx.build_request().unwrap();

        assert_eq!(req.uri(), "/a/b?x=1");
        assert_eq!(req.headers()["host"], "example.com:8080");
        assert_eq!(req.headers()["content-length"], "5");
    }

    #[test]
    fn test_build_request_keeps_explicit_host() {
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::HOST, HeaderValue::from_static("other.example"));
        let mut tx = HttpNetworkTransaction::new(Method::GET, url, headers, None);
        let req = tx.build_request().unwrap();

        assert_eq!(req.headers()["host"], "other.example");
        assert!(req.headers().get("content-length").is_none());
    }
}
