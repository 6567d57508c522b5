//! Normalized HTTP response.

use crate::http::config::RequestConfig;
use crate::http::ResponseBody;
use http::{HeaderMap, StatusCode};
use url::Url;

/// A completed response with its body already decoded.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    config: RequestConfig,
    url: Url,
}

impl Response {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: ResponseBody,
        config: RequestConfig,
        url: Url,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            config,
            url,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// The merged configuration the request was issued with.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// URL of the final hop, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }
}
