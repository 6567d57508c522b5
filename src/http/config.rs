//! Layered request configuration.
//!
//! A [`RequestConfig`] is a partial description of a request. Layers combine
//! with [`RequestConfig::overlay`]: set fields of the upper layer win, unset
//! ones fall through, and nested maps (headers, query, structured bodies)
//! merge key by key instead of being replaced.

use crate::cookies::CookieStore;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::RequestBody;
use crate::socket::proxy::ProxySettings;
use http::Method;
use std::sync::Arc;
use std::time::Duration;

/// How the response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Parse as JSON, falling back to the raw text.
    #[default]
    Json,
    Text,
    /// Raw bytes (blob / arraybuffer).
    Binary,
    /// URL-encoded or multipart fields.
    FormData,
}

/// What to do with 3xx responses carrying a `Location`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    #[default]
    Follow,
    /// Return the redirect response itself.
    Manual,
    /// Fail with `NetError::InvalidRedirect`.
    Error,
}

/// Whether the cookie jar takes part in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    Include,
    Omit,
}

/// Ordered query parameters. Setting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Later keys win.
    pub fn overlay(&self, other: &QueryParams) -> QueryParams {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged.set(k, v);
        }
        merged
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// A (possibly partial) request description.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub method: Option<Method>,
    pub url: Option<String>,
    pub base_url: Option<String>,
    pub headers: OrderedHeaderMap,
    pub query: QueryParams,
    pub body: Option<RequestBody>,
    /// `Duration::ZERO` disables the deadline.
    pub timeout: Option<Duration>,
    pub proxy: Option<ProxySettings>,
    pub response_type: Option<ResponseType>,
    /// Attached only when a layer sets it explicitly.
    pub jar: Option<Arc<CookieStore>>,
    pub credentials: Option<Credentials>,
    pub redirect: Option<RedirectPolicy>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.set(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn jar(mut self, jar: Arc<CookieStore>) -> Self {
        self.jar = Some(jar);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn redirect(mut self, redirect: RedirectPolicy) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Combine two layers into a new one; neither input is modified.
    pub fn overlay(&self, other: &RequestConfig) -> RequestConfig {
        RequestConfig {
            method: other.method.clone().or_else(|| self.method.clone()),
            url: other.url.clone().or_else(|| self.url.clone()),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            headers: self.headers.overlay(&other.headers),
            query: self.query.overlay(&other.query),
            body: match (&self.body, &other.body) {
                (Some(base), Some(over)) => Some(base.overlay(over)),
                (base, over) => over.clone().or_else(|| base.clone()),
            },
            timeout: other.timeout.or(self.timeout),
            proxy: other.proxy.clone().or_else(|| self.proxy.clone()),
            response_type: other.response_type.or(self.response_type),
            jar: other.jar.clone().or_else(|| self.jar.clone()),
            credentials: other.credentials.or(self.credentials),
            redirect: other.redirect.or(self.redirect),
        }
    }

    /// Deadline in effect, `None` when disabled.
    pub fn effective_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|t| !t.is_zero())
    }
}
