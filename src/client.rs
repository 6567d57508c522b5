//! The HTTP transport.
//!
//! A [`Client`] is nothing but a [`RequestConfig`] layer. Every call overlays
//! its own config on the client's, resolves the URL, applies the cookie jar,
//! encodes the body and runs the exchange, following redirects as
//! configured.
//!
//! # Example
//!
//! ```rust,ignore
//! use syncnet::{Client, RequestConfig};
//!
//! let client = Client::new().defaults(&RequestConfig::new().base_url("https://example.com"));
//! let resp = client.get("/api", RequestConfig::new()).await?;
//! println!("{} {:?}", resp.status(), resp.body());
//! ```

use crate::base::neterror::NetError;
use crate::cookies::CookieStore;
use crate::http::config::{Credentials, RedirectPolicy, RequestConfig, ResponseType};
use crate::http::encode::encode_body;
use crate::http::transaction::HttpNetworkTransaction;
use crate::http::{Response, ResponseBody};
use http::{Method, StatusCode};
use std::sync::Arc;
use url::Url;

/// Chromium default.
const MAX_REDIRECTS: usize = 20;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Headers a desktop Chrome sends on a top-level navigation.
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Priority", "u=0, i"),
    (
        "Sec-Ch-Ua",
        "Chromium;v=134, Not:A-Brand;v=24, Google Chrome;v=134",
    ),
    (
        "Sec-Ch-Ua-Full-Version-List",
        "Chromium;v=134.0.6998.119, Not:A-Brand;v=24.0.0.0, Google Chrome;v=134.0.6998.119",
    ),
    ("Sec-Ch-Ua-Mobile", "?0"),
    ("Sec-Ch-Ua-Model", ""),
    ("Sec-Ch-Ua-Platform", "Windows"),
    ("Sec-Ch-Ua-Platform-Version", "19.0.0"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
    ("Upgrade-Insecure-Requests", "1"),
    ("User-Agent", DEFAULT_USER_AGENT),
];

/// HTTP transport bound to one configuration layer.
#[derive(Debug, Clone)]
pub struct Client {
    config: RequestConfig,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// A client carrying the browser-like process defaults.
    pub fn new() -> Self {
        Self::create_clone(Self::default_config())
    }

    /// The process-wide defaults: GET, no deadline, JSON responses,
    /// redirects followed, credentials included, Chrome headers.
    pub fn default_config() -> RequestConfig {
        let mut config = RequestConfig::new()
            .method(Method::GET)
            .timeout(std::time::Duration::ZERO)
            .response_type(ResponseType::Json)
            .redirect(RedirectPolicy::Follow)
            .credentials(Credentials::Include);
        for (name, value) in DEFAULT_HEADERS {
            config.headers.insert(name, value);
        }
        config
    }

    /// A client configured with exactly `config`. Nothing is inherited.
    pub fn create_clone(config: RequestConfig) -> Self {
        Self { config }
    }

    /// A new client whose configuration is this one overlaid with
    /// `partial`. `self` is left untouched.
    pub fn defaults(&self, partial: &RequestConfig) -> Client {
        Self::create_clone(self.config.overlay(partial))
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// The cookie jar attached to this client's configuration, if any.
    pub fn jar(&self) -> Option<&Arc<CookieStore>> {
        self.config.jar.as_ref()
    }

    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<Response, NetError> {
        self.request(RequestConfig::new().url(url).overlay(&config))
            .await
    }

    /// POST: the method is forced regardless of `config`.
    pub async fn post(&self, url: &str, config: RequestConfig) -> Result<Response, NetError> {
        self.request(
            RequestConfig::new()
                .url(url)
                .overlay(&config)
                .method(Method::POST),
        )
        .await
    }

    /// Issue a request. A deadline, when configured, covers the whole call
    /// including redirects.
    pub async fn request(&self, config: RequestConfig) -> Result<Response, NetError> {
        let merged = self.config.overlay(&config);

        match merged.effective_timeout() {
            Some(deadline) => tokio::time::timeout(deadline, Self::execute(merged))
                .await
                .map_err(|_| {
                    let timeout_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(timeout_ms, "request timed out");
                    NetError::TimedOut { timeout_ms }
                })?,
            None => Self::execute(merged).await,
        }
    }

    async fn execute(merged: RequestConfig) -> Result<Response, NetError> {
        let mut url = resolve_url(&merged)?;
        let mut method = merged.method.clone().unwrap_or(Method::GET);
        let mut headers = merged.headers.clone();
        let mut payload = match &merged.body {
            Some(body) => encode_body(body, &mut headers)?,
            None => None,
        };

        let jar = match merged.credentials.unwrap_or_default() {
            Credentials::Include => merged.jar.clone(),
            Credentials::Omit => None,
        };
        let policy = merged.redirect.unwrap_or_default();
        let mut redirects_left = MAX_REDIRECTS;

        loop {
            let mut hop_headers = headers.clone();
            if let Some(cookie) = jar.as_ref().and_then(|j| j.cookie_header(&url)) {
                hop_headers.insert("Cookie", &cookie);
            }

            tracing::debug!(method = %method, url = %url, "sending request");
            let mut transaction = HttpNetworkTransaction::new(
                method.clone(),
                url.clone(),
                hop_headers.to_header_map()?,
                payload.clone(),
            );
            transaction.set_proxy(merged.proxy.clone());
            let raw = transaction.start().await?;
            tracing::debug!(status = raw.status.as_u16(), url = %url, "response received");

            if let Some(jar) = &jar {
                let set_cookies: Vec<String> = raw
                    .headers
                    .get_all(http::header::SET_COOKIE)
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_owned)
                    .collect();
                if !set_cookies.is_empty() {
                    jar.set(set_cookies, &url);
                }
            }

            let location = raw
                .status
                .is_redirection()
                .then(|| raw.headers.get(http::header::LOCATION))
                .flatten()
                .and_then(|v| v.to_str().ok());

            if let Some(location) = location {
                match policy {
                    RedirectPolicy::Manual => {}
                    RedirectPolicy::Error => return Err(NetError::InvalidRedirect),
                    RedirectPolicy::Follow => {
                        if redirects_left == 0 {
                            return Err(NetError::TooManyRedirects);
                        }
                        redirects_left -= 1;

                        let next = url.join(location).map_err(|_| NetError::InvalidRedirect)?;
                        if rewrites_to_get(raw.status, &method) {
                            method = Method::GET;
                            payload = None;
                            headers.remove("Content-Type");
                        }
                        tracing::debug!(from = %url, to = %next, "following redirect");
                        url = next;
                        continue;
                    }
                }
            }

            let body = ResponseBody::decode(
                merged.response_type.unwrap_or_default(),
                &raw.headers,
                raw.body,
            );
            return Ok(Response::new(raw.status, raw.headers, body, merged, url));
        }
    }
}

/// 303 turns anything but HEAD into GET; 301 and 302 turn POST into GET.
fn rewrites_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => *method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::POST,
        _ => false,
    }
}

fn is_absolute(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Join `base_url` and `url` with exactly one slash unless `url` is already
/// absolute, then apply `query` (later keys replace existing ones).
pub fn resolve_url(config: &RequestConfig) -> Result<Url, NetError> {
    let raw = config.url.as_deref().unwrap_or_default();
    let joined = match config.base_url.as_deref() {
        Some(base) if !base.is_empty() && !is_absolute(raw) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            raw.trim_start_matches('/')
        ),
        _ => raw.to_string(),
    };

    let mut url = Url::parse(&joined).map_err(|_| {
        tracing::debug!(url = %joined, "cannot parse request url");
        NetError::InvalidUrl
    })?;

    if !config.query.is_empty() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        for (key, value) in config.query.iter() {
            match pairs.iter().position(|(k, _)| k == key) {
                Some(first) => {
                    pairs[first].1 = value.to_string();
                    let mut index = 0;
                    pairs.retain(|(k, _)| {
                        let keep = index <= first || k != key;
                        index += 1;
                        keep
                    });
                }
                None => pairs.push((key.to_string(), value.to_string())),
            }
        }
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Ok(url)
}
