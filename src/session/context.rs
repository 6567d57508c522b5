use crate::base::neterror::NetError;
use crate::client::Client;
use crate::cookies::{CanonicalCookie, CookieStore};
use crate::http::encode::value_text;
use crate::http::{Field, Fields, RequestBody, RequestConfig, Response};
use crate::socket::proxy::ProxySettings;
use crate::sync::{ListenerConfig, SyncListener};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// The two origins whose cookies make up a persisted session.
pub const APP_STATE_ORIGINS: [&str; 2] = ["https://facebook.com/", "https://messenger.com/"];

/// Marker preceding the chat endpoint in the bootstrap page.
const ENDPOINT_MARKER: &str = "appID:219994525426954,endpoint:\"";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A session needs a user id")]
    MissingUserId,
    #[error("No access token was obtained for this session")]
    TokenUnavailable,
}

/// An authenticated session: the cookie jar plus the identifiers the login
/// step produced, and a transport derived for this session.
///
/// Immutable once built; only the jar changes, through the requests made
/// with it.
#[derive(Debug)]
pub struct SessionContext {
    jar: Arc<CookieStore>,
    user_id: String,
    token: Option<String>,
    region: Option<String>,
    proxy: Option<ProxySettings>,
    params: Fields,
    client: Client,
}

impl SessionContext {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn jar(&self) -> &Arc<CookieStore> {
        &self.jar
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn token(&self) -> Result<&str, SessionError> {
        self.token.as_deref().ok_or(SessionError::TokenUnavailable)
    }

    /// Region hint for the chat endpoint, uppercase.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn proxy(&self) -> Option<&ProxySettings> {
        self.proxy.as_ref()
    }

    /// Session-constant request fields.
    pub fn params(&self) -> &Fields {
        &self.params
    }

    /// The session-scoped transport.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// POST as `multipart/form-data` with the session fields filled into
    /// both body and query. Fields the caller sets win.
    pub async fn post(&self, url: &str, config: RequestConfig) -> Result<Response, NetError> {
        let mut config = config;
        config.body = Some(match config.body.take() {
            None | Some(RequestBody::Empty) => RequestBody::Object(self.params.clone()),
            Some(RequestBody::Object(fields)) => {
                RequestBody::Object(fields.merge_missing(&self.params))
            }
            Some(other) => other,
        });
        self.fill_query(&mut config);
        config.headers.insert("Content-Type", "multipart/form-data");

        self.client.post(url, config).await
    }

    /// GET with the session fields filled into the query.
    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<Response, NetError> {
        let mut config = config;
        self.fill_query(&mut config);
        self.client.get(url, config).await
    }

    fn fill_query(&self, config: &mut RequestConfig) {
        for (name, field) in self.params.iter() {
            if config.query.contains(name) {
                continue;
            }
            if let Field::Value(value) = field {
                config.query.set(name, value_text(value));
            }
        }
    }

    /// Cookies of the session's two origins, `facebook.com` first. This is
    /// the persisted-session format read back by
    /// [`SessionBuilder::app_state`].
    pub fn app_state(&self) -> Vec<CanonicalCookie> {
        APP_STATE_ORIGINS
            .iter()
            .filter_map(|origin| Url::parse(origin).ok())
            .flat_map(|url| self.jar.get(&url))
            .collect()
    }

    /// Region hint from the page the login step fetched, e.g.
    /// `endpoint:"wss:\/\/edge-chat.messenger.com\/chat?region=prn"` gives
    /// `PRN`.
    pub fn region_from_page(body: &str) -> Option<String> {
        let start = body.find(ENDPOINT_MARKER)? + ENDPOINT_MARKER.len();
        let rest = &body[start..];
        let endpoint = &rest[..rest.find('"')?];
        let url = Url::parse(&endpoint.replace("\\/", "/")).ok()?;
        let region = url
            .query_pairs()
            .find(|(k, _)| k == "region")
            .map(|(_, v)| v.to_uppercase());
        region
    }

    /// A sync listener bound to this session.
    pub fn listener(&self, config: ListenerConfig) -> SyncListener<'_> {
        SyncListener::new(self, config)
    }
}

/// Builds a [`SessionContext`] from what the login step produced.
#[derive(Debug, Default)]
pub struct SessionBuilder {
    jar: Option<Arc<CookieStore>>,
    user_id: Option<String>,
    token: Option<String>,
    region: Option<String>,
    proxy: Option<ProxySettings>,
    params: Fields,
    client: Option<Client>,
    app_state: Vec<CanonicalCookie>,
}

impl SessionBuilder {
    pub fn jar(mut self, jar: Arc<CookieStore>) -> Self {
        self.jar = Some(jar);
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into().to_uppercase());
        self
    }

    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn params(mut self, params: Fields) -> Self {
        self.params = params;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Base transport the session transport is derived from. Defaults to
    /// [`Client::new`]. The given client is not modified.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Cookies to load into the jar, as produced by
    /// [`SessionContext::app_state`].
    pub fn app_state(mut self, cookies: Vec<CanonicalCookie>) -> Self {
        self.app_state = cookies;
        self
    }

    pub fn build(self) -> Result<SessionContext, SessionError> {
        let user_id = self
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingUserId)?;
        let jar = self.jar.unwrap_or_default();
        if !self.app_state.is_empty() {
            let loaded = jar.load_app_state(&self.app_state);
            tracing::debug!(loaded, "session cookies restored");
        }

        let mut layer = RequestConfig::new().jar(jar.clone());
        if let Some(proxy) = &self.proxy {
            layer = layer.proxy(proxy.clone());
        }
        let client = self.client.unwrap_or_default().defaults(&layer);

        Ok(SessionContext {
            jar,
            user_id,
            token: self.token,
            region: self.region,
            proxy: self.proxy,
            params: self.params,
            client,
        })
    }
}
