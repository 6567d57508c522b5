use crate::cookies::canonicalcookie::{CanonicalCookie, Expiry};
use dashmap::DashMap;
use time::OffsetDateTime;
use url::{Host, Url};

/// Input accepted by [`CookieStore::set`]: a raw `Set-Cookie` style line or
/// an already structured cookie.
#[derive(Debug, Clone)]
pub enum CookieInput {
    Header(String),
    Cookie(CanonicalCookie),
}

impl From<&str> for CookieInput {
    fn from(line: &str) -> Self {
        CookieInput::Header(line.to_string())
    }
}

impl From<String> for CookieInput {
    fn from(line: String) -> Self {
        CookieInput::Header(line)
    }
}

impl From<CanonicalCookie> for CookieInput {
    fn from(cookie: CanonicalCookie) -> Self {
        CookieInput::Cookie(cookie)
    }
}

impl From<&CanonicalCookie> for CookieInput {
    fn from(cookie: &CanonicalCookie) -> Self {
        CookieInput::Cookie(cookie.clone())
    }
}

/// Domain-indexed cookie jar.
///
/// Cookies are keyed by the registrable domain of the URL they were set
/// for (the last two labels of the host, or the whole address for IP
/// literals) and by name, so there is at most one live cookie per
/// `(domain, name)`. Expired cookies are never returned; they are purged
/// when a later `get` or `set` touches their domain.
///
/// The map is a `DashMap`, so one store can be shared across tasks.
pub struct CookieStore {
    // Map<RegistrableDomain, cookies in insertion order>
    store: DashMap<String, Vec<CanonicalCookie>>,
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieStore")
            .field("domains", &self.store.len())
            .field("cookies", &self.len())
            .finish()
    }
}

impl CookieStore {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Registrable domain used as the storage key for `url`.
    pub fn registrable_domain(url: &Url) -> Option<String> {
        match url.host()? {
            Host::Domain(host) => {
                let host = host.trim_end_matches('.').to_ascii_lowercase();
                let labels: Vec<&str> = host.split('.').collect();
                if labels.len() >= 2 {
                    Some(labels[labels.len() - 2..].join("."))
                } else {
                    Some(host)
                }
            }
            Host::Ipv4(ip) => Some(ip.to_string()),
            Host::Ipv6(ip) => Some(ip.to_string()),
        }
    }

    /// Store one or more cookies for `url`'s registrable domain.
    ///
    /// Malformed entries (missing name or value, unparsable lines) are
    /// dropped. Returns how many cookies were written.
    pub fn set<I, C>(&self, cookies: I, url: &Url) -> usize
    where
        I: IntoIterator<Item = C>,
        C: Into<CookieInput>,
    {
        let Some(domain) = Self::registrable_domain(url) else {
            tracing::debug!(url = %url, "cookie set ignored: url has no host");
            return 0;
        };
        let now = OffsetDateTime::now_utc();

        let mut written = 0;
        {
            let mut entry = self.store.entry(domain.clone()).or_default();

            for input in cookies {
                let parsed = match input.into() {
                    CookieInput::Header(line) => Self::parse_line(&line, now),
                    CookieInput::Cookie(cookie) => Some(cookie),
                };

                let Some(mut cookie) = parsed.filter(CanonicalCookie::is_well_formed) else {
                    tracing::debug!(domain = %domain, "dropping malformed cookie");
                    continue;
                };

                cookie.domain = domain.clone();
                if cookie.path.is_empty() {
                    cookie.path = "/".to_string();
                }

                match entry.iter_mut().find(|c| c.name == cookie.name) {
                    Some(existing) => *existing = cookie,
                    None => entry.push(cookie),
                }
                written += 1;
            }

            entry.retain(|c| !c.is_expired(now));
        }

        self.store.remove_if(&domain, |_, cookies| cookies.is_empty());
        written
    }

    /// Parse a single `name=value; attr=val; ...` line.
    fn parse_line(line: &str, now: OffsetDateTime) -> Option<CanonicalCookie> {
        let parsed = match cookie::Cookie::parse(line.trim()) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "failed to parse cookie line");
                return None;
            }
        };

        // Max-Age past the representable range means the cookie never expires.
        let expires = if let Some(max_age) = parsed.max_age() {
            now.checked_add(max_age).map(Expiry::At).unwrap_or(Expiry::Never)
        } else {
            parsed
                .expires()
                .and_then(|e| e.datetime())
                .map(Expiry::At)
                .unwrap_or(Expiry::Never)
        };

        let path = match parsed.path() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => "/".to_string(),
        };

        Some(CanonicalCookie {
            name: parsed.name().trim().to_string(),
            value: parsed.value().trim().to_string(),
            domain: String::new(),
            path,
            expires,
        })
    }

    /// All live cookies whose storage domain is the host of `url` or a
    /// dot-suffix of it, most specific domain first, insertion order within
    /// a domain. Expired cookies met on the way are deleted.
    pub fn get(&self, url: &Url) -> Vec<CanonicalCookie> {
        let now = OffsetDateTime::now_utc();
        let mut result = Vec::new();

        for domain in Self::matching_domains(url) {
            let emptied = match self.store.get_mut(&domain) {
                Some(mut entry) => {
                    entry.retain(|c| !c.is_expired(now));
                    result.extend(entry.iter().cloned());
                    entry.is_empty()
                }
                None => false,
            };

            if emptied {
                self.store.remove_if(&domain, |_, cookies| cookies.is_empty());
            }
        }

        result
    }

    /// Host and every parent domain, e.g. `a.b.example.com`,
    /// `b.example.com`, `example.com`, `com`. IP literals only match
    /// themselves.
    fn matching_domains(url: &Url) -> Vec<String> {
        match url.host() {
            Some(Host::Domain(host)) => {
                let host = host.trim_end_matches('.').to_ascii_lowercase();
                let parts: Vec<&str> = host.split('.').collect();
                (0..parts.len()).map(|i| parts[i..].join(".")).collect()
            }
            Some(Host::Ipv4(ip)) => vec![ip.to_string()],
            Some(Host::Ipv6(ip)) => vec![ip.to_string()],
            None => Vec::new(),
        }
    }

    /// `Cookie` header value for `url`, or `None` when no cookie applies.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.get(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(CanonicalCookie::pair)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Remove every cookie of `url`'s registrable domain, or the whole
    /// store when `url` is `None`.
    pub fn clear(&self, url: Option<&Url>) {
        match url {
            None => self.store.clear(),
            Some(url) => {
                if let Some(domain) = Self::registrable_domain(url) {
                    self.store.remove(&domain);
                }
            }
        }
    }

    /// Load persisted session cookies, each under `http://<cookie.domain>`.
    pub fn load_app_state(&self, cookies: &[CanonicalCookie]) -> usize {
        let mut loaded = 0;
        for cookie in cookies {
            let host = cookie.domain.trim_start_matches('.');
            match Url::parse(&format!("http://{}/", host)) {
                Ok(url) => loaded += self.set([cookie], &url),
                Err(_) => {
                    tracing::warn!(domain = %cookie.domain, name = %cookie.name, "skipping cookie with invalid domain");
                }
            }
        }
        loaded
    }

    /// Total stored cookies, including ones that expired but were not yet
    /// evicted.
    pub fn len(&self) -> usize {
        self.store.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored cookie.
    pub fn iter_all(&self) -> impl Iterator<Item = CanonicalCookie> + '_ {
        self.store.iter().flat_map(|entry| entry.value().clone())
    }
}
