//! Cookie management.
//!
//! - **Storage**: domain-indexed, expiry-aware jar ([`CookieStore`](store::CookieStore))
//! - **Cookie type**: [`CanonicalCookie`](canonicalcookie::CanonicalCookie)
//! - **Persistence**: save/load session app state as JSON ([`persistence`])
//!
//! # Lookup model
//!
//! Cookies are stored under the *registrable domain* of the URL that set
//! them (the last two host labels). A lookup for `a.b.example.com` returns
//! everything stored under `example.com`, and under any other stored domain
//! that is a dot-suffix of the host. There is no background eviction timer:
//! expired cookies disappear on the next `get`/`set` touching their domain.
//!
//! ```rust
//! use syncnet::cookies::store::CookieStore;
//! use url::Url;
//!
//! let jar = CookieStore::new();
//! let url = Url::parse("https://example.com/").unwrap();
//! jar.set(["sid=abc; Path=/"], &url);
//! assert_eq!(jar.cookie_header(&url).as_deref(), Some("sid=abc"));
//! ```

pub mod canonicalcookie;
pub mod persistence;
pub mod store;

pub use canonicalcookie::{CanonicalCookie, Expiry};
pub use store::{CookieInput, CookieStore};
