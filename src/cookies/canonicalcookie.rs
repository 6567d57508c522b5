use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

/// When a cookie stops being visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Session-style cookie that never expires on its own.
    #[default]
    Never,
    /// Absolute expiry instant.
    At(OffsetDateTime),
}

impl Expiry {
    /// Build from epoch milliseconds, the unit used by persisted app state.
    pub fn from_unix_millis(ms: i64) -> Self {
        let nanos = i128::from(ms) * 1_000_000;
        match OffsetDateTime::from_unix_timestamp_nanos(nanos) {
            Ok(t) => Expiry::At(t),
            Err(_) if ms < 0 => Expiry::At(OffsetDateTime::UNIX_EPOCH),
            Err(_) => Expiry::Never,
        }
    }

    pub fn unix_millis(&self) -> Option<i64> {
        match self {
            Expiry::Never => None,
            Expiry::At(t) => i64::try_from(t.unix_timestamp_nanos() / 1_000_000).ok(),
        }
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.unix_millis() {
            Some(ms) => serializer.serialize_i64(ms),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Expiry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Persisted state written by other tools may carry fractional millis.
        let ms: Option<f64> = Option::deserialize(deserializer)?;
        Ok(match ms {
            Some(ms) if ms.is_finite() => Expiry::from_unix_millis(ms as i64),
            _ => Expiry::Never,
        })
    }
}

/// A stored cookie.
///
/// `domain` is the registrable domain the cookie is stored under, which is
/// also the unit used for lookups and lazy eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Expiry,
}

fn default_path() -> String {
    "/".to_string()
}

impl CanonicalCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: default_path(),
            expires: Expiry::Never,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn expires_at(mut self, when: OffsetDateTime) -> Self {
        self.expires = Expiry::At(when);
        self
    }

    /// Expired means `expires <= now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        match self.expires {
            Expiry::At(t) => t <= now,
            Expiry::Never => false,
        }
    }

    /// Both name and value must be present for a cookie to be stored.
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty() && !self.value.trim().is_empty()
    }

    /// `name=value` pair as sent in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = OffsetDateTime::now_utc();
        let cookie = CanonicalCookie::new("a", "1").expires_at(now);
        assert!(cookie.is_expired(now));
        assert!(!CanonicalCookie::new("a", "1").is_expired(now));
    }

    #[test]
    fn test_app_state_json_shape() {
        let cookie = CanonicalCookie::new("c_user", "42")
            .with_domain("facebook.com")
            .expires_at(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap());
        let json = serde_json::to_value(&cookie).unwrap();
        assert_eq!(json["expires"], serde_json::json!(1_700_000_000_000i64));
        assert_eq!(json["path"], "/");

        let session = serde_json::to_value(CanonicalCookie::new("xs", "v")).unwrap();
        assert!(session["expires"].is_null());
    }

    #[test]
    fn test_deserialize_missing_fields() {
        let cookie: CanonicalCookie =
            serde_json::from_str(r#"{"name":"sb","value":"x","domain":".facebook.com"}"#).unwrap();
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.expires, Expiry::Never);
    }

    #[test]
    fn test_well_formed() {
        assert!(CanonicalCookie::new("a", "b").is_well_formed());
        assert!(!CanonicalCookie::new("", "b").is_well_formed());
        assert!(!CanonicalCookie::new("a", "").is_well_formed());
    }
}
