use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

/// A header list that preserves insertion order and matches names
/// case-insensitively.
///
/// Names and values are validated only when the list is turned into a
/// [`HeaderMap`], so configuration layers can be built without fallible
/// setters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedHeaderMap {
    headers: Vec<(String, String)>,
}

impl OrderedHeaderMap {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Update in place if a header with the same name exists, else append.
    /// The most recently supplied spelling of the name is kept.
    pub fn insert(&mut self, name: &str, value: &str) {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            *entry = (name.to_string(), value.to_string());
        } else {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Key-by-key merge: every header of `other` overrides the same-named
    /// header here, the rest are kept.
    pub fn overlay(&self, other: &OrderedHeaderMap) -> OrderedHeaderMap {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.insert(name, value);
        }
        merged
    }

    /// Validate and convert into an [`http::HeaderMap`]. Insertion order is
    /// kept.
    pub fn to_header_map(&self) -> Result<HeaderMap, NetError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| NetError::InvalidHeader {
                    name: name.clone(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader {
                    name: name.clone(),
                })?;
            map.append(header_name, header_value);
        }
        Ok(map)
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for OrderedHeaderMap {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut map = OrderedHeaderMap::new();
        for (name, value) in iter {
            map.insert(&name.into(), &value.into());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_get() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("ACCEPT", "text/html");
        assert_eq!(headers.get("accept"), Some("text/html"));
        assert!(headers.contains("Accept"));
    }

    #[test]
    fn test_update_existing_header() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("X-Custom", "first");
        headers.insert("Accept", "*/*");
        headers.insert("x-custom", "second");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("X-Custom"), Some("second"));
        // Position of the original entry is kept.
        assert_eq!(headers.iter().next().map(|(n, _)| n), Some("x-custom"));
    }

    #[test]
    fn test_remove() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("Content-Type", "application/json");
        headers.remove("content-type");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_overlay_merges_key_by_key() {
        let base: OrderedHeaderMap = [("Y", "2")].into_iter().collect();
        let over: OrderedHeaderMap = [("X", "1")].into_iter().collect();

        let merged = base.overlay(&over);
        assert_eq!(merged.get("X"), Some("1"));
        assert_eq!(merged.get("Y"), Some("2"));
        // Neither input changed.
        assert_eq!(base.len(), 1);
        assert_eq!(over.len(), 1);
    }

    #[test]
    fn test_to_header_map_preserves_order() {
        let headers: OrderedHeaderMap = [("Sec-Ch-Ua-Model", ""), ("User-Agent", "ua")]
            .into_iter()
            .collect();
        let map = headers.to_header_map().unwrap();
        let names: Vec<_> = map.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["sec-ch-ua-model", "user-agent"]);
    }

    #[test]
    fn test_invalid_header_reported_at_conversion() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("Bad Name", "v");
        assert_eq!(
            headers.to_header_map().unwrap_err(),
            NetError::InvalidHeader {
                name: "Bad Name".into()
            }
        );
    }
}
