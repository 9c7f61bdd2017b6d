use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::str::FromStr;

/// A request header map with one lower-case key per logical header.
///
/// Insertion order is preserved; inserting an existing name (in any casing)
/// replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedHeaderMap {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl OrderedHeaderMap {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Build a map from arbitrary pairs, silently skipping any pair that is
    /// not a valid header. Later pairs win over earlier ones.
    pub fn from_pairs_lossy<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            if map.insert(name.as_ref(), value.as_ref()).is_err() {
                tracing::debug!(header = name.as_ref(), "dropping invalid header");
            }
        }
        map
    }

    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let name_header = HeaderName::from_str(name).map_err(|_| NetError::InvalidHeader)?;
        let value_header = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
        self.insert_typed(name_header, value_header);
        Ok(())
    }

    /// Insert an already validated header. HeaderName is always lower-case.
    pub fn insert_typed(&mut self, name: HeaderName, value: HeaderValue) {
        if let Some((_, v)) = self.headers.iter_mut().find(|(n, _)| *n == name) {
            *v = value;
        } else {
            self.headers.push((name, value));
        }
    }

    /// Insert only when the header is not already present.
    pub fn insert_if_absent(&mut self, name: HeaderName, value: HeaderValue) {
        if !self.headers.iter().any(|(n, _)| *n == name) {
            self.headers.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) {
        if let Ok(target) = HeaderName::from_str(name) {
            self.headers.retain(|(n, _)| *n != target);
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let target = HeaderName::from_str(name).ok()?;
        self.headers
            .iter()
            .find(|(n, _)| *n == target)
            .map(|(_, v)| v)
    }

    /// Header value as text, if present and visible ASCII.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: OrderedHeaderMap) {
        for (name, value) in other.headers {
            self.insert_typed(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Consumes the map and returns a standard http::HeaderMap.
    /// Note: http::HeaderMap preserves insertion order.
    pub fn to_header_map(self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            map.append(name, value);
        }
        map
    }
}

impl From<&HeaderMap> for OrderedHeaderMap {
    fn from(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            headers.insert_typed(name.clone(), value.clone());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("Content-Type", "application/json").unwrap();
        assert_eq!(headers.get_str("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_case_insensitive_get() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("ACCEPT", "text/html").unwrap();
        assert!(headers.get("accept").is_some());
        assert!(headers.get("Accept").is_some());
    }

    #[test]
    fn test_mixed_case_keys_collapse() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("Content-Type", "text/plain").unwrap();
        headers.insert("content-type", "application/json").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_str("CONTENT-TYPE"), Some("application/json"));

        let (name, _) = headers.iter().next().unwrap();
        assert_eq!(name.as_str(), "content-type");
    }

    #[test]
    fn test_remove_header() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("X-Custom", "value").unwrap();
        headers.remove("x-custom");
        assert!(headers.get("X-Custom").is_none());
    }

    #[test]
    fn test_preserves_insertion_order() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("Host", "example.com").unwrap();
        headers.insert("Accept", "text/html").unwrap();
        headers.insert("User-Agent", "test").unwrap();

        let map = headers.to_header_map();
        let names: Vec<_> = map.keys().collect();
        assert_eq!(names[0].as_str(), "host");
        assert_eq!(names[2].as_str(), "user-agent");
    }

    #[test]
    fn test_invalid_header_name() {
        let mut headers = OrderedHeaderMap::new();
        assert!(headers.insert("Invalid Header", "value").is_err());
    }

    #[test]
    fn test_invalid_header_value() {
        let mut headers = OrderedHeaderMap::new();
        assert!(headers.insert("Valid", "invalid\nvalue").is_err());
    }

    #[test]
    fn test_from_pairs_lossy_skips_invalid() {
        let headers = OrderedHeaderMap::from_pairs_lossy([
            ("X-Good", "1"),
            ("bad name", "2"),
            ("X-Bad-Value", "a\r\nb"),
            ("x-good", "3"),
        ]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_str("x-good"), Some("3"));
    }

    #[test]
    fn test_insert_if_absent() {
        let mut headers = OrderedHeaderMap::new();
        headers.insert("content-type", "text/plain").unwrap();
        headers.insert_if_absent(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        assert_eq!(headers.get_str("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_merge_other_wins() {
        let mut base = OrderedHeaderMap::from_pairs_lossy([("User-Agent", "a"), ("Accept", "*/*")]);
        base.merge(OrderedHeaderMap::from_pairs_lossy([("user-agent", "b")]));
        assert_eq!(base.len(), 2);
        assert_eq!(base.get_str("user-agent"), Some("b"));
    }
}
