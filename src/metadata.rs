//! Call metadata containers.
//!
//! gRPC metadata keys are case-insensitive and travel lowercase on the wire.
//! [`Metadata`] is the framework-neutral container used by [`CallContext`];
//! [`MetadataStore`] lets the same request ID logic run directly against
//! tonic's `MetadataMap` and raw `http::HeaderMap`s.
//!
//! [`CallContext`]: crate::CallContext

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue};
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};

use crate::error::RequestIdError;

/// Returns true if a metadata value is present and non-empty.
///
/// An empty string counts as absent: a caller that sends an empty request ID
/// is treated exactly like one that sends none.
pub fn is_present_and_non_empty(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Textual access to a metadata container.
///
/// Keys passed in are already lowercase.
pub trait MetadataStore {
    /// Read a value as text. Values that are not representable as text read as `None`.
    fn get_text(&self, key: &str) -> Option<&str>;

    /// Store a value, replacing any existing one.
    fn set_text(&mut self, key: &str, value: &str) -> Result<(), RequestIdError>;
}

/// Case-insensitive string metadata for a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key.to_lowercase().as_str())
            .map(String::as_str)
    }

    /// Insert a value, returning the previous one. The key is stored lowercase.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(key.as_ref().to_lowercase(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key.to_lowercase().as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key.to_lowercase().as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}

impl MetadataStore for Metadata {
    fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key)
    }

    fn set_text(&mut self, key: &str, value: &str) -> Result<(), RequestIdError> {
        self.insert(key, value);
        Ok(())
    }
}

impl MetadataStore for MetadataMap {
    fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.to_str().ok())
    }

    fn set_text(&mut self, key: &str, value: &str) -> Result<(), RequestIdError> {
        let invalid = || RequestIdError::InvalidMetadataValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let name = AsciiMetadataKey::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
        let val: AsciiMetadataValue = value.parse().map_err(|_| invalid())?;
        self.insert(name, val);
        Ok(())
    }
}

impl MetadataStore for HeaderMap {
    fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.to_str().ok())
    }

    fn set_text(&mut self, key: &str, value: &str) -> Result<(), RequestIdError> {
        let invalid = || RequestIdError::InvalidMetadataValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
        let val = HeaderValue::from_str(value).map_err(|_| invalid())?;
        self.insert(name, val);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_predicate() {
        assert!(is_present_and_non_empty(Some("abc")));
        assert!(!is_present_and_non_empty(Some("")));
        assert!(!is_present_and_non_empty(None));
    }

    #[test]
    fn test_metadata_is_case_insensitive() {
        let mut metadata = Metadata::new();
        metadata.insert("RequestId", "asdf");
        assert_eq!(metadata.get("requestid"), Some("asdf"));
        assert_eq!(metadata.get("REQUESTID"), Some("asdf"));
        assert!(metadata.contains_key("requestId"));
        assert_eq!(metadata.iter().next(), Some(("requestid", "asdf")));
    }

    #[test]
    fn test_metadata_insert_replaces() {
        let mut metadata: Metadata = [("rid", "foo")].into_iter().collect();
        assert_eq!(metadata.insert("RID", "bar"), Some("foo".to_string()));
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.remove("rid"), Some("bar".to_string()));
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_metadata_map_store() {
        let mut map = MetadataMap::new();
        map.set_text("x-request-id", "abc-123").unwrap();
        assert_eq!(map.get_text("x-request-id"), Some("abc-123"));
    }

    #[test]
    fn test_metadata_map_rejects_binary_key() {
        let mut map = MetadataMap::new();
        let err = map.set_text("trace-bin", "abc").unwrap_err();
        assert!(matches!(err, RequestIdError::InvalidMetadataValue { .. }));
    }

    #[test]
    fn test_header_map_rejects_control_characters() {
        let mut headers = HeaderMap::new();
        let err = headers.set_text("requestid", "bad\nvalue").unwrap_err();
        assert!(matches!(err, RequestIdError::InvalidMetadataValue { .. }));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_header_map_non_text_value_reads_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "requestid",
            HeaderValue::from_bytes(b"caf\xe9").unwrap(),
        );
        assert_eq!(headers.get_text("requestid"), None);
    }
}
