//! Per-call context passed through a handler chain.

use std::collections::HashMap;

use crate::metadata::Metadata;

/// Named string fields attached to a call.
///
/// Handlers use fields to hand values to later handlers without touching call
/// metadata. The tonic integrations carry this type as a request extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(HashMap<String, String>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field names are case-sensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Context for a single RPC invocation.
///
/// Owned by exactly one call; handlers receive it by mutable reference.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    method: String,
    metadata: Metadata,
    fields: Fields,
}

impl CallContext {
    /// Create a context for the given method path (e.g. `/pkg.Service/Method`).
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    /// Replace the inbound metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Read a named field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    /// Set a named field, returning the previous value.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_fields_are_case_sensitive() {
        let mut ctx = CallContext::new("/svc/Method");
        ctx.set_field("RequestId", "abc");
        assert_eq!(ctx.field("RequestId"), Some("abc"));
        assert_eq!(ctx.field("requestid"), None);
        assert!(ctx.fields().contains("RequestId"));
        assert!(!ctx.fields().contains("requestid"));
        assert_eq!(ctx.method(), "/svc/Method");
    }

    #[test]
    fn test_with_metadata() {
        let metadata: Metadata = [("RID", "foo")].into_iter().collect();
        let ctx = CallContext::new("/svc/Method").with_metadata(metadata);
        assert_eq!(ctx.metadata().get("rid"), Some("foo"));
        assert!(ctx.fields().is_empty());
    }
}
