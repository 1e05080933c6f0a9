//! Identifier generators.
//!
//! A generator is invoked synchronously, with no arguments, whenever an incoming
//! call carries no request ID. Any `Fn() -> String` closure is a generator;
//! fallible closures are wrapped with [`try_generator`].

use std::fmt;

use serde::Deserialize;
use uuid::Uuid;

use crate::error::BoxError;

/// Source of new request identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new identifier.
    fn generate(&self) -> Result<String, BoxError>;
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> Result<String, BoxError> {
        Ok(self())
    }
}

/// Built-in UUID generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UuidGenerator {
    /// Random UUID (hyphenated, lowercase).
    #[default]
    #[serde(alias = "uuid", alias = "v4")]
    UuidV4,
    /// Time-ordered UUID (hyphenated, lowercase).
    #[serde(alias = "v7")]
    UuidV7,
}

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Result<String, BoxError> {
        let id = match self {
            UuidGenerator::UuidV4 => Uuid::new_v4(),
            UuidGenerator::UuidV7 => Uuid::now_v7(),
        };
        Ok(id.to_string())
    }
}

/// Generator backed by a fallible closure. See [`try_generator`].
pub struct TryFnGenerator<F>(F);

impl<F> fmt::Debug for TryFnGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TryFnGenerator")
    }
}

impl<F, E> IdGenerator for TryFnGenerator<F>
where
    F: Fn() -> Result<String, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn generate(&self) -> Result<String, BoxError> {
        (self.0)().map_err(Into::into)
    }
}

/// Wrap a fallible closure as a generator.
///
/// Errors are surfaced to the caller of the middleware as
/// [`RequestIdError::Generator`](crate::RequestIdError::Generator); no fallback
/// identifier is substituted.
pub fn try_generator<F, E>(f: F) -> TryFnGenerator<F>
where
    F: Fn() -> Result<String, E> + Send + Sync,
    E: Into<BoxError>,
{
    TryFnGenerator(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_v4_generates_distinct_ids() {
        let a = UuidGenerator::UuidV4.generate().unwrap();
        let b = UuidGenerator::UuidV4.generate().unwrap();
        assert_eq!(a.len(), 36);
        assert_ne!(a, b);
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 4);
    }

    #[test]
    fn test_uuid_v7_version() {
        let id = UuidGenerator::UuidV7.generate().unwrap();
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 7);
    }

    #[test]
    fn test_closure_is_generator() {
        let generator = || "1234".to_string();
        assert_eq!(generator.generate().unwrap(), "1234");
    }

    #[test]
    fn test_try_generator_propagates_error() {
        let generator = try_generator(|| Err::<String, _>("no entropy"));
        let err = generator.generate().unwrap_err();
        assert_eq!(err.to_string(), "no entropy");
    }

    #[test]
    fn test_uuid_generator_from_yaml() {
        let parsed: UuidGenerator = serde_yaml::from_str("uuid_v7").unwrap();
        assert_eq!(parsed, UuidGenerator::UuidV7);
        let parsed: UuidGenerator = serde_yaml::from_str("uuid").unwrap();
        assert_eq!(parsed, UuidGenerator::UuidV4);
    }
}
