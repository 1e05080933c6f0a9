//! Request ID middleware.
//!
//! Ensures every call carries a correlation identifier in its metadata. An
//! identifier supplied by the caller is reused; otherwise one is generated.
//! The identifier is then mirrored onto a named context field (unless
//! mirroring is disabled) before the rest of the chain runs.
//!
//! ```
//! use grpc_requestid::{handler_fn, CallContext, Chain, RequestId};
//!
//! # tokio_test::block_on(async {
//! let chain = Chain::new()
//!     .with(RequestId::new())
//!     .with(handler_fn(|ctx| {
//!         assert!(ctx.field("requestId").is_some());
//!         Ok(())
//!     }));
//!
//! let mut ctx = CallContext::new("/pkg.Service/Method");
//! chain.run(&mut ctx).await.unwrap();
//! # });
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tonic::metadata::AsciiMetadataKey;
use tonic::Status;
use tracing::{debug, trace, warn};

use crate::chain::{Middleware, Next};
use crate::config::Target;
use crate::context::CallContext;
use crate::error::RequestIdError;
use crate::generator::{IdGenerator, UuidGenerator};
use crate::metadata::{is_present_and_non_empty, MetadataStore};

/// Default metadata key (and default target field).
pub const DEFAULT_NAME: &str = "requestId";

/// Configured request ID middleware.
///
/// Cheap to clone; all clones share the same immutable configuration.
#[derive(Clone)]
pub struct RequestId {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    key: String,
    target: Target,
    generator: Arc<dyn IdGenerator>,
}

impl RequestId {
    /// Middleware with default options: key `requestid`, field `requestId`,
    /// UUID v4 generator.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                name: DEFAULT_NAME.to_string(),
                key: DEFAULT_NAME.to_lowercase(),
                target: Target::Field(DEFAULT_NAME.to_string()),
                generator: Arc::new(UuidGenerator::default()),
            }),
        }
    }

    pub fn builder() -> RequestIdBuilder {
        RequestIdBuilder::default()
    }

    /// The configured name, original casing.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The metadata key (lowercased name).
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// Ensure the metadata carries a request ID and return it.
    ///
    /// Reuses a non-empty existing value; otherwise calls the generator once
    /// and stores the result. Repeated calls on the same metadata return the
    /// same ID.
    pub fn ensure<M>(&self, metadata: &mut M) -> Result<String, RequestIdError>
    where
        M: MetadataStore + ?Sized,
    {
        let key = self.key();

        let existing = metadata.get_text(key);
        if is_present_and_non_empty(existing) {
            let id = existing.unwrap_or_default().to_string();
            trace!(key = %key, request_id = %id, "Using request id from metadata");
            return Ok(id);
        }

        let id = self.inner.generator.generate().map_err(|e| {
            warn!(key = %key, error = %e, "Request id generator failed");
            RequestIdError::Generator(e)
        })?;
        if id.is_empty() {
            return Err(RequestIdError::EmptyIdentifier);
        }

        metadata.set_text(key, &id)?;
        debug!(key = %key, request_id = %id, "Generated request id");
        Ok(id)
    }

    /// Ensure the request ID on a call context and mirror it onto the target field.
    pub fn apply(&self, ctx: &mut CallContext) -> Result<String, RequestIdError> {
        let id = self.ensure(ctx.metadata_mut())?;
        if let Some(field) = self.target().as_field() {
            ctx.set_field(field, id.clone());
        }
        Ok(id)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestId")
            .field("name", &self.inner.name)
            .field("key", &self.inner.key)
            .field("target", &self.inner.target)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for RequestId {
    async fn handle(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status> {
        self.apply(ctx)?;
        next.run(ctx).await
    }
}

/// Builder for [`RequestId`].
#[derive(Default)]
pub struct RequestIdBuilder {
    name: Option<String>,
    target: Option<Target>,
    generator: Option<Arc<dyn IdGenerator>>,
}

impl RequestIdBuilder {
    /// Metadata key, matched case-insensitively.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Context field to mirror into. Accepts a field name, `false`, or a [`Target`].
    ///
    /// When never set, the target is the name with its original casing.
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Identifier generator. Any `Fn() -> String` works.
    pub fn generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Shared identifier generator.
    pub fn shared_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Resolve defaults and validate the name.
    pub fn build(self) -> Result<RequestId, RequestIdError> {
        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_string());
        let key = name.to_lowercase();

        if key.is_empty() {
            return Err(RequestIdError::InvalidName {
                name,
                reason: "name cannot be empty",
            });
        }
        if AsciiMetadataKey::from_bytes(key.as_bytes()).is_err() {
            return Err(RequestIdError::InvalidName {
                name,
                reason: "name is not a valid ASCII metadata key",
            });
        }

        let target = match self.target {
            Some(Target::Field(field)) => Target::field(field),
            Some(Target::Disabled) => Target::Disabled,
            None => Target::Field(name.clone()),
        };
        let generator = self
            .generator
            .unwrap_or_else(|| Arc::new(UuidGenerator::default()));

        Ok(RequestId {
            inner: Arc::new(Inner {
                name,
                key,
                target,
                generator,
            }),
        })
    }
}

impl fmt::Debug for RequestIdBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdBuilder")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("generator", &self.generator.is_some())
            .finish()
    }
}
