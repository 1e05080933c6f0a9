//! grpc-requestid - Request ID middleware for gRPC servers
//!
//! Ensures every incoming call carries a correlation identifier. If the call
//! metadata already holds one it is reused; otherwise one is generated. The
//! identifier is kept in the metadata and, unless disabled, mirrored onto a
//! named field of the call context before the next handler runs.
//!
//! Three ways to mount it:
//! - as a [`Middleware`] in a [`Chain`] operating on a [`CallContext`]
//! - as a tonic [`Interceptor`](tonic::service::Interceptor)
//! - as a tower layer ([`RequestIdLayer`]) on a tonic `Server`

pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod interceptor;
pub mod layer;
pub mod metadata;
pub mod request_id;
pub mod utils;

pub use chain::{handler_fn, Chain, Middleware, Next};
pub use config::{RequestIdOptions, Target};
pub use context::{CallContext, Fields};
pub use error::{BoxError, RequestIdError};
pub use generator::{try_generator, IdGenerator, UuidGenerator};
pub use interceptor::RequestIdExt;
pub use layer::{RequestIdLayer, RequestIdService};
pub use metadata::{is_present_and_non_empty, Metadata, MetadataStore};
pub use request_id::{RequestId, RequestIdBuilder, DEFAULT_NAME};
