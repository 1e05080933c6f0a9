//! Ordered handler chains.
//!
//! A [`Chain`] runs its handlers in registration order. Each handler receives
//! the call context and a [`Next`] handle for the remainder of the chain;
//! `Next::run` consumes the handle, so the rest of the chain runs at most once
//! per handler invocation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tonic::Status;

use crate::context::CallContext;

/// A step in a handler chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle a call, optionally delegating to the rest of the chain.
    async fn handle(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status>;
}

/// The remainder of a handler chain.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Run the remaining handlers. An exhausted chain completes with `Ok(())`.
    pub async fn run(self, ctx: &mut CallContext) -> Result<(), Status> {
        match self.rest.split_first() {
            Some((head, tail)) => head.handle(ctx, Next { rest: tail }).await,
            None => Ok(()),
        }
    }

    /// Number of handlers still to run.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.rest.len())
            .finish()
    }
}

/// Ordered list of handlers attached to an RPC method.
#[derive(Clone, Default)]
pub struct Chain {
    handlers: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn with<M: Middleware + 'static>(mut self, handler: M) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append a shared handler.
    pub fn with_shared(mut self, handler: Arc<dyn Middleware>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain for one call.
    pub async fn run(&self, ctx: &mut CallContext) -> Result<(), Status> {
        Next {
            rest: &self.handlers,
        }
        .run(ctx)
        .await
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Synchronous handler. See [`handler_fn`].
pub struct HandlerFn<F>(F);

/// Adapt a synchronous function as a chain handler.
///
/// The function runs to completion, then the rest of the chain runs. An error
/// short-circuits the chain.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut CallContext) -> Result<(), Status> + Send + Sync,
{
    HandlerFn(f)
}

#[async_trait]
impl<F> Middleware for HandlerFn<F>
where
    F: Fn(&mut CallContext) -> Result<(), Status> + Send + Sync,
{
    async fn handle(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status> {
        (self.0)(ctx)?;
        next.run(ctx).await
    }
}
