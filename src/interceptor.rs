//! tonic interceptor integration.
//!
//! `RequestId` can be attached directly to a generated server:
//!
//! ```ignore
//! let svc = GreeterServer::with_interceptor(MyGreeter::default(), RequestId::new());
//! ```
//!
//! The ID lands in the request metadata; the mirrored field is stored in a
//! [`Fields`] request extension, readable through [`RequestIdExt`].

use tonic::service::Interceptor;
use tonic::{Request, Status};

use crate::context::Fields;
use crate::request_id::RequestId;

impl Interceptor for RequestId {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let id = self.ensure(request.metadata_mut())?;

        if let Some(field) = self.target().as_field() {
            let extensions = request.extensions_mut();
            match extensions.get_mut::<Fields>() {
                Some(fields) => {
                    fields.insert(field, id);
                }
                None => {
                    let mut fields = Fields::new();
                    fields.insert(field, id);
                    extensions.insert(fields);
                }
            }
        }

        Ok(request)
    }
}

/// Read mirrored fields from a tonic request.
pub trait RequestIdExt {
    /// A named field set by request ID middleware.
    fn field(&self, name: &str) -> Option<&str>;
}

impl<T> RequestIdExt for Request<T> {
    fn field(&self, name: &str) -> Option<&str> {
        self.extensions().get::<Fields>()?.get(name)
    }
}
