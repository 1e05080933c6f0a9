//! Tower layer for tonic servers.
//!
//! Works at the HTTP layer, before tonic deserializes the protobuf body, so the
//! request ID is in place for every service on the server and the whole call
//! runs inside a tracing span carrying it.
//!
//! ```ignore
//! Server::builder()
//!     .layer(RequestIdLayer::new(RequestId::new()).with_response_echo())
//!     .add_service(health_service)
//!     .serve(addr)
//!     .await?;
//! ```

use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::context::Fields;
use crate::metadata::MetadataStore;
use crate::request_id::RequestId;

/// Layer producing [`RequestIdService`].
#[derive(Debug, Clone)]
pub struct RequestIdLayer {
    request_id: RequestId,
    echo: bool,
}

impl RequestIdLayer {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            echo: false,
        }
    }

    /// Also set the request ID on response headers.
    pub fn with_response_echo(mut self) -> Self {
        self.echo = true;
        self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService {
            inner,
            request_id: self.request_id.clone(),
            echo: self.echo,
        }
    }
}

/// Request ID middleware over gRPC HTTP requests.
///
/// Generator failures are answered with an `INTERNAL` gRPC status; the inner
/// service is not called.
#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
    request_id: RequestId,
    echo: bool,
}

impl<S, B> Service<http::Request<B>> for RequestIdService<S>
where
    S: Service<http::Request<B>, Response = http::Response<BoxBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        let id = match self.request_id.ensure(request.headers_mut()) {
            Ok(id) => id,
            Err(err) => {
                let status = Status::from(err);
                return futures::future::ready(Ok(status.into_http())).boxed();
            }
        };

        if let Some(field) = self.request_id.target().as_field() {
            let extensions = request.extensions_mut();
            match extensions.get_mut::<Fields>() {
                Some(fields) => {
                    fields.insert(field, id.clone());
                }
                None => {
                    let mut fields = Fields::new();
                    fields.insert(field, id.clone());
                    extensions.insert(fields);
                }
            }
        }

        let span = tracing::info_span!("grpc", request_id = %id, path = %request.uri().path());
        let future = {
            let _entered = span.enter();
            self.inner.call(request)
        };

        let echo_key = self.echo.then(|| self.request_id.key().to_string());

        async move {
            let mut response = future.await?;
            if let Some(key) = echo_key {
                if let Err(e) = response.headers_mut().set_text(&key, &id) {
                    tracing::warn!(error = %e, "Failed to echo request id on response");
                }
            }
            Ok(response)
        }
        .instrument(span)
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::{service_fn, ServiceExt};

    /// Inner service that reports what it saw in response headers.
    async fn echo_seen(request: http::Request<()>) -> Result<http::Response<BoxBody>, Infallible> {
        let mut response = http::Response::new(tonic::body::empty_body());
        if let Some(id) = request.headers().get("requestid") {
            response.headers_mut().insert("seen-metadata", id.clone());
        }
        if let Some(fields) = request.extensions().get::<Fields>() {
            response
                .headers_mut()
                .insert("fields-present", http::HeaderValue::from_static("yes"));
            if let Some(field) = fields.get("requestId") {
                response
                    .headers_mut()
                    .insert("seen-field", field.parse().unwrap());
            }
        }
        Ok(response)
    }

    #[tokio::test]
    async fn test_layer_generates_id_and_mirrors_field() {
        let rid = RequestId::builder()
            .generator(|| "1234".to_string())
            .build()
            .unwrap();
        let svc = RequestIdLayer::new(rid).layer(service_fn(echo_seen));

        let response = svc
            .oneshot(http::Request::new(()))
            .await
            .unwrap();

        assert_eq!(response.headers()["seen-metadata"], "1234");
        assert_eq!(response.headers()["seen-field"], "1234");
        assert!(response.headers().get("requestid").is_none());
    }

    #[tokio::test]
    async fn test_layer_without_target_adds_no_extension() {
        let rid = RequestId::builder()
            .target(false)
            .generator(|| "1234".to_string())
            .build()
            .unwrap();
        let svc = RequestIdLayer::new(rid).layer(service_fn(echo_seen));

        let response = svc.oneshot(http::Request::new(())).await.unwrap();

        assert_eq!(response.headers()["seen-metadata"], "1234");
        assert!(response.headers().get("seen-field").is_none());
        assert!(response.headers().get("fields-present").is_none());
    }

    #[tokio::test]
    async fn test_layer_keeps_incoming_header() {
        let svc = RequestIdLayer::new(RequestId::new()).layer(service_fn(echo_seen));
        let request = http::Request::builder()
            .header("RequestId", "from-client")
            .body(())
            .unwrap();

        let response = svc.oneshot(request).await.unwrap();

        assert_eq!(response.headers()["seen-metadata"], "from-client");
        assert_eq!(response.headers()["seen-field"], "from-client");
    }

    #[tokio::test]
    async fn test_layer_echoes_id_on_response() {
        let rid = RequestId::builder()
            .generator(|| "5678".to_string())
            .build()
            .unwrap();
        let svc = RequestIdLayer::new(rid)
            .with_response_echo()
            .layer(service_fn(echo_seen));

        let response = svc.oneshot(http::Request::new(())).await.unwrap();

        assert_eq!(response.headers()["requestid"], "5678");
    }

    #[tokio::test]
    async fn test_layer_generator_failure_returns_grpc_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let inner = service_fn(move |request: http::Request<()>| {
            seen.fetch_add(1, Ordering::SeqCst);
            echo_seen(request)
        });
        let rid = RequestId::builder()
            .generator(crate::generator::try_generator(|| {
                Err::<String, _>("generator offline")
            }))
            .build()
            .unwrap();
        let svc = RequestIdLayer::new(rid).layer(inner);

        let response = svc.oneshot(http::Request::new(())).await.unwrap();

        assert_eq!(response.headers()["grpc-status"], "13");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
