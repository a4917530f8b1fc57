//! Tower layer binding a tenant context around each HTTP request.
//!
//! The tenant id travels between processes only as explicit request data
//! (the [`TENANT_ID_HEADER`] header); this layer is the point where that
//! wire form becomes the in-process task-local context. The superuser flag
//! is never taken from the wire; authorization code sets it in-process
//! after verifying credentials.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{HeaderMap, HeaderName, Request};
use tower::{Layer, Service};
use tracing::debug;

use crate::context::TenantContext;

/// Default request header carrying the tenant identifier.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Layer that wraps each request in a [`TenantContext::scope`].
#[derive(Clone, Debug)]
pub struct TenantScopeLayer {
    header: HeaderName,
}

impl TenantScopeLayer {
    pub fn new() -> Self {
        TenantScopeLayer {
            header: HeaderName::from_static(TENANT_ID_HEADER),
        }
    }

    /// Reads the tenant id from `header` instead of [`TENANT_ID_HEADER`].
    pub fn with_header(header: HeaderName) -> Self {
        TenantScopeLayer { header }
    }
}

impl Default for TenantScopeLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for TenantScopeLayer {
    type Service = TenantScope<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantScope {
            inner,
            header: self.header.clone(),
        }
    }
}

/// Middleware service produced by [`TenantScopeLayer`].
#[derive(Clone, Debug)]
pub struct TenantScope<S> {
    inner: S,
    header: HeaderName,
}

impl<S, B> Service<Request<B>> for TenantScope<S>
where
    S: Service<Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), S::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let ctx = resolve_context(req.headers(), &self.header);
        // Swap in the clone so the boxed future owns the service instance
        // that poll_ready approved.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(ctx.scope(async move { inner.call(req).await }))
    }
}

fn resolve_context(headers: &HeaderMap, header: &HeaderName) -> TenantContext {
    match headers.get(header).and_then(|value| value.to_str().ok()) {
        Some(tenant_id) if !tenant_id.is_empty() => TenantContext::new(tenant_id),
        _ => {
            debug!(header = %header, "request carries no tenant id; using default context");
            TenantContext::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{current_tenant_id, is_cloud_superuser, DEFAULT_TENANT_ID};
    use axum::body::Body;
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn whoami() -> String {
        current_tenant_id()
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(TenantScopeLayer::new())
    }

    fn request(header: Option<(&str, &str)>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_header_binds_tenant_for_handler() {
        let response = app()
            .oneshot(request(Some((TENANT_ID_HEADER, "acme"))))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "acme");
    }

    #[tokio::test]
    async fn test_missing_header_falls_back_to_sentinel() {
        let response = app().oneshot(request(None)).await.unwrap();
        assert_eq!(body_string(response).await, DEFAULT_TENANT_ID);
    }

    #[tokio::test]
    async fn test_empty_header_falls_back_to_sentinel() {
        let response = app()
            .oneshot(request(Some((TENANT_ID_HEADER, ""))))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, DEFAULT_TENANT_ID);
    }

    #[tokio::test]
    async fn test_custom_header_name() {
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(TenantScopeLayer::with_header(HeaderName::from_static(
                "x-org-id",
            )));
        let response = app
            .oneshot(request(Some(("x-org-id", "globex"))))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "globex");
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_contaminate() {
        let app = app();
        let (acme, globex) = tokio::join!(
            app.clone().oneshot(request(Some((TENANT_ID_HEADER, "acme")))),
            app.clone().oneshot(request(Some((TENANT_ID_HEADER, "globex")))),
        );
        assert_eq!(body_string(acme.unwrap()).await, "acme");
        assert_eq!(body_string(globex.unwrap()).await, "globex");
    }

    #[tokio::test]
    async fn test_superuser_flag_never_comes_from_the_wire() {
        let app = Router::new()
            .route("/elevated", get(|| async { is_cloud_superuser().to_string() }))
            .layer(TenantScopeLayer::new());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/elevated")
                    .header(TENANT_ID_HEADER, "acme")
                    .header("x-cloud-superuser", "true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "false");
    }
}
