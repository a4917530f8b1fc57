//! Request-scoped tenant context propagation for multi-tenant services.
//!
//! Every concurrently executing unit of work (HTTP request, background
//! task, worker thread) sees its own tenant id and cloud-superuser flag;
//! units never observe each other's values, and unscoped reads degrade to
//! documented defaults instead of erroring.
//!
//! ```
//! use tenant_context::{current_tenant_id, set_current_tenant_id, TenantContext};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! TenantContext::default()
//!     .scope(async {
//!         set_current_tenant_id("acme");
//!         assert_eq!(current_tenant_id(), "acme");
//!     })
//!     .await;
//! # }
//! ```

pub mod context;
pub mod middleware;

pub use context::{
    current_tenant_id, is_cloud_superuser, set_cloud_superuser, set_current_tenant_id,
    TenantContext, DEFAULT_TENANT_ID,
};
pub use middleware::{TenantScope, TenantScopeLayer, TENANT_ID_HEADER};
