//! Task-local tenant context for cross-layer propagation.
//!
//! Request-entry middleware binds a [`TenantContext`] around each unit of
//! work via [`TenantContext::scope`], and downstream code (data access,
//! authorization checks, query routing) reads it through the free functions
//! without the tenant being threaded through every signature.

use std::cell::RefCell;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Tenant identifier returned when no context has been bound.
///
/// Matches the default database schema name, so unscoped reads route to the
/// default schema rather than failing. Callers that require a real tenant
/// must treat this sentinel as misconfiguration at their own call site.
pub const DEFAULT_TENANT_ID: &str = "public";

tokio::task_local! {
    static CURRENT: RefCell<TenantContext>;
}

/// Snapshot of the tenant context for one unit of work.
///
/// `Serialize`/`Deserialize` so the snapshot can be carried explicitly in
/// message envelopes when work crosses a process boundary; the task-local
/// slot itself never crosses processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub cloud_superuser: bool,
}

impl Default for TenantContext {
    fn default() -> Self {
        TenantContext {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            cloud_superuser: false,
        }
    }
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        TenantContext {
            tenant_id: tenant_id.into(),
            cloud_superuser: false,
        }
    }

    /// Snapshot of the calling unit of work's context, or the defaults when
    /// none is bound. Hand the snapshot to spawned child work: the child
    /// sees the parent's values as of this call, and later mutations on
    /// either side stay on their own side.
    pub fn current() -> Self {
        CURRENT
            .try_with(|ctx| ctx.borrow().clone())
            .unwrap_or_default()
    }

    /// True when the tenant id is still the [`DEFAULT_TENANT_ID`] sentinel.
    pub fn is_default(&self) -> bool {
        self.tenant_id == DEFAULT_TENANT_ID
    }

    /// Runs `fut` with this context bound as its task-local tenant context.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        trace!(tenant_id = %self.tenant_id, "binding tenant context");
        CURRENT.scope(RefCell::new(self), fut).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope) for worker threads
    /// and `spawn_blocking` bodies.
    pub fn sync_scope<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        trace!(tenant_id = %self.tenant_id, "binding tenant context (sync)");
        CURRENT.sync_scope(RefCell::new(self), f)
    }
}

/// Returns the tenant id bound in the calling unit of work's context.
///
/// Falls back to [`DEFAULT_TENANT_ID`] when no context is bound; the
/// fallback emits a `debug` event so unscoped reads are auditable.
pub fn current_tenant_id() -> String {
    match CURRENT.try_with(|ctx| ctx.borrow().tenant_id.clone()) {
        Ok(tenant_id) => tenant_id,
        Err(_) => {
            debug!(
                fallback = DEFAULT_TENANT_ID,
                "tenant id read outside any tenant scope"
            );
            DEFAULT_TENANT_ID.to_string()
        }
    }
}

/// Overwrites the tenant id for the remainder of the current unit of work.
///
/// Outside any bound context there is no slot to write to; the call is a
/// logged no-op rather than an error.
pub fn set_current_tenant_id(tenant_id: impl Into<String>) {
    let tenant_id = tenant_id.into();
    let bound = CURRENT.try_with(|ctx| {
        ctx.borrow_mut().tenant_id = tenant_id.clone();
    });
    if bound.is_err() {
        debug!(%tenant_id, "tenant id set outside any tenant scope; ignored");
    }
}

/// Returns the cloud-superuser flag for the current unit of work.
/// Defaults to `false` when no context is bound.
pub fn is_cloud_superuser() -> bool {
    CURRENT
        .try_with(|ctx| ctx.borrow().cloud_superuser)
        .unwrap_or(false)
}

/// Sets the cloud-superuser flag for the remainder of the current unit of
/// work. Logged no-op outside any bound context.
pub fn set_cloud_superuser(cloud_superuser: bool) {
    let bound = CURRENT.try_with(|ctx| {
        ctx.borrow_mut().cloud_superuser = cloud_superuser;
    });
    if bound.is_err() {
        debug!(cloud_superuser, "superuser flag set outside any tenant scope; ignored");
    }
}
