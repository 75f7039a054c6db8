//! Scope collaborators for the `Scope` lifestyle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::Instance;

/// Identity of a lifetime scope (one request, one unit of work).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Allocates a process-unique scope id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ScopeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Callback the scope owner must invoke exactly once when the scope ends.
pub type EvictionCallback = Box<dyn FnOnce() + Send>;

/// End-of-life hook of an externally owned scope.
///
/// The kernel registers every scope-lifestyle instance it creates; the owner
/// (a request pipeline, a unit of work) runs each callback exactly once when
/// the scope ends. [`RequestScope`](crate::RequestScope) is the built-in
/// implementation.
pub trait LifetimeScope: Send + Sync {
    /// Key under which scope-lifestyle instances are shared.
    fn id(&self) -> ScopeId;

    /// Registers `instance` to be evicted when the scope ends.
    fn register_for_eviction(&self, instance: Instance, on_evict: EvictionCallback);
}

/// Supplies the scope that is current for the calling code.
pub trait ScopeAccessor: Send + Sync {
    /// The current scope, if any.
    fn current_scope(&self) -> Option<Arc<dyn LifetimeScope>>;
}
