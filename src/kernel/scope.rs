//! Request scopes and the per-thread current scope.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::KernelInner;
use crate::traits::{EvictionCallback, LifetimeScope, ScopeId};
use crate::Instance;

/// Built-in lifetime scope for one unit of work.
///
/// Collects eviction callbacks and runs each exactly once, newest first, when
/// the scope ends. Ending is idempotent; dropping the scope ends it. A
/// callback registered after the end runs immediately.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{LifetimeScope, RequestScope};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let evicted = Arc::new(AtomicUsize::new(0));
/// let scope = RequestScope::new();
///
/// let counter = evicted.clone();
/// scope.register_for_eviction(Arc::new(()), Box::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// scope.end();
/// scope.end();
/// assert_eq!(evicted.load(Ordering::SeqCst), 1);
/// ```
pub struct RequestScope {
    id: ScopeId,
    evictions: Mutex<Vec<(Instance, EvictionCallback)>>,
    ended: AtomicBool,
}

impl RequestScope {
    pub fn new() -> Self {
        Self {
            id: ScopeId::next(),
            evictions: Mutex::new(Vec::new()),
            ended: AtomicBool::new(false),
        }
    }

    /// Runs every registered eviction callback, newest first.
    pub fn end(&self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let evictions = std::mem::take(&mut *self.evictions.lock());
        tracing::trace!(scope = self.id.as_u64(), evictions = evictions.len(), "scope ended");
        for (instance, on_evict) in evictions.into_iter().rev() {
            on_evict();
            drop(instance);
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Number of instances waiting for the end of the scope.
    pub fn pending_evictions(&self) -> usize {
        self.evictions.lock().len()
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("id", &self.id)
            .field("pending_evictions", &self.pending_evictions())
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl LifetimeScope for RequestScope {
    fn id(&self) -> ScopeId {
        self.id
    }

    fn register_for_eviction(&self, instance: Instance, on_evict: EvictionCallback) {
        {
            let mut evictions = self.evictions.lock();
            if !self.ended.load(Ordering::Acquire) {
                evictions.push((instance, on_evict));
                return;
            }
        }
        on_evict();
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.end();
    }
}

/// Keeps a scope current on the creating thread until dropped.
///
/// Returned by [`Kernel::begin_scope`](crate::Kernel::begin_scope) and
/// [`Kernel::enter_scope`](crate::Kernel::enter_scope). Guards nest; the
/// innermost one is current. Not `Send`: it must be dropped on the thread
/// that created it.
pub struct ScopeGuard {
    kernel: Weak<KernelInner>,
    id: ScopeId,
    owned: Option<Arc<RequestScope>>,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    pub(super) fn new(kernel: Weak<KernelInner>, id: ScopeId, owned: Option<Arc<RequestScope>>) -> Self {
        Self {
            kernel,
            id,
            owned,
            _not_send: PhantomData,
        }
    }

    /// Id of the guarded scope.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The scope created by `begin_scope`, if this guard owns one.
    pub fn scope(&self) -> Option<&Arc<RequestScope>> {
        self.owned.as_ref()
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("id", &self.id)
            .field("owned", &self.owned.is_some())
            .finish()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(kernel) = self.kernel.upgrade() {
            kernel.pop_scope(self.id);
        }
        if let Some(scope) = self.owned.take() {
            scope.end();
        }
    }
}
