//! The kernel: resolve, release and dispose.
//!
//! This module contains the [`Kernel`] type, the public face of the container.
//! It looks up component models, lazily creates one handler per model, and
//! keeps the burden arena and release policy that drive decommissioning.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Instant;

use crate::activator;
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::handler::Handler;
use crate::internal::{Burden, BurdenArena, BurdenId, ChildLink, CreationContext, FastDashMap, WaitGraph};
use crate::key::{service_of, InstanceId, ServiceId};
use crate::lifestyle::{Lifestyle, LifestyleManager, Resolved};
use crate::metrics::{KernelMetrics, MetricsSnapshot};
use crate::observer::Observers;
use crate::release_policy::ReleasePolicy;
use crate::traits::{LifetimeScope, MetadataProvider, ScopeAccessor, ScopeId};
use crate::Instance;

pub mod scope;
pub use scope::{RequestScope, ScopeGuard};

/// Component kernel: resolves instances according to their lifestyle and
/// decommissions them on release.
///
/// Cloning is cheap; clones share one container. The container is disposed
/// by [`dispose`](Self::dispose) or when the last clone is dropped.
///
/// # Thread Safety
///
/// `resolve` and `release` may be called concurrently from any number of
/// threads. No lock is held across a whole resolution; singletons and pools
/// are guarded per model. A dependency cycle whose links are being built on
/// different threads fails with `Circular` rather than blocking forever.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ComponentModel, KernelBuilder};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// static CLOSED: AtomicUsize = AtomicUsize::new(0);
///
/// struct Connection;
/// struct Repository { conn: Arc<Connection> }
///
/// let mut builder = KernelBuilder::new();
/// builder.register(
///     ComponentModel::builder::<Connection>()
///         .transient()
///         .create(|_| Connection)
///         .on_destroy(|_| { CLOSED.fetch_add(1, Ordering::SeqCst); })
///         .build()
///         .unwrap(),
/// );
/// builder.register(
///     ComponentModel::builder::<Repository>()
///         .transient()
///         .depends_on::<Connection>()
///         .create(|deps| Repository { conn: deps.get_required::<Connection>() })
///         .build()
///         .unwrap(),
/// );
/// let kernel = builder.build();
///
/// let repo = kernel.get::<Repository>().unwrap();
/// kernel.release(&repo);
/// kernel.release(&repo);
/// assert_eq!(CLOSED.load(Ordering::SeqCst), 1);
/// ```
pub struct Kernel {
    inner: Arc<KernelInner>,
}

pub(crate) struct KernelInner {
    me: Weak<KernelInner>,
    provider: Arc<dyn MetadataProvider>,
    handlers: FastDashMap<ServiceId, Arc<Handler>>,
    pub(crate) burdens: BurdenArena,
    pub(crate) policy: ReleasePolicy,
    pub(crate) waits: WaitGraph,
    pub(crate) config: KernelConfig,
    pub(crate) observers: Observers,
    pub(crate) metrics: KernelMetrics,
    disposed: AtomicBool,
    scope_accessor: Option<Arc<dyn ScopeAccessor>>,
    scope_stacks: FastDashMap<ThreadId, Vec<Arc<dyn LifetimeScope>>>,
}

enum Step {
    Enter(BurdenId),
    Return(InstanceId),
    Exit(Burden),
}

impl KernelInner {
    pub(crate) fn downgrade(&self) -> Weak<KernelInner> {
        self.me.clone()
    }

    /// Handler for `service`, created on first use.
    pub(crate) fn handler(&self, service: &ServiceId) -> Option<Arc<Handler>> {
        if let Some(handler) = self.handlers.get(service) {
            return Some(handler.clone());
        }
        let model = self.provider.model(service)?;
        let handler = self
            .handlers
            .entry(*service)
            .or_insert_with(|| Handler::new(model, &self.config))
            .clone();
        Some(handler)
    }

    /// Resolves through `handler` with `ctx` tracking the current path.
    pub(crate) fn resolve_with(
        &self,
        handler: &Arc<Handler>,
        ctx: &mut CreationContext,
    ) -> KernelResult<Resolved> {
        ctx.enter(handler.model.service())?;
        let resolved = handler.resolve(self, ctx);
        ctx.leave();
        resolved
    }

    fn resolve_root(&self, service: ServiceId) -> KernelResult<Instance> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(KernelError::Disposed);
        }
        let handler = self
            .handler(&service)
            .ok_or(KernelError::ComponentNotFound(service))?;

        let observed = self.observers.has_observers();
        let start = observed.then(Instant::now);
        if observed {
            self.observers.resolving(&service);
        }

        let mut ctx = CreationContext::new(self.config.max_depth, self.waits.next_id());
        let resolved = self.resolve_with(&handler, &mut ctx)?;

        if handler.lifestyle() == Lifestyle::Transient {
            if let Some(burden) = resolved.burden {
                if !self.policy.track(InstanceId::of(&resolved.instance), burden) {
                    self.cascade(burden);
                    return Err(KernelError::Disposed);
                }
            }
        }

        self.metrics.record_resolution();
        if let Some(start) = start {
            self.observers.resolved(&service, start.elapsed());
        }
        Ok(resolved.instance)
    }

    /// Commits a shared instance's burden and tracks it top-level.
    pub(crate) fn commit_shared(&self, burden: Burden, force: bool) -> KernelResult<()> {
        let instance = burden.instance_id();
        let id = if force {
            Some(self.burdens.insert(burden))
        } else {
            self.burdens.commit(burden)
        };
        if let Some(id) = id {
            if !self.policy.track(instance, id) {
                self.cascade(id);
                return Err(KernelError::Disposed);
            }
            tracing::trace!(instance = %instance, "burden tracked");
        }
        Ok(())
    }

    /// External release: asks the owning lifestyle, then decommissions.
    pub(crate) fn release_id(&self, instance: InstanceId) {
        let Some(burden) = self.policy.lookup(instance) else {
            tracing::trace!(instance = %instance, "release of untracked instance ignored");
            return;
        };
        let Some(handler) = self.burdens.handler_of(burden) else {
            return;
        };
        if handler.release(self, instance) {
            self.decommission(instance);
        }
    }

    /// Untracks `instance` and tears its burden down. The untrack is the
    /// claim: concurrent callers for the same instance do nothing.
    pub(crate) fn decommission(&self, instance: InstanceId) {
        if let Some(burden) = self.policy.untrack(instance) {
            self.cascade(burden);
        }
    }

    /// Tears down a burden and every burden it owns, children first.
    ///
    /// Walks the ownership graph with an explicit stack. Pooled dependencies
    /// are handed back to their pools, not destroyed.
    pub(crate) fn cascade(&self, root: BurdenId) {
        let mut stack = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    let Some(burden) = self.burdens.take(id) else {
                        continue;
                    };
                    let owned = burden.owned.clone();
                    let returns = burden.returns.clone();
                    stack.push(Step::Exit(burden));
                    stack.extend(returns.into_iter().rev().map(Step::Return));
                    stack.extend(owned.into_iter().rev().map(Step::Enter));
                }
                Step::Return(instance) => self.release_id(instance),
                Step::Exit(burden) => activator::destroy(self, &burden),
            }
        }
    }

    /// Releases dependencies resolved for a construction that failed.
    pub(crate) fn unwind(&self, links: &[ChildLink]) {
        for link in links.iter().rev() {
            match *link {
                ChildLink::Owned(Some(burden)) => self.cascade(burden),
                ChildLink::Returned(instance) => self.release_id(instance),
                ChildLink::Owned(None) | ChildLink::Shared => {}
            }
        }
    }

    /// Eviction callback target for scope-lifestyle instances.
    pub(crate) fn evict_scoped(&self, handler: &Handler, scope: ScopeId, instance: InstanceId) {
        if let LifestyleManager::Scope(lifestyle) = &handler.lifestyle {
            lifestyle.evict(scope, instance);
        }
        tracing::trace!(service = %handler.model.service(), scope = scope.as_u64(), "scope evicted instance");
        self.decommission(instance);
    }

    pub(crate) fn current_scope(&self) -> Option<Arc<dyn LifetimeScope>> {
        match &self.scope_accessor {
            Some(accessor) => accessor.current_scope(),
            None => self
                .scope_stacks
                .get(&thread::current().id())
                .and_then(|stack| stack.last().cloned()),
        }
    }

    fn push_scope(&self, scope: Arc<dyn LifetimeScope>) {
        self.scope_stacks
            .entry(thread::current().id())
            .or_default()
            .push(scope);
    }

    fn pop_scope(&self, scope: ScopeId) {
        let current = thread::current().id();
        let now_empty = match self.scope_stacks.get_mut(&current) {
            Some(mut stack) => {
                if let Some(pos) = stack.iter().rposition(|s| s.id() == scope) {
                    stack.remove(pos);
                }
                stack.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.scope_stacks.remove_if(&current, |_, stack| stack.is_empty());
        }
    }

    fn handlers_snapshot(&self) -> Vec<Arc<Handler>> {
        self.handlers.iter().map(|entry| entry.value().clone()).collect()
    }

    fn release_thread_instances(&self) {
        for handler in self.handlers_snapshot() {
            if let LifestyleManager::Thread(thread) = &handler.lifestyle {
                if let Some(instance) = thread.take_current() {
                    self.decommission(instance);
                }
            }
        }
    }

    fn dispose_all(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let tracked = self.policy.drain();
        tracing::debug!(tracked = tracked.len(), "disposing kernel");
        for (_, burden) in tracked {
            self.cascade(burden);
        }
        for handler in self.handlers_snapshot() {
            handler.lifestyle.dispose(self);
        }
        self.scope_stacks.clear();
    }
}

impl Drop for KernelInner {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

impl Kernel {
    pub(crate) fn from_parts(
        provider: Arc<dyn MetadataProvider>,
        config: KernelConfig,
        observers: Observers,
        scope_accessor: Option<Arc<dyn ScopeAccessor>>,
    ) -> Self {
        let inner = Arc::new_cyclic(|me| KernelInner {
            me: me.clone(),
            provider,
            handlers: FastDashMap::default(),
            burdens: BurdenArena::new(),
            policy: ReleasePolicy::new(),
            waits: WaitGraph::new(),
            config,
            observers,
            metrics: KernelMetrics::default(),
            disposed: AtomicBool::new(false),
            scope_accessor,
            scope_stacks: FastDashMap::default(),
        });
        Self { inner }
    }

    /// Creates a kernel over an external metadata provider.
    pub fn with_provider(provider: Arc<dyn MetadataProvider>, config: KernelConfig) -> Self {
        Self::from_parts(provider, config, Observers::default(), None)
    }

    /// Resolves `service` to an instance.
    ///
    /// The caller owns the returned instance in the sense of the release
    /// protocol: pass it to [`release`](Self::release) when done. Shared
    /// lifestyles ignore that release.
    ///
    /// # Errors
    ///
    /// `ComponentNotFound` for an unregistered root service, `Resolution` for
    /// a missing required dependency, `Circular` for a dependency cycle,
    /// `Activation` when a factory fails, `PoolExhausted` for a full pool with
    /// the `Fail` policy, `NoActiveScope`, `DepthExceeded` and `Disposed`.
    pub fn resolve(&self, service: ServiceId) -> KernelResult<Instance> {
        self.inner.resolve_root(service)
    }

    /// Resolves the component registered for type `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> KernelResult<Arc<T>> {
        self.downcast(service_of::<T>())
    }

    /// Resolves a named component of type `T`.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> KernelResult<Arc<T>> {
        self.downcast(ServiceId::Named(name))
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics with the resolution error if `T` cannot be resolved.
    pub fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }

    fn downcast<T: Send + Sync + 'static>(&self, service: ServiceId) -> KernelResult<Arc<T>> {
        let instance: Arc<dyn Any + Send + Sync> = self.resolve(service)?;
        instance.downcast::<T>().map_err(|instance| {
            self.inner.release_id(InstanceId::of(&instance));
            KernelError::TypeMismatch(service)
        })
    }

    /// Releases an instance obtained from this kernel.
    ///
    /// Never fails. Unknown, untracked and already released instances are
    /// ignored, so releasing twice tears down once.
    pub fn release<T: ?Sized>(&self, instance: &Arc<T>) {
        self.inner.release_id(InstanceId::of(instance));
    }

    /// Releases by identity.
    pub fn release_instance(&self, instance: InstanceId) {
        self.inner.release_id(instance);
    }

    /// Tears down every tracked instance and pool. Later resolves fail with
    /// `Disposed`. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Starts a request scope and makes it current on this thread.
    ///
    /// The scope ends, and its scope-lifestyle instances are torn down, when
    /// the guard is dropped.
    ///
    /// ```
    /// use ferrous_kernel::{ComponentModel, KernelBuilder};
    /// use std::sync::Arc;
    ///
    /// struct UnitOfWork;
    ///
    /// let mut builder = KernelBuilder::new();
    /// builder.add_scoped(|_| UnitOfWork);
    /// let kernel = builder.build();
    ///
    /// let first = {
    ///     let _scope = kernel.begin_scope();
    ///     let a = kernel.get::<UnitOfWork>().unwrap();
    ///     let b = kernel.get::<UnitOfWork>().unwrap();
    ///     assert!(Arc::ptr_eq(&a, &b));
    ///     a
    /// };
    ///
    /// let _scope = kernel.begin_scope();
    /// assert!(!Arc::ptr_eq(&first, &kernel.get::<UnitOfWork>().unwrap()));
    /// ```
    pub fn begin_scope(&self) -> ScopeGuard {
        let scope = Arc::new(RequestScope::new());
        self.inner.push_scope(scope.clone());
        ScopeGuard::new(self.inner.downgrade(), scope.id(), Some(scope))
    }

    /// Makes an externally owned scope current on this thread until the guard
    /// is dropped. The owner stays responsible for ending it.
    pub fn enter_scope(&self, scope: Arc<dyn LifetimeScope>) -> ScopeGuard {
        let id = scope.id();
        self.inner.push_scope(scope);
        ScopeGuard::new(self.inner.downgrade(), id, None)
    }

    /// Decommissions the calling thread's thread-lifestyle instances.
    pub fn release_thread_instances(&self) {
        self.inner.release_thread_instances();
    }

    /// Whether a model is registered for `service`.
    pub fn has_component(&self, service: &ServiceId) -> bool {
        self.inner.provider.model(service).is_some()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Instances currently tracked for decommissioning.
    pub fn tracked_count(&self) -> usize {
        self.inner.policy.len()
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut models = self.inner.provider.models();
        models.sort_by_key(|m| m.service().display_name());

        let mut s = String::new();
        s.push_str("=== Kernel Debug ===\n");
        s.push_str("Components:\n");
        for model in models {
            s.push_str(&format!(
                "  {} -> {}: {:?}{}\n",
                model.service(),
                model.implementation(),
                model.lifestyle(),
                if model.has_decommission() { " (decommission)" } else { "" }
            ));
            for dependency in model.dependencies() {
                s.push_str(&format!(
                    "    {} {}\n",
                    if dependency.required { "requires" } else { "optional" },
                    dependency.service
                ));
            }
        }
        s.push_str(&format!("Tracked instances: {}\n", self.inner.policy.len()));
        s.push_str(&format!("Live burdens: {}\n", self.inner.burdens.len()));
        s
    }
}

impl Clone for Kernel {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::KernelBuilder;
    use crate::model::ComponentModel;

    struct Leaf;
    struct Middle;
    struct Root;

    fn kernel() -> Kernel {
        let mut builder = KernelBuilder::new();
        builder
            .register(
                ComponentModel::builder::<Leaf>()
                    .transient()
                    .create(|_| Leaf)
                    .on_destroy(|_| {})
                    .build()
                    .unwrap(),
            )
            .register(
                ComponentModel::builder::<Middle>()
                    .transient()
                    .depends_on::<Leaf>()
                    .create(|_| Middle)
                    .build()
                    .unwrap(),
            )
            .register(
                ComponentModel::builder::<Root>()
                    .transient()
                    .depends_on::<Middle>()
                    .create(|_| Root)
                    .build()
                    .unwrap(),
            );
        builder.build()
    }

    #[test]
    fn only_root_burden_is_tracked() {
        let kernel = kernel();
        let root = kernel.get::<Root>().unwrap();
        assert_eq!(kernel.tracked_count(), 1);
        // Root, Middle and Leaf all carry burdens; only Root is top-level
        assert_eq!(kernel.inner.burdens.len(), 3);

        kernel.release(&root);
        assert_eq!(kernel.tracked_count(), 0);
        assert_eq!(kernel.inner.burdens.len(), 0);
    }

    #[test]
    fn burden_without_decommission_is_not_kept() {
        let mut builder = KernelBuilder::new();
        builder.add_transient(|_| Leaf);
        let kernel = builder.build();

        let _leaf = kernel.get::<Leaf>().unwrap();
        assert_eq!(kernel.tracked_count(), 0);
        assert_eq!(kernel.inner.burdens.len(), 0);
    }

    #[test]
    fn handlers_are_created_lazily() {
        let kernel = kernel();
        assert!(kernel.inner.handlers.is_empty());
        kernel.get::<Middle>().unwrap();
        assert_eq!(kernel.inner.handlers.len(), 2);
    }

    #[test]
    fn dispose_empties_arena() {
        let kernel = kernel();
        let _a = kernel.get::<Root>().unwrap();
        let _b = kernel.get::<Root>().unwrap();
        kernel.dispose();
        assert_eq!(kernel.inner.burdens.len(), 0);
        assert!(matches!(kernel.get::<Root>(), Err(KernelError::Disposed)));
    }
}
