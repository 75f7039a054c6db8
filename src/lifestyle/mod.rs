//! Lifestyles: when instances are created, shared and torn down.

mod pooled;
mod scope;
mod singleton;
mod slot;
mod thread;

use std::sync::Arc;

use crate::activator;
use crate::config::KernelConfig;
use crate::error::KernelResult;
use crate::handler::Handler;
use crate::internal::{BurdenId, CreationContext};
use crate::kernel::KernelInner;
use crate::key::InstanceId;
use crate::model::ComponentModel;
use crate::traits::CustomLifestyle;
use crate::Instance;

pub(crate) use pooled::PooledLifestyle;
pub(crate) use scope::ScopeLifestyle;
pub(crate) use singleton::SingletonLifestyle;
pub(crate) use thread::ThreadLifestyle;

/// Sharing policy of a component
///
/// # Lifestyle Characteristics
///
/// - **Transient**: a new instance per resolve, owned by whoever asked for it
/// - **Singleton**: one instance per kernel, torn down on `dispose`
/// - **Thread**: one instance per thread, torn down with the thread's slots
/// - **Scope**: one instance per lifetime scope, torn down when the scope ends
/// - **Pooled**: borrowed from a bounded pool, handed back on release
/// - **Custom**: decided by a [`CustomLifestyle`] strategy
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{ComponentModel, KernelBuilder, Lifestyle};
/// use std::sync::Arc;
///
/// struct Database;
/// struct RequestModel;
///
/// let mut builder = KernelBuilder::new();
/// builder.register(ComponentModel::builder::<Database>().singleton().create(|_| Database).build().unwrap());
/// builder.register(ComponentModel::builder::<RequestModel>().transient().create(|_| RequestModel).build().unwrap());
/// let kernel = builder.build();
///
/// let db1 = kernel.get::<Database>().unwrap();
/// let db2 = kernel.get::<Database>().unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// let m1 = kernel.get::<RequestModel>().unwrap();
/// let m2 = kernel.get::<RequestModel>().unwrap();
/// assert!(!Arc::ptr_eq(&m1, &m2));
///
/// assert!(Lifestyle::Singleton.is_shared());
/// assert!(!Lifestyle::Transient.is_shared());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifestyle {
    /// New instance on every resolve
    Transient,
    /// One instance per kernel
    Singleton,
    /// One instance per thread
    Thread,
    /// One instance per lifetime scope
    Scope,
    /// Bounded pool of reusable instances
    Pooled,
    /// Externally supplied strategy
    Custom,
}

impl Lifestyle {
    /// Whether instances outlive the consumer that resolved them.
    ///
    /// Shared instances are never torn down because a consumer was released.
    pub fn is_shared(&self) -> bool {
        !matches!(self, Lifestyle::Transient)
    }
}

/// Outcome of a lifestyle resolve.
pub(crate) struct Resolved {
    pub(crate) instance: Instance,
    /// Burden of a freshly created transient instance, if it needs one
    pub(crate) burden: Option<BurdenId>,
}

impl Resolved {
    fn shared(instance: Instance) -> Self {
        Self { instance, burden: None }
    }
}

/// One strategy per lifestyle tag.
pub(crate) enum LifestyleManager {
    Transient,
    Singleton(SingletonLifestyle),
    Thread(ThreadLifestyle),
    Scope(ScopeLifestyle),
    Pooled(PooledLifestyle),
    Custom(Arc<dyn CustomLifestyle>),
}

impl LifestyleManager {
    pub(crate) fn for_model(model: &ComponentModel, config: &KernelConfig) -> Self {
        match model.lifestyle() {
            Lifestyle::Transient => LifestyleManager::Transient,
            Lifestyle::Singleton => LifestyleManager::Singleton(SingletonLifestyle::new()),
            Lifestyle::Thread => LifestyleManager::Thread(ThreadLifestyle::new()),
            Lifestyle::Scope => LifestyleManager::Scope(ScopeLifestyle::new()),
            Lifestyle::Pooled => LifestyleManager::Pooled(PooledLifestyle::new(model, config)),
            Lifestyle::Custom => match model.custom.clone() {
                Some(manager) => LifestyleManager::Custom(manager),
                // Model validation rejects custom lifestyles without a manager
                None => LifestyleManager::Transient,
            },
        }
    }

    pub(crate) fn resolve(
        &self,
        handler: &Arc<Handler>,
        kernel: &KernelInner,
        ctx: &mut CreationContext,
    ) -> KernelResult<Resolved> {
        match self {
            LifestyleManager::Transient => {
                let burden = activator::create(handler, kernel, ctx)?;
                let instance = burden.instance.clone();
                let burden = kernel.burdens.commit(burden);
                Ok(Resolved { instance, burden })
            }
            LifestyleManager::Singleton(singleton) => {
                singleton.resolve(handler, kernel, ctx).map(Resolved::shared)
            }
            LifestyleManager::Thread(thread) => thread.resolve(handler, kernel, ctx).map(Resolved::shared),
            LifestyleManager::Scope(scope) => scope.resolve(handler, kernel, ctx).map(Resolved::shared),
            LifestyleManager::Pooled(pooled) => pooled.resolve(handler, kernel, ctx).map(Resolved::shared),
            LifestyleManager::Custom(manager) => {
                let mut create = || create_tracked(handler, kernel, ctx, true);
                manager.resolve(&mut create).map(Resolved::shared)
            }
        }
    }

    /// Handles an external release request for a tracked instance.
    ///
    /// Returns `true` when the kernel should decommission the instance now.
    /// Shared lifestyles ignore external requests.
    pub(crate) fn release(&self, kernel: &KernelInner, instance: InstanceId) -> bool {
        match self {
            LifestyleManager::Transient => true,
            LifestyleManager::Singleton(_) | LifestyleManager::Thread(_) | LifestyleManager::Scope(_) => false,
            LifestyleManager::Pooled(pooled) => {
                pooled.release(kernel, instance);
                false
            }
            LifestyleManager::Custom(manager) => manager.release(instance),
        }
    }

    /// Drops cached instances at kernel disposal.
    ///
    /// Tracked burdens are torn down by the kernel; this only clears caches
    /// and tears down instances the kernel does not track.
    pub(crate) fn dispose(&self, kernel: &KernelInner) {
        match self {
            LifestyleManager::Transient => {}
            LifestyleManager::Singleton(singleton) => singleton.dispose(),
            LifestyleManager::Thread(thread) => thread.dispose(),
            LifestyleManager::Scope(scope) => scope.dispose(),
            LifestyleManager::Pooled(pooled) => pooled.dispose(kernel),
            LifestyleManager::Custom(manager) => manager.dispose(),
        }
    }

    pub(crate) fn lifestyle(&self) -> Lifestyle {
        match self {
            LifestyleManager::Transient => Lifestyle::Transient,
            LifestyleManager::Singleton(_) => Lifestyle::Singleton,
            LifestyleManager::Thread(_) => Lifestyle::Thread,
            LifestyleManager::Scope(_) => Lifestyle::Scope,
            LifestyleManager::Pooled(_) => Lifestyle::Pooled,
            LifestyleManager::Custom(_) => Lifestyle::Custom,
        }
    }
}

/// Creates an instance whose burden is tracked top-level, as shared
/// lifestyles need. `force` tracks it even without anything to decommission.
pub(crate) fn create_tracked(
    handler: &Arc<Handler>,
    kernel: &KernelInner,
    ctx: &mut CreationContext,
    force: bool,
) -> KernelResult<Instance> {
    let burden = activator::create(handler, kernel, ctx)?;
    let instance = burden.instance.clone();
    kernel.commit_shared(burden, force)?;
    Ok(instance)
}
