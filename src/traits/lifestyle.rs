//! Extension point for lifestyles the kernel does not ship.

use crate::error::KernelResult;
use crate::key::InstanceId;
use crate::Instance;

/// Strategy for a `Custom` lifestyle.
///
/// The kernel calls `resolve` with a `create` callback that activates and
/// tracks a fresh instance; the strategy decides whether to call it or hand
/// out something it already holds. `release` answers whether an external
/// release request should really tear the instance down.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ComponentModel, CustomLifestyle, Instance, InstanceId, KernelBuilder, KernelResult};
/// use parking_lot::Mutex;
/// use std::sync::Arc;
///
/// /// Hands out the same instance until it is released once.
/// #[derive(Default)]
/// struct UntilReleased {
///     current: Mutex<Option<Instance>>,
/// }
///
/// impl CustomLifestyle for UntilReleased {
///     fn resolve(&self, create: &mut dyn FnMut() -> KernelResult<Instance>) -> KernelResult<Instance> {
///         let mut current = self.current.lock();
///         if let Some(instance) = current.as_ref() {
///             return Ok(instance.clone());
///         }
///         let instance = create()?;
///         *current = Some(instance.clone());
///         Ok(instance)
///     }
///
///     fn release(&self, instance: InstanceId) -> bool {
///         let mut current = self.current.lock();
///         match current.as_ref() {
///             Some(held) if InstanceId::of(held) == instance => {
///                 *current = None;
///                 true
///             }
///             _ => false,
///         }
///     }
/// }
///
/// struct Token;
///
/// let model = ComponentModel::builder::<Token>()
///     .create(|_| Token)
///     .custom_lifestyle(Arc::new(UntilReleased::default()))
///     .build()
///     .unwrap();
/// let mut builder = KernelBuilder::new();
/// builder.register(model);
/// let kernel = builder.build();
///
/// let a = kernel.get::<Token>().unwrap();
/// let b = kernel.get::<Token>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub trait CustomLifestyle: Send + Sync {
    /// Returns an instance, calling `create` when a new one is needed.
    fn resolve(&self, create: &mut dyn FnMut() -> KernelResult<Instance>) -> KernelResult<Instance>;

    /// Returns `true` when the instance should be decommissioned now.
    fn release(&self, instance: InstanceId) -> bool;

    /// Drops whatever the strategy caches. Teardown is done by the kernel.
    fn dispose(&self) {}
}
