//! Disposal contract for component implementations.

/// Trait for synchronous resource disposal.
///
/// Implement this trait for components that need structured teardown (flushing
/// caches, closing connections). Register the model with
/// [`ModelBuilder::disposable`](crate::ModelBuilder::disposable) and the kernel
/// calls `dispose` exactly once when the instance is decommissioned.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ComponentModel, Dispose, KernelBuilder};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// static FLUSHED: AtomicBool = AtomicBool::new(false);
///
/// struct Cache;
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         FLUSHED.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let mut builder = KernelBuilder::new();
/// builder.register(ComponentModel::builder::<Cache>().create(|_| Cache).disposable().build().unwrap());
/// let kernel = builder.build();
///
/// let cache = kernel.get::<Cache>().unwrap();
/// kernel.release(&cache);
/// assert!(FLUSHED.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
