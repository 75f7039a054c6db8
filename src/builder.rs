//! Kernel builder.
//!
//! Collects component models and ambient settings, then freezes them into a
//! [`Kernel`]. Registration happens here only; a built kernel never changes
//! its models.

use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelResult;
use crate::kernel::Kernel;
use crate::lifestyle::Lifestyle;
use crate::model::ComponentModel;
use crate::observer::{KernelObserver, Observers};
use crate::registration::ModelRegistry;
use crate::resolver::ResolvedDependencies;
use crate::traits::ScopeAccessor;

/// Builder for [`Kernel`].
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{ComponentModel, KernelBuilder};
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Client { config: Arc<Config> }
///
/// let mut builder = KernelBuilder::new();
/// builder.add_singleton_instance(Config { url: "https://example.test".to_string() });
/// builder.register(
///     ComponentModel::builder::<Client>()
///         .transient()
///         .depends_on::<Config>()
///         .create(|deps| Client { config: deps.get_required::<Config>() })
///         .build()
///         .unwrap(),
/// );
///
/// let kernel = builder.build();
/// assert_eq!(kernel.get_required::<Client>().config.url, "https://example.test");
/// ```
pub struct KernelBuilder {
    registry: ModelRegistry,
    observers: Observers,
    config: KernelConfig,
    scope_accessor: Option<Arc<dyn ScopeAccessor>>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            registry: ModelRegistry::new(),
            observers: Observers::default(),
            config: KernelConfig::default(),
            scope_accessor: None,
        }
    }

    /// Registers a model, replacing any earlier model for the same service.
    pub fn register(&mut self, model: ComponentModel) -> &mut Self {
        tracing::trace!(
            service = %model.service(),
            implementation = model.implementation(),
            lifestyle = ?model.lifestyle(),
            "component registered"
        );
        self.registry.insert(model);
        self
    }

    /// Registers an already-built value as a singleton.
    pub fn add_singleton_instance<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.register(ComponentModel::from_instance(value))
    }

    /// Registers `T` as a singleton built by `create`.
    pub fn add_singleton<T, F>(&mut self, create: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> T + Send + Sync + 'static,
    {
        self.register(ComponentModel::from_fn(Lifestyle::Singleton, create))
    }

    /// Registers `T` as transient, built by `create` on every resolve.
    pub fn add_transient<T, F>(&mut self, create: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> T + Send + Sync + 'static,
    {
        self.register(ComponentModel::from_fn(Lifestyle::Transient, create))
    }

    /// Registers `T` with one instance per thread.
    pub fn add_thread<T, F>(&mut self, create: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> T + Send + Sync + 'static,
    {
        self.register(ComponentModel::from_fn(Lifestyle::Thread, create))
    }

    /// Registers `T` with one instance per lifetime scope.
    pub fn add_scoped<T, F>(&mut self, create: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> T + Send + Sync + 'static,
    {
        self.register(ComponentModel::from_fn(Lifestyle::Scope, create))
    }

    /// Registers `T` as pooled with the given bounds.
    ///
    /// # Errors
    ///
    /// `InvalidModel` when `max_size` is zero or below `initial_size`.
    pub fn add_pooled<T, F>(&mut self, initial_size: usize, max_size: usize, create: F) -> KernelResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> T + Send + Sync + 'static,
    {
        let model = ComponentModel::builder::<T>()
            .pooled(initial_size, max_size)
            .create(create)
            .build()?;
        Ok(self.register(model))
    }

    /// Adds an observer for resolution and lifecycle events.
    pub fn observer(&mut self, observer: Arc<dyn KernelObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    pub fn config(&mut self, config: KernelConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Supplies the current scope instead of the kernel's per-thread stack.
    pub fn scope_accessor(&mut self, accessor: Arc<dyn ScopeAccessor>) -> &mut Self {
        self.scope_accessor = Some(accessor);
        self
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn build(self) -> Kernel {
        tracing::debug!(components = self.registry.len(), "building kernel");
        Kernel::from_parts(
            Arc::new(self.registry),
            self.config,
            self.observers,
            self.scope_accessor,
        )
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
