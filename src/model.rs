//! Component models: immutable registration records.
//!
//! A [`ComponentModel`] pairs a service with the factory that builds its
//! implementation, the lifestyle that governs sharing, and the ordered list of
//! dependencies the factory expects. Models are built with [`ModelBuilder`] and
//! never change once handed to a kernel.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::ExhaustionPolicy;
use crate::error::{BoxError, KernelError, KernelResult};
use crate::key::{service_of, ServiceId};
use crate::lifestyle::Lifestyle;
use crate::resolver::ResolvedDependencies;
use crate::traits::{ComponentFactory, CustomLifestyle, Dispose};
use crate::Instance;

/// One constructor dependency of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// Service the dependency resolves to
    pub service: ServiceId,
    /// Whether resolution fails when the service is not registered
    pub required: bool,
}

impl Dependency {
    /// A dependency that must be registered.
    pub fn required(service: ServiceId) -> Self {
        Self { service, required: true }
    }

    /// A dependency that is skipped when not registered.
    pub fn optional(service: ServiceId) -> Self {
        Self { service, required: false }
    }
}

/// Pool bounds of a pooled component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    /// Instances created when the pool is first used
    pub initial_size: usize,
    /// Upper bound on idle plus borrowed instances
    pub max_size: usize,
    /// Overrides the kernel's exhaustion policy when set
    pub exhaustion: Option<ExhaustionPolicy>,
}

impl PoolSizing {
    /// Sizing with the kernel's exhaustion policy.
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            initial_size,
            max_size,
            exhaustion: None,
        }
    }

    /// Sets the policy used when every instance is borrowed.
    pub fn with_exhaustion(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion = Some(policy);
        self
    }
}

/// Immutable registration metadata for one service/implementation pairing.
pub struct ComponentModel {
    pub(crate) service: ServiceId,
    pub(crate) implementation: &'static str,
    pub(crate) lifestyle: Lifestyle,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) pool: Option<PoolSizing>,
    pub(crate) decommission: bool,
    pub(crate) factory: Arc<dyn ComponentFactory>,
    pub(crate) custom: Option<Arc<dyn CustomLifestyle>>,
}

impl ComponentModel {
    /// Starts a model for implementation type `T`, registered as service `T`.
    ///
    /// The lifestyle defaults to [`Lifestyle::Singleton`].
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_kernel::{ComponentModel, KernelBuilder};
    /// use std::sync::Arc;
    ///
    /// struct Settings { url: &'static str }
    /// struct Repository { settings: Arc<Settings> }
    ///
    /// let settings = ComponentModel::builder::<Settings>()
    ///     .create(|_| Settings { url: "postgres://localhost" })
    ///     .build()
    ///     .unwrap();
    /// let repository = ComponentModel::builder::<Repository>()
    ///     .transient()
    ///     .depends_on::<Settings>()
    ///     .create(|deps| Repository { settings: deps.get_required::<Settings>() })
    ///     .build()
    ///     .unwrap();
    ///
    /// let mut builder = KernelBuilder::new();
    /// builder.register(settings).register(repository);
    /// let kernel = builder.build();
    ///
    /// let repo = kernel.get::<Repository>().unwrap();
    /// assert_eq!(repo.settings.url, "postgres://localhost");
    /// ```
    pub fn builder<T: Send + Sync + 'static>() -> ModelBuilder<T> {
        ModelBuilder::new(service_of::<T>(), std::any::type_name::<T>())
    }

    /// Starts an untyped model whose instances come from an external
    /// [`ComponentFactory`].
    pub fn raw(service: ServiceId, implementation: &'static str) -> ModelBuilder<()> {
        ModelBuilder::new(service, implementation)
    }

    /// Service this model is registered under.
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Implementation name, for diagnostics.
    pub fn implementation(&self) -> &'static str {
        self.implementation
    }

    /// Sharing policy.
    pub fn lifestyle(&self) -> Lifestyle {
        self.lifestyle
    }

    /// Constructor dependencies in declaration order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Explicit pool bounds, if any.
    pub fn pool_sizing(&self) -> Option<PoolSizing> {
        self.pool
    }

    /// Whether the implementation declares a disposal contract.
    pub fn has_decommission(&self) -> bool {
        self.decommission
    }

    pub(crate) fn factory(&self) -> &dyn ComponentFactory {
        self.factory.as_ref()
    }

    /// Model for `T` with no dependencies and no teardown. Always valid for
    /// lifestyles that need no extra configuration.
    pub(crate) fn from_fn<T, F>(lifestyle: Lifestyle, create: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> T + Send + Sync + 'static,
    {
        debug_assert!(!matches!(lifestyle, Lifestyle::Pooled | Lifestyle::Custom));
        ComponentModel {
            service: service_of::<T>(),
            implementation: std::any::type_name::<T>(),
            lifestyle,
            dependencies: Vec::new(),
            pool: None,
            decommission: false,
            factory: Arc::new(FnFactory::<T> {
                create: Arc::new(move |deps: &ResolvedDependencies| -> Result<T, BoxError> { Ok(create(deps)) }),
                destroy: None,
            }),
            custom: None,
        }
    }

    /// Singleton model handing out an existing value.
    pub(crate) fn from_instance<T: Send + Sync + 'static>(value: T) -> Self {
        ComponentModel {
            service: service_of::<T>(),
            implementation: std::any::type_name::<T>(),
            lifestyle: Lifestyle::Singleton,
            dependencies: Vec::new(),
            pool: None,
            decommission: false,
            factory: Arc::new(InstanceFactory(Arc::new(value))),
            custom: None,
        }
    }
}

impl fmt::Debug for ComponentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentModel")
            .field("service", &self.service)
            .field("implementation", &self.implementation)
            .field("lifestyle", &self.lifestyle)
            .field("dependencies", &self.dependencies)
            .field("pool", &self.pool)
            .field("decommission", &self.decommission)
            .finish_non_exhaustive()
    }
}

type CreateFn<T> = Arc<dyn Fn(&ResolvedDependencies) -> Result<T, BoxError> + Send + Sync>;
type DestroyFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Builder for [`ComponentModel`].
///
/// Typed builders (from [`ComponentModel::builder`]) take closures producing
/// `T`; untyped ones (from [`ComponentModel::raw`]) take a [`ComponentFactory`].
pub struct ModelBuilder<T> {
    service: ServiceId,
    implementation: &'static str,
    lifestyle: Lifestyle,
    dependencies: Vec<Dependency>,
    pool: Option<PoolSizing>,
    factory: Option<Arc<dyn ComponentFactory>>,
    create: Option<CreateFn<T>>,
    destroy: Option<DestroyFn<T>>,
    decommission: Option<bool>,
    custom: Option<Arc<dyn CustomLifestyle>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ModelBuilder<T> {
    fn new(service: ServiceId, implementation: &'static str) -> Self {
        Self {
            service,
            implementation,
            lifestyle: Lifestyle::Singleton,
            dependencies: Vec::new(),
            pool: None,
            factory: None,
            create: None,
            destroy: None,
            decommission: None,
            custom: None,
            _marker: PhantomData,
        }
    }

    /// Registers the model under a named service instead of its type.
    pub fn named(mut self, name: &'static str) -> Self {
        self.service = ServiceId::Named(name);
        self
    }

    /// Registers the model under `service`.
    pub fn service(mut self, service: ServiceId) -> Self {
        self.service = service;
        self
    }

    pub fn lifestyle(mut self, lifestyle: Lifestyle) -> Self {
        self.lifestyle = lifestyle;
        self
    }

    pub fn transient(self) -> Self {
        self.lifestyle(Lifestyle::Transient)
    }

    pub fn singleton(self) -> Self {
        self.lifestyle(Lifestyle::Singleton)
    }

    /// One instance per thread.
    pub fn per_thread(self) -> Self {
        self.lifestyle(Lifestyle::Thread)
    }

    /// One instance per lifetime scope.
    pub fn scoped(self) -> Self {
        self.lifestyle(Lifestyle::Scope)
    }

    /// Pooled with explicit bounds.
    pub fn pooled(self, initial_size: usize, max_size: usize) -> Self {
        self.pool(PoolSizing::new(initial_size, max_size))
    }

    /// Pooled with explicit sizing.
    pub fn pool(mut self, sizing: PoolSizing) -> Self {
        self.lifestyle = Lifestyle::Pooled;
        self.pool = Some(sizing);
        self
    }

    /// Custom lifestyle driven by `manager`.
    pub fn custom_lifestyle(mut self, manager: Arc<dyn CustomLifestyle>) -> Self {
        self.lifestyle = Lifestyle::Custom;
        self.custom = Some(manager);
        self
    }

    /// Adds a required dependency on type `D`.
    pub fn depends_on<D: 'static>(self) -> Self {
        self.dependency(Dependency::required(service_of::<D>()))
    }

    /// Adds a required dependency on a named service.
    pub fn depends_on_named(self, name: &'static str) -> Self {
        self.dependency(Dependency::required(ServiceId::Named(name)))
    }

    /// Adds an optional dependency on type `D`.
    pub fn optional<D: 'static>(self) -> Self {
        self.dependency(Dependency::optional(service_of::<D>()))
    }

    /// Adds an optional dependency on a named service.
    pub fn optional_named(self, name: &'static str) -> Self {
        self.dependency(Dependency::optional(ServiceId::Named(name)))
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Uses an external factory to build instances.
    pub fn factory(mut self, factory: Arc<dyn ComponentFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Overrides whether the model has a disposal contract.
    ///
    /// Set automatically by [`on_destroy`](Self::on_destroy) and
    /// [`disposable`](Self::disposable). External factories must opt in.
    pub fn decommission(mut self, decommission: bool) -> Self {
        self.decommission = Some(decommission);
        self
    }
}

impl<T: Send + Sync + 'static> ModelBuilder<T> {
    /// Builds instances with an infallible closure.
    pub fn create<F>(mut self, create: F) -> Self
    where
        F: Fn(&ResolvedDependencies) -> T + Send + Sync + 'static,
    {
        self.create = Some(Arc::new(move |deps: &ResolvedDependencies| -> Result<T, BoxError> { Ok(create(deps)) }));
        self
    }

    /// Builds instances with a fallible closure.
    pub fn try_create<F>(mut self, create: F) -> Self
    where
        F: Fn(&ResolvedDependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.create = Some(Arc::new(create));
        self
    }

    /// Runs `destroy` when an instance is decommissioned.
    pub fn on_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(destroy));
        self
    }

    /// Calls [`Dispose::dispose`] when an instance is decommissioned.
    pub fn disposable(self) -> Self
    where
        T: Dispose,
    {
        self.on_destroy(|instance: &T| instance.dispose())
    }

    /// Validates and freezes the model.
    pub fn build(self) -> KernelResult<ComponentModel> {
        let service = self.service;
        let invalid = |reason| KernelError::InvalidModel { service, reason };

        let has_destroy = self.destroy.is_some();
        let factory: Arc<dyn ComponentFactory> = match (self.factory, self.create) {
            (Some(_), Some(_)) => return Err(invalid("both a factory and a create closure were given")),
            (Some(_), None) if has_destroy => {
                return Err(invalid("teardown closures need a typed create closure"))
            }
            (Some(factory), None) => factory,
            (None, Some(create)) => Arc::new(FnFactory {
                create,
                destroy: self.destroy,
            }),
            (None, None) => return Err(invalid("no factory")),
        };

        match (self.lifestyle, self.pool) {
            (Lifestyle::Pooled, Some(sizing)) => {
                if sizing.max_size == 0 {
                    return Err(invalid("pool max size must be at least 1"));
                }
                if sizing.initial_size > sizing.max_size {
                    return Err(invalid("pool initial size exceeds max size"));
                }
            }
            (Lifestyle::Pooled, None) => {}
            (_, Some(_)) => return Err(invalid("pool sizing on a non-pooled lifestyle")),
            _ => {}
        }

        let custom = match (self.lifestyle, self.custom) {
            (Lifestyle::Custom, Some(manager)) => Some(manager),
            (Lifestyle::Custom, None) => return Err(invalid("custom lifestyle without a manager")),
            _ => None,
        };

        Ok(ComponentModel {
            service,
            implementation: self.implementation,
            lifestyle: self.lifestyle,
            dependencies: self.dependencies,
            pool: self.pool,
            decommission: self.decommission.unwrap_or(has_destroy),
            factory,
            custom,
        })
    }
}

struct FnFactory<T> {
    create: CreateFn<T>,
    destroy: Option<DestroyFn<T>>,
}

impl<T: Send + Sync + 'static> ComponentFactory for FnFactory<T> {
    fn create(&self, dependencies: &ResolvedDependencies) -> Result<Instance, BoxError> {
        let value = (self.create)(dependencies)?;
        Ok(Arc::new(value))
    }

    fn tear_down(&self, instance: &Instance) {
        if let (Some(destroy), Some(typed)) = (&self.destroy, instance.downcast_ref::<T>()) {
            destroy(typed);
        }
    }
}

struct InstanceFactory(Instance);

impl ComponentFactory for InstanceFactory {
    fn create(&self, _dependencies: &ResolvedDependencies) -> Result<Instance, BoxError> {
        Ok(self.0.clone())
    }
}
