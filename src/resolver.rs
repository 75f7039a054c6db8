//! Dependency resolution for a single model.

use std::any::Any;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{KernelError, KernelResult};
use crate::internal::{ChildLink, CreationContext};
use crate::kernel::KernelInner;
use crate::key::{service_of, ServiceId};
use crate::model::ComponentModel;
use crate::Instance;

/// Dependency values handed to a component factory.
///
/// Holds one instance per distinct service the model declares, in declaration
/// order. Optional dependencies that are not registered are absent.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ComponentModel, KernelBuilder};
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Metrics;
/// struct Service { clock: Arc<Clock>, metrics: Option<Arc<Metrics>> }
///
/// let mut builder = KernelBuilder::new();
/// builder.add_singleton(|_| Clock);
/// builder.register(
///     ComponentModel::builder::<Service>()
///         .transient()
///         .depends_on::<Clock>()
///         .optional::<Metrics>()
///         .create(|deps| Service {
///             clock: deps.get_required::<Clock>(),
///             metrics: deps.get::<Metrics>(),
///         })
///         .build()
///         .unwrap(),
/// );
/// let kernel = builder.build();
///
/// let service = kernel.get::<Service>().unwrap();
/// assert!(service.metrics.is_none());
/// ```
#[derive(Clone, Default)]
pub struct ResolvedDependencies {
    entries: SmallVec<[(ServiceId, Instance); 4]>,
}

impl ResolvedDependencies {
    /// Number of resolved dependencies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `service` was resolved.
    pub fn contains(&self, service: &ServiceId) -> bool {
        self.entries.iter().any(|(s, _)| s == service)
    }

    /// The type-erased instance resolved for `service`.
    pub fn instance(&self, service: &ServiceId) -> Option<&Instance> {
        self.entries
            .iter()
            .find(|(s, _)| s == service)
            .map(|(_, instance)| instance)
    }

    /// The instance resolved for type `T`, if present and of that type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.downcast(&service_of::<T>())
    }

    /// The instance resolved for a named service, if present and of type `T`.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Option<Arc<T>> {
        self.downcast(&ServiceId::Named(name))
    }

    /// Like [`get`](Self::get) with an error describing what is wrong.
    pub fn try_get<T: Send + Sync + 'static>(&self) -> KernelResult<Arc<T>> {
        let service = service_of::<T>();
        let instance = self
            .instance(&service)
            .ok_or(KernelError::ComponentNotFound(service))?;
        instance
            .clone()
            .downcast::<T>()
            .map_err(|_| KernelError::TypeMismatch(service))
    }

    /// The instance resolved for type `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was not declared as a dependency, was optional and not
    /// registered, or resolved to a different type.
    pub fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.try_get::<T>()
            .unwrap_or_else(|e| panic!("Failed to read dependency {}: {}", std::any::type_name::<T>(), e))
    }

    /// Resolved `(service, instance)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&ServiceId, &Instance)> {
        self.entries.iter().map(|(s, i)| (s, i))
    }

    fn downcast<T: Send + Sync + 'static>(&self, service: &ServiceId) -> Option<Arc<T>> {
        let instance: Arc<dyn Any + Send + Sync> = self.instance(service)?.clone();
        instance.downcast::<T>().ok()
    }

    fn push(&mut self, service: ServiceId, instance: Instance) {
        self.entries.push((service, instance));
    }
}

/// Links from a consumer to the dependencies resolved for it.
pub(crate) type Links = SmallVec<[ChildLink; 4]>;

/// Resolves the dependencies of one model, in declaration order.
pub(crate) struct DependencyResolver;

impl DependencyResolver {
    /// Resolves every dependency of `model`.
    ///
    /// A service declared twice is resolved once and reused. On failure every
    /// dependency already resolved for this model is released before the error
    /// is returned.
    pub(crate) fn resolve(
        model: &ComponentModel,
        kernel: &KernelInner,
        ctx: &mut CreationContext,
    ) -> KernelResult<(ResolvedDependencies, Links)> {
        let mut resolved = ResolvedDependencies::default();
        let mut links = Links::new();

        for dependency in model.dependencies() {
            if resolved.contains(&dependency.service) {
                continue;
            }

            let handler = match kernel.handler(&dependency.service) {
                Some(handler) => handler,
                None if dependency.required => {
                    kernel.unwind(&links);
                    return Err(KernelError::Resolution {
                        requester: model.service(),
                        missing: dependency.service,
                    });
                }
                None => {
                    tracing::trace!(
                        requester = %model.service(),
                        dependency = %dependency.service,
                        "optional dependency not registered"
                    );
                    continue;
                }
            };

            match kernel.resolve_with(&handler, ctx) {
                Ok(child) => {
                    links.push(handler.link(&child));
                    resolved.push(dependency.service, child.instance);
                }
                Err(err) => {
                    kernel.unwind(&links);
                    return Err(err);
                }
            }
        }

        Ok((resolved, links))
    }
}
