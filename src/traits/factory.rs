//! Raw construction and metadata collaborators.

use std::sync::Arc;

use crate::error::BoxError;
use crate::key::ServiceId;
use crate::model::ComponentModel;
use crate::resolver::ResolvedDependencies;
use crate::Instance;

/// Builds raw component instances from already-resolved dependencies.
///
/// The kernel never inspects implementation types itself: it resolves the
/// model's dependencies, hands them to the factory and tracks whatever comes
/// back. `tear_down` is invoked only for models that declare a disposal
/// contract, at most once per instance.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{BoxError, ComponentFactory, ComponentModel, Instance, KernelBuilder, ResolvedDependencies, ServiceId};
/// use std::sync::Arc;
///
/// struct Greeting(String);
///
/// struct GreetingFactory;
///
/// impl ComponentFactory for GreetingFactory {
///     fn create(&self, _deps: &ResolvedDependencies) -> Result<Instance, BoxError> {
///         Ok(Arc::new(Greeting("hello".to_string())))
///     }
/// }
///
/// let model = ComponentModel::raw(ServiceId::Named("greeting"), "Greeting")
///     .factory(Arc::new(GreetingFactory))
///     .build()
///     .unwrap();
///
/// let mut builder = KernelBuilder::new();
/// builder.register(model);
/// let kernel = builder.build();
/// let greeting = kernel.get_named::<Greeting>("greeting").unwrap();
/// assert_eq!(greeting.0, "hello");
/// ```
pub trait ComponentFactory: Send + Sync {
    /// Creates a new raw instance.
    fn create(&self, dependencies: &ResolvedDependencies) -> Result<Instance, BoxError>;

    /// Tears down an instance previously returned by `create`.
    fn tear_down(&self, _instance: &Instance) {}
}

/// Read-only source of component models.
///
/// Discovery and registration happen outside the kernel; the resolution path
/// only ever asks for the model of a service.
pub trait MetadataProvider: Send + Sync {
    /// Returns the model registered for `service`.
    fn model(&self, service: &ServiceId) -> Option<Arc<ComponentModel>>;

    /// All registered models, for diagnostics.
    fn models(&self) -> Vec<Arc<ComponentModel>>;
}
