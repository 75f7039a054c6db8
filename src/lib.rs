//! # ferrous-kernel
//!
//! Lifestyle-aware component kernel for dependency injection.
//!
//! Given immutable component models (a service, the factory for its
//! implementation, its constructor dependencies and a lifestyle), the kernel
//! produces instances on demand, honors each lifestyle's sharing contract and
//! tears down exactly the instances a released root exclusively owns.
//!
//! ## Features
//!
//! - **Lifestyles**: Transient, Singleton, per-Thread, per-Scope, Pooled and Custom
//! - **Ordered decommissioning**: releasing a root tears down its owned transient
//!   dependencies first, never shared ones
//! - **Idempotent release**: double or foreign releases are silently ignored
//! - **Bounded pools**: lazy fill, borrow/return, block or fail when exhausted
//! - **Circular dependency detection**: errors carry the full path
//! - **Thread-safe**: no global lock on the resolution path
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_kernel::{ComponentModel, KernelBuilder};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut builder = KernelBuilder::new();
//! builder.add_singleton_instance(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! builder.register(
//!     ComponentModel::builder::<UserService>()
//!         .transient()
//!         .depends_on::<Database>()
//!         .create(|deps| UserService { db: deps.get_required::<Database>() })
//!         .build()
//!         .unwrap(),
//! );
//!
//! let kernel = builder.build();
//! let user_service = kernel.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! kernel.release(&user_service);
//! ```
//!
//! ## Pooled Components
//!
//! ```rust
//! use ferrous_kernel::{ComponentModel, ExhaustionPolicy, KernelBuilder, KernelError, PoolSizing};
//! use std::sync::Arc;
//!
//! struct Connection;
//!
//! let mut builder = KernelBuilder::new();
//! builder.register(
//!     ComponentModel::builder::<Connection>()
//!         .pool(PoolSizing::new(1, 2).with_exhaustion(ExhaustionPolicy::Fail))
//!         .create(|_| Connection)
//!         .build()
//!         .unwrap(),
//! );
//! let kernel = builder.build();
//!
//! let a = kernel.get::<Connection>().unwrap();
//! let b = kernel.get::<Connection>().unwrap();
//! assert!(matches!(kernel.get::<Connection>(), Err(KernelError::PoolExhausted { .. })));
//!
//! kernel.release(&a);
//! let c = kernel.get::<Connection>().unwrap();
//! assert!(Arc::ptr_eq(&a, &c));
//! # kernel.release(&b);
//! ```

use std::any::Any;
use std::sync::Arc;

// Module declarations
pub mod builder;
pub mod config;
pub mod error;
pub mod kernel;
pub mod key;
pub mod lifestyle;
pub mod metrics;
pub mod model;
pub mod observer;
pub mod registration;
pub mod resolver;
pub mod traits;

// Internal modules
mod activator;
mod handler;
mod internal;
mod pool;
mod release_policy;

/// Type-erased component instance.
///
/// Identity is the allocation; see [`InstanceId`].
pub type Instance = Arc<dyn Any + Send + Sync>;

// Re-export core types
pub use builder::KernelBuilder;
pub use config::{ExhaustionPolicy, KernelConfig, PoolConfig};
pub use error::{BoxError, KernelError, KernelResult};
pub use kernel::{Kernel, RequestScope, ScopeGuard};
pub use key::{service_of, InstanceId, ServiceId};
pub use lifestyle::Lifestyle;
pub use metrics::MetricsSnapshot;
pub use model::{ComponentModel, Dependency, ModelBuilder, PoolSizing};
pub use observer::{KernelObserver, TracingObserver};
pub use registration::ModelRegistry;
pub use resolver::ResolvedDependencies;
pub use traits::{
    ComponentFactory, CustomLifestyle, Dispose, EvictionCallback, LifetimeScope, MetadataProvider,
    ScopeAccessor, ScopeId,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn typed_resolution_mismatch_is_reported() {
        let mut builder = KernelBuilder::new();
        builder.register(
            ComponentModel::raw(ServiceId::Named("port"), "u16")
                .transient()
                .factory(Arc::new(PortFactory))
                .build()
                .unwrap(),
        );
        let kernel = builder.build();

        assert_eq!(*kernel.get_named::<u16>("port").unwrap(), 8080);
        assert!(matches!(
            kernel.get_named::<String>("port"),
            Err(KernelError::TypeMismatch(ServiceId::Named("port")))
        ));
    }

    struct PortFactory;

    impl ComponentFactory for PortFactory {
        fn create(&self, _: &ResolvedDependencies) -> Result<Instance, BoxError> {
            Ok(Arc::new(8080u16))
        }
    }

    #[test]
    fn mismatched_typed_resolve_releases_instance() {
        static DESTROYED: AtomicUsize = AtomicUsize::new(0);

        struct Closable;

        let mut builder = KernelBuilder::new();
        builder.register(
            ComponentModel::builder::<Closable>()
                .named("closable")
                .transient()
                .create(|_| Closable)
                .on_destroy(|_| {
                    DESTROYED.fetch_add(1, Ordering::SeqCst);
                })
                .build()
                .unwrap(),
        );
        let kernel = builder.build();

        assert!(kernel.get_named::<u8>("closable").is_err());
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
        assert_eq!(kernel.tracked_count(), 0);
    }

    #[test]
    fn get_before_dispose_and_after() {
        let mut builder = KernelBuilder::new();
        builder.add_singleton(|_| 1u32);
        let kernel = builder.build();

        assert!(kernel.has_component(&service_of::<u32>()));
        assert_eq!(*kernel.get_required::<u32>(), 1);
        kernel.dispose();
        assert!(kernel.is_disposed());
        assert!(matches!(kernel.get::<u32>(), Err(KernelError::Disposed)));
    }
}
