//! Error types for the component kernel.

use thiserror::Error;

use crate::key::ServiceId;

/// Boxed error returned by component factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kernel errors
///
/// Represents the conditions under which [`Kernel::resolve`](crate::Kernel::resolve)
/// can fail. Releasing an instance never fails.
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{KernelBuilder, KernelError};
///
/// struct Unregistered;
///
/// let kernel = KernelBuilder::new().build();
/// match kernel.get::<Unregistered>() {
///     Err(KernelError::ComponentNotFound(service)) => {
///         assert!(service.display_name().ends_with("Unregistered"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Error)]
pub enum KernelError {
    /// The requested service has no registered component
    #[error("No component registered for service {0}")]
    ComponentNotFound(ServiceId),

    /// A required dependency has no registered component
    #[error("Component {requester} requires {missing}, which is not registered")]
    Resolution {
        /// Service of the model whose dependency could not be satisfied
        requester: ServiceId,
        /// The missing service
        missing: ServiceId,
    },

    /// A service was encountered twice on the same resolution path
    #[error("Circular dependency: {}", format_path(.0))]
    Circular(Vec<ServiceId>),

    /// The component factory failed to build an instance
    #[error("Failed to activate {model} ({implementation}): {source}")]
    Activation {
        /// Service of the failing model
        model: ServiceId,
        /// Implementation name of the failing model
        implementation: &'static str,
        /// Error reported by the factory
        #[source]
        source: BoxError,
    },

    /// A pool with the `Fail` exhaustion policy had no capacity left
    #[error("Pool for {service} is exhausted ({max_size} instances in use)")]
    PoolExhausted {
        /// Pooled service
        service: ServiceId,
        /// Configured pool capacity
        max_size: usize,
    },

    /// A scope-lifestyle component was requested outside of any scope
    #[error("No active scope to resolve scoped component {0}")]
    NoActiveScope(ServiceId),

    /// Typed resolution returned an instance of a different type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(ServiceId),

    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),

    /// A component model failed validation
    #[error("Invalid model for {service}: {reason}")]
    InvalidModel {
        /// Service of the rejected model
        service: ServiceId,
        /// What is wrong with it
        reason: &'static str,
    },

    /// The kernel has been disposed
    #[error("Kernel has been disposed")]
    Disposed,
}

fn format_path(path: &[ServiceId]) -> String {
    path.iter()
        .map(|s| s.display_name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for kernel operations
///
/// A convenience alias for `Result<T, KernelError>`.
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{KernelResult, KernelError};
///
/// fn failing_operation() -> KernelResult<()> {
///     Err(KernelError::Disposed)
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ServiceId;

    #[test]
    fn circular_path_is_joined() {
        let err = KernelError::Circular(vec![
            ServiceId::Named("a"),
            ServiceId::Named("b"),
            ServiceId::Named("a"),
        ]);
        assert_eq!(err.to_string(), "Circular dependency: a -> b -> a");
    }

    #[test]
    fn activation_keeps_source() {
        use std::error::Error as _;

        let err = KernelError::Activation {
            model: ServiceId::Named("db"),
            implementation: "PgConnection",
            source: "refused".into(),
        };
        assert!(err.to_string().contains("PgConnection"));
        assert_eq!(err.source().map(|s| s.to_string()), Some("refused".to_string()));
    }
}
