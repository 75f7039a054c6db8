//! Diagnostic observers for kernel events.
//!
//! Observers are called synchronously on the resolving or releasing thread.
//! Keep implementations lightweight.

use std::sync::Arc;
use std::time::Duration;

use crate::key::{InstanceId, ServiceId};

/// Observer trait for resolution and decommission events.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ComponentModel, InstanceId, KernelBuilder, KernelObserver, ServiceId};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     created: AtomicUsize,
/// }
///
/// impl KernelObserver for CountingObserver {
///     fn resolving(&self, _service: &ServiceId) {}
///     fn resolved(&self, _service: &ServiceId, _duration: Duration) {}
///     fn instance_created(&self, _service: &ServiceId, _instance: InstanceId) {
///         self.created.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// struct Widget;
///
/// let observer = Arc::new(CountingObserver::default());
/// let mut builder = KernelBuilder::new();
/// builder.add_transient(|_| Widget);
/// builder.observer(observer.clone());
/// let kernel = builder.build();
///
/// kernel.get::<Widget>().unwrap();
/// kernel.get::<Widget>().unwrap();
/// assert_eq!(observer.created.load(Ordering::SeqCst), 2);
/// ```
pub trait KernelObserver: Send + Sync {
    /// A root `resolve` call is starting.
    fn resolving(&self, service: &ServiceId);

    /// A root `resolve` call returned an instance.
    fn resolved(&self, service: &ServiceId, duration: Duration);

    /// A component factory produced a new instance.
    fn instance_created(&self, _service: &ServiceId, _instance: InstanceId) {}

    /// An instance was decommissioned.
    fn instance_destroyed(&self, _service: &ServiceId, _instance: InstanceId) {}
}

/// Registered observers. Empty by default; every call is a no-op then.
#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn KernelObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn KernelObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, service: &ServiceId) {
        for observer in &self.observers {
            observer.resolving(service);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, service: &ServiceId, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(service, duration);
        }
    }

    #[inline]
    pub(crate) fn instance_created(&self, service: &ServiceId, instance: InstanceId) {
        for observer in &self.observers {
            observer.instance_created(service, instance);
        }
    }

    #[inline]
    pub(crate) fn instance_destroyed(&self, service: &ServiceId, instance: InstanceId) {
        for observer in &self.observers {
            observer.instance_destroyed(service, instance);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// Resolution events are emitted at `DEBUG`, lifecycle events at `TRACE`,
/// under the `ferrous_kernel::observer` target.
///
/// ```
/// use ferrous_kernel::{KernelBuilder, TracingObserver};
/// use std::sync::Arc;
///
/// let mut builder = KernelBuilder::new();
/// builder.observer(Arc::new(TracingObserver::new()));
/// let _kernel = builder.build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    label: Option<String>,
}

impl TracingObserver {
    /// Creates an observer with no label.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an observer that tags every event with `label`.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("kernel")
    }
}

impl KernelObserver for TracingObserver {
    fn resolving(&self, service: &ServiceId) {
        tracing::debug!(label = self.label(), service = %service, "resolving");
    }

    fn resolved(&self, service: &ServiceId, duration: Duration) {
        tracing::debug!(
            label = self.label(),
            service = %service,
            elapsed_us = duration.as_micros() as u64,
            "resolved"
        );
    }

    fn instance_created(&self, service: &ServiceId, instance: InstanceId) {
        tracing::trace!(label = self.label(), service = %service, instance = %instance, "instance created");
    }

    fn instance_destroyed(&self, service: &ServiceId, instance: InstanceId) {
        tracing::trace!(label = self.label(), service = %service, instance = %instance, "instance destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn tracing_observer_emits_resolution_events() {
        let mut observers = Observers::default();
        observers.add(Arc::new(TracingObserver::with_label("unit")));
        assert!(observers.has_observers());

        let service = ServiceId::Named("mailer");
        observers.resolving(&service);
        observers.resolved(&service, Duration::from_micros(42));

        assert!(logs_contain("resolving"));
        assert!(logs_contain("mailer"));
        assert!(logs_contain("elapsed_us=42"));
    }
}
