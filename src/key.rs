//! Service and instance identity.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Identity of a service in the kernel.
///
/// Component models are registered and looked up by `ServiceId`. Concrete
/// types use their `TypeId`; named services let several components share one
/// implementation type or be addressed without a Rust type at hand.
///
/// # Examples
///
/// ```rust
/// use ferrous_kernel::{service_of, ServiceId};
///
/// struct Database;
///
/// let by_type = service_of::<Database>();
/// assert!(by_type.display_name().ends_with("Database"));
/// assert_eq!(by_type.service_name(), None);
///
/// let by_name = ServiceId::Named("primary-db");
/// assert_eq!(by_name.display_name(), "primary-db");
/// assert_eq!(by_name.service_name(), Some("primary-db"));
/// ```
#[derive(Debug, Clone, Copy)]
pub enum ServiceId {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Service addressed by name only
    Named(&'static str),
}

impl ServiceId {
    /// Get the type or service name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceId::Type(_, name) => name,
            ServiceId::Named(name) => name,
        }
    }

    /// Get the service name for named services, or None for type keys
    pub fn service_name(&self) -> Option<&'static str> {
        match self {
            ServiceId::Type(_, _) => None,
            ServiceId::Named(name) => Some(name),
        }
    }
}

// TypeId-only comparison for type keys; the name is diagnostic
impl PartialEq for ServiceId {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ServiceId::Type(a, _), ServiceId::Type(b, _)) => a == b,
            (ServiceId::Named(a), ServiceId::Named(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ServiceId {}

impl std::hash::Hash for ServiceId {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            ServiceId::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            ServiceId::Named(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Helper for creating type keys
#[inline(always)]
pub fn service_of<T: 'static>() -> ServiceId {
    ServiceId::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Identity of a live instance: the address of its shared allocation.
///
/// Every `Arc` pointing at the same allocation has the same `InstanceId`,
/// whether it is the type-erased [`Instance`](crate::Instance) the kernel keeps
/// or an `Arc<T>` obtained by downcasting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    /// Identity of the allocation behind `instance`.
    #[inline]
    pub fn of<T: ?Sized>(instance: &Arc<T>) -> Self {
        InstanceId(Arc::as_ptr(instance).cast::<()>() as usize)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::collections::HashSet;

    #[test]
    fn type_keys_ignore_name() {
        let a = ServiceId::Type(TypeId::of::<u32>(), "u32");
        let b = ServiceId::Type(TypeId::of::<u32>(), "renamed");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn named_and_type_never_equal() {
        assert_ne!(ServiceId::Named("u32"), service_of::<u32>());
    }

    #[test]
    fn instance_id_survives_downcast() {
        let erased: Arc<dyn Any + Send + Sync> = Arc::new(7u64);
        let id = InstanceId::of(&erased);
        let typed = erased.clone().downcast::<u64>().unwrap();
        assert_eq!(InstanceId::of(&typed), id);

        let other: Arc<dyn Any + Send + Sync> = Arc::new(7u64);
        assert_ne!(InstanceId::of(&other), id);
    }
}
