//! Internal implementation details.

pub(crate) mod burden;
pub(crate) mod circular;
pub(crate) mod waits;

pub(crate) use burden::{Burden, BurdenArena, BurdenId, ChildLink};
pub(crate) use circular::CreationContext;
pub(crate) use waits::{ResolutionId, WaitGraph, Waiter};

#[cfg(feature = "ahash")]
pub(crate) type BuildHasher = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
pub(crate) type BuildHasher = std::collections::hash_map::RandomState;

pub(crate) type FastHashMap<K, V> = std::collections::HashMap<K, V, BuildHasher>;
pub(crate) type FastDashMap<K, V> = dashmap::DashMap<K, V, BuildHasher>;
