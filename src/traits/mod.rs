//! Collaborator traits consumed by the kernel.

mod dispose;
mod factory;
mod lifestyle;
mod scope;

pub use dispose::Dispose;
pub use factory::{ComponentFactory, MetadataProvider};
pub use lifestyle::CustomLifestyle;
pub use scope::{EvictionCallback, LifetimeScope, ScopeAccessor, ScopeId};
