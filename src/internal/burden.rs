//! Ownership records for created instances.
//!
//! Every instance the activator builds gets a [`Burden`]: the instance itself,
//! the handler that built it, and the dependencies it exclusively owns. Burdens
//! that have something to decommission live in a [`BurdenArena`] keyed by
//! opaque ids, so parents refer to children by id and teardown can walk the
//! graph with an explicit stack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::handler::Handler;
use crate::internal::FastDashMap;
use crate::key::InstanceId;
use crate::Instance;

/// Opaque arena key. Ids grow with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BurdenId(u64);

impl BurdenId {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        BurdenId(raw)
    }
}

/// How a consumer relates to one of its resolved dependencies.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ChildLink {
    /// Transient dependency, torn down with the consumer. `None` when the
    /// dependency had nothing to decommission.
    Owned(Option<BurdenId>),
    /// Pooled dependency, handed back to its pool when the consumer goes.
    Returned(InstanceId),
    /// Singleton, thread, scope or custom dependency: referenced, never owned.
    Shared,
}

pub(crate) struct Burden {
    pub(crate) instance: Instance,
    pub(crate) handler: Arc<Handler>,
    pub(crate) owned: SmallVec<[BurdenId; 4]>,
    pub(crate) returns: SmallVec<[InstanceId; 2]>,
    pub(crate) requires_decommission: bool,
}

impl Burden {
    pub(crate) fn new<I>(instance: Instance, handler: Arc<Handler>, links: I) -> Self
    where
        I: IntoIterator<Item = ChildLink>,
    {
        let mut owned = SmallVec::new();
        let mut returns = SmallVec::new();
        for link in links {
            match link {
                ChildLink::Owned(Some(child)) => owned.push(child),
                ChildLink::Returned(instance) => returns.push(instance),
                ChildLink::Owned(None) | ChildLink::Shared => {}
            }
        }

        let requires_decommission =
            handler.model.has_decommission() || !owned.is_empty() || !returns.is_empty();

        Self {
            instance,
            handler,
            owned,
            returns,
            requires_decommission,
        }
    }

    pub(crate) fn instance_id(&self) -> InstanceId {
        InstanceId::of(&self.instance)
    }
}

/// Live burdens, keyed by id.
pub(crate) struct BurdenArena {
    nodes: FastDashMap<BurdenId, Burden>,
    next: AtomicU64,
}

impl BurdenArena {
    pub(crate) fn new() -> Self {
        Self {
            nodes: FastDashMap::default(),
            next: AtomicU64::new(1),
        }
    }

    /// Stores `burden` if it has anything to decommission and returns its id.
    /// Burdens with nothing to do are dropped here.
    pub(crate) fn commit(&self, burden: Burden) -> Option<BurdenId> {
        if !burden.requires_decommission {
            return None;
        }
        Some(self.insert(burden))
    }

    /// Stores `burden` unconditionally.
    pub(crate) fn insert(&self, burden: Burden) -> BurdenId {
        let id = BurdenId(self.next.fetch_add(1, Ordering::Relaxed));
        self.nodes.insert(id, burden);
        id
    }

    /// Removes the burden. Whoever gets `Some` back is the one that tears it down.
    pub(crate) fn take(&self, id: BurdenId) -> Option<Burden> {
        self.nodes.remove(&id).map(|(_, burden)| burden)
    }

    pub(crate) fn handler_of(&self, id: BurdenId) -> Option<Arc<Handler>> {
        self.nodes.get(&id).map(|node| node.handler.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
