//! Cross-call wait tracking for shared-instance creation.
//!
//! A resolution that finds a singleton, scope slot or pool fill being built by
//! another resolution blocks until it is ready. Each blocked resolution waits
//! on exactly one owner, so the waits form a functional graph; a new wait that
//! would close a loop is a dependency cycle spread over several threads and is
//! refused instead of blocking.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::error::{KernelError, KernelResult};
use crate::internal::FastHashMap;
use crate::key::ServiceId;

/// Identity of one root `resolve` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResolutionId(u64);

struct Edge {
    owner: ResolutionId,
    /// Service the waiter is blocked on
    service: Option<ServiceId>,
}

pub(crate) struct WaitGraph {
    next: AtomicU64,
    edges: Mutex<FastHashMap<ResolutionId, Edge>>,
}

impl WaitGraph {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            edges: Mutex::new(FastHashMap::default()),
        }
    }

    pub(crate) fn next_id(&self) -> ResolutionId {
        ResolutionId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Records that `waiter`, currently building `path`, is about to block on
    /// the last service of `path`, which `owner` is building.
    ///
    /// Fails with `Circular` when `owner` is, directly or through other
    /// blocked resolutions, waiting on `waiter`. The path then runs through
    /// the waiter's own frames and every service the chain is blocked on.
    pub(crate) fn begin_wait(
        &self,
        waiter: ResolutionId,
        path: &[ServiceId],
        owner: ResolutionId,
    ) -> KernelResult<WaitEdge<'_>> {
        let service = path.last().copied();
        let mut edges = self.edges.lock();

        let mut cycle: Vec<ServiceId> = path.to_vec();
        let mut current = owner;
        // Bounded by the edge count: every node has at most one outgoing edge
        for _ in 0..=edges.len() {
            if current == waiter {
                tracing::debug!(
                    path = ?cycle,
                    "resolution would wait on itself through another thread"
                );
                return Err(KernelError::Circular(cycle));
            }
            match edges.get(&current) {
                Some(edge) => {
                    cycle.extend(edge.service);
                    current = edge.owner;
                }
                None => break,
            }
        }

        edges.insert(waiter, Edge { owner, service });
        Ok(WaitEdge { graph: self, waiter })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.edges.lock().len()
    }
}

/// A registered wait; removed from the graph on drop.
pub(crate) struct WaitEdge<'a> {
    graph: &'a WaitGraph,
    waiter: ResolutionId,
}

impl Drop for WaitEdge<'_> {
    fn drop(&mut self) {
        self.graph.edges.lock().remove(&self.waiter);
    }
}

/// A resolution's identity and current path, detached from its
/// `CreationContext` so it can be held while the context is borrowed.
pub(crate) struct Waiter<'a> {
    graph: &'a WaitGraph,
    id: ResolutionId,
    path: SmallVec<[ServiceId; 8]>,
}

impl<'a> Waiter<'a> {
    pub(crate) fn new(graph: &'a WaitGraph, id: ResolutionId, path: &[ServiceId]) -> Self {
        Self {
            graph,
            id,
            path: SmallVec::from_slice(path),
        }
    }

    pub(crate) fn id(&self) -> ResolutionId {
        self.id
    }

    pub(crate) fn wait_for(&self, owner: ResolutionId) -> KernelResult<WaitEdge<'a>> {
        self.graph.begin_wait(self.id, &self.path, owner)
    }
}
