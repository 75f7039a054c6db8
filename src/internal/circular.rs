//! Per-call resolution stack for circular dependency detection.

use smallvec::SmallVec;

use crate::error::{KernelError, KernelResult};
use crate::key::ServiceId;

use super::waits::{ResolutionId, WaitGraph, Waiter};

/// Services currently being built by one `resolve` call, outermost first.
///
/// The stack travels with the call instead of living in thread-local state, so
/// a resolution that blocks on a pool or a singleton being built elsewhere
/// never sees another call's frames. Cycles that span calls are caught by
/// the kernel's [`WaitGraph`] using the call's [`ResolutionId`].
pub(crate) struct CreationContext {
    stack: SmallVec<[ServiceId; 8]>,
    max_depth: usize,
    resolution: ResolutionId,
}

impl CreationContext {
    pub(crate) fn new(max_depth: usize, resolution: ResolutionId) -> Self {
        Self {
            stack: SmallVec::new(),
            max_depth,
            resolution,
        }
    }

    pub(crate) fn resolution(&self) -> ResolutionId {
        self.resolution
    }

    /// Snapshot of this call for blocking on another call's creation.
    pub(crate) fn waiter<'g>(&self, graph: &'g WaitGraph) -> Waiter<'g> {
        Waiter::new(graph, self.resolution, &self.stack)
    }

    /// Pushes `service`, failing if it is already being built on this path.
    pub(crate) fn enter(&mut self, service: ServiceId) -> KernelResult<()> {
        // Circular detection BEFORE pushing the new service
        if self.stack.contains(&service) {
            let mut path: Vec<ServiceId> = self.stack.to_vec();
            path.push(service);
            return Err(KernelError::Circular(path));
        }

        if self.stack.len() >= self.max_depth {
            return Err(KernelError::DepthExceeded(self.stack.len()));
        }

        self.stack.push(service);
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        let popped = self.stack.pop();
        debug_assert!(popped.is_some(), "unbalanced resolution stack");
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }
}
