//! Registry of live instances that need decommissioning.

use parking_lot::Mutex;

use crate::internal::{BurdenId, FastHashMap};
use crate::key::InstanceId;

/// Maps live, top-level instances to the burden that tears them down.
///
/// Only top-level burdens are tracked: instances handed to a caller of
/// `resolve`, and instances held by a shared lifestyle. Transient dependencies
/// are reachable through their consumer's burden instead. An entry is removed
/// exactly once; whoever removes it performs the teardown.
pub(crate) struct ReleasePolicy {
    inner: Mutex<PolicyState>,
}

struct PolicyState {
    entries: FastHashMap<InstanceId, BurdenId>,
    closed: bool,
}

impl ReleasePolicy {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(PolicyState {
                entries: FastHashMap::default(),
                closed: false,
            }),
        }
    }

    /// Records `instance -> burden`. Returns `false` once the policy has been
    /// drained for disposal; the caller then owns the teardown.
    pub(crate) fn track(&self, instance: InstanceId, burden: BurdenId) -> bool {
        let mut state = self.inner.lock();
        if state.closed {
            return false;
        }
        let previous = state.entries.insert(instance, burden);
        debug_assert!(previous.is_none(), "instance {} tracked twice", instance);
        true
    }

    pub(crate) fn lookup(&self, instance: InstanceId) -> Option<BurdenId> {
        self.inner.lock().entries.get(&instance).copied()
    }

    pub(crate) fn untrack(&self, instance: InstanceId) -> Option<BurdenId> {
        self.inner.lock().entries.remove(&instance)
    }

    /// Closes the policy and returns every entry, newest burden first.
    pub(crate) fn drain(&self) -> Vec<(InstanceId, BurdenId)> {
        let mut state = self.inner.lock();
        state.closed = true;
        let mut entries: Vec<_> = state.entries.drain().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
